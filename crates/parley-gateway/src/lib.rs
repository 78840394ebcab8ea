//! parley-gateway - HTTP front door for Parley
//!
//! Serves a greeting on `/` and one POST route per channel (`/voice`, `/chat`,
//! `/email`, `/text`). Each channel request gets its own collaborator from the
//! configured `AgentFactory`.

pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use error::GatewayError;
pub use server::{GatewayServer, GatewayState};
