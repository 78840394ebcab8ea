//! parley-core - channel types and the agent-protocol collaborator contract
//!
//! This crate provides:
//! - The four input channels (voice, chat, email, text)
//! - The `AgentProtocol` trait every collaborator implements, and the
//!   `AgentFactory` seam that mints one collaborator per request
//! - `LocalAgent`, an in-process collaborator
//! - `RemoteAgent`, a collaborator that forwards to an upstream HTTP service

pub mod agent;
pub mod error;
pub mod protocol;
pub mod remote;
pub mod types;

pub use agent::{LocalAgent, LocalAgentFactory};
pub use error::AgentError;
pub use protocol::{AgentFactory, AgentProtocol};
pub use remote::{RemoteAgent, RemoteAgentFactory};
pub use types::{ChannelType, IncomingMessage, UnknownChannel};

