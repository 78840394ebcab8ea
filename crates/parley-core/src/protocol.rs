//! Agent protocol - the collaborator contract every channel request goes through
//!
//! A collaborator accepts one piece of input through a channel-specific entry
//! point and then produces a JSON response. Instances are single-use: the
//! gateway asks an [`AgentFactory`] for a fresh one on every request and drops
//! it when the request ends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentError;
use crate::types::ChannelType;

#[async_trait]
pub trait AgentProtocol: Send {
    async fn process_voice_input(&mut self, input: &str) -> Result<(), AgentError>;

    async fn process_chat_input(&mut self, input: &str) -> Result<(), AgentError>;

    async fn process_email_input(&mut self, input: &str) -> Result<(), AgentError>;

    async fn process_text_input(&mut self, input: &str) -> Result<(), AgentError>;

    /// Produce the response for whatever input has been processed so far.
    async fn generate_response(&mut self) -> Result<Value, AgentError>;

    /// Dispatch to the entry point for `channel`.
    async fn process(&mut self, channel: ChannelType, input: &str) -> Result<(), AgentError> {
        match channel {
            ChannelType::Voice => self.process_voice_input(input).await,
            ChannelType::Chat => self.process_chat_input(input).await,
            ChannelType::Email => self.process_email_input(input).await,
            ChannelType::Text => self.process_text_input(input).await,
        }
    }
}

/// Mints a fresh collaborator per request. Implementations must not hand out
/// instances that share per-request state.
pub trait AgentFactory: Send + Sync {
    fn create(&self) -> Box<dyn AgentProtocol>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Box<dyn AgentProtocol> + Send + Sync,
{
    fn create(&self) -> Box<dyn AgentProtocol> {
        self()
    }
}
