//! Collaborator error types

use thiserror::Error;

/// Errors raised by an [`AgentProtocol`](crate::AgentProtocol) implementation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `generate_response` was called before any input was processed.
    #[error("no input has been processed")]
    NoPendingInput,

    /// The upstream agent could not be reached.
    #[error("agent transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream agent answered with a non-success status. `body` is a
    /// truncated copy for logs and is kept out of the display text.
    #[error("agent returned HTTP {status}")]
    Upstream { status: u16, body: String },

    /// The upstream agent answered with something that is not JSON.
    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether the failure happened talking to a remote agent.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Upstream { .. } | Self::InvalidResponse(_)
        )
    }
}
