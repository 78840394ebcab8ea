//! Gateway HTTP protocol - JSON envelopes exchanged with clients

use serde::{Deserialize, Serialize};

/// Body served on `GET /`
pub const GREETING: &str = "Hello, World!";

/// Client → Gateway request body for every channel route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub input: String,
}

/// Structured error body returned on every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i32,
    pub message: String,
}

// ── Error codes ──

pub const ERR_PARSE: i32 = -32700;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;
pub const ERR_AGENT: i32 = -32001;

impl ErrorBody {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}
