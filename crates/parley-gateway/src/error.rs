//! Gateway error types and their HTTP representation

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_core::AgentError;

use crate::protocol::{ERR_AGENT, ERR_INVALID_PARAMS, ERR_PARSE, ErrorBody};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body is not syntactically valid JSON.
    #[error("invalid JSON body: {0}")]
    MalformedJson(String),

    /// Body is JSON but not a valid request envelope (e.g. no `input`).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("expected request with `Content-Type: application/json`")]
    UnsupportedMediaType,

    /// Any other body rejection; carries the status axum chose.
    #[error("request rejected: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedJson(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Rejected { status, .. } => *status,
            Self::Agent(e) if e.is_upstream() => StatusCode::BAD_GATEWAY,
            Self::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::MalformedJson(_) => ERR_PARSE,
            Self::InvalidRequest(_) | Self::UnsupportedMediaType | Self::Rejected { .. } => {
                ERR_INVALID_PARAMS
            }
            Self::Agent(_) => ERR_AGENT,
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(e) => Self::MalformedJson(e.body_text()),
            JsonRejection::JsonDataError(e) => Self::InvalidRequest(e.body_text()),
            JsonRejection::MissingJsonContentType(_) => Self::UnsupportedMediaType,
            other => Self::Rejected {
                status: other.status(),
                message: other.body_text(),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}
