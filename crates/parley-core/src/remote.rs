//! Remote agent - forwards channel input to an upstream agent service over HTTP
//!
//! The upstream receives the recorded [`IncomingMessage`] as a JSON POST and
//! answers with the response body, which is passed back verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::error::AgentError;
use crate::protocol::{AgentFactory, AgentProtocol};
use crate::types::{ChannelType, IncomingMessage};

/// Default upstream request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Largest successful response body accepted from the upstream (4 MiB)
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// How much of an error body is kept for logging
const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Factory for [`RemoteAgent`]s. The HTTP client is shared so connections are
/// pooled; nothing request-specific lives here.
#[derive(Clone)]
pub struct RemoteAgentFactory {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl std::fmt::Debug for RemoteAgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgentFactory")
            .field("endpoint", &self.endpoint.as_str())
            .field("has_api_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl RemoteAgentFactory {
    pub fn new(endpoint: Url, api_key: String, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl AgentFactory for RemoteAgentFactory {
    fn create(&self) -> Box<dyn AgentProtocol> {
        Box::new(RemoteAgent {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            pending: None,
        })
    }
}

/// A single-use collaborator backed by the upstream service
pub struct RemoteAgent {
    client: Client,
    endpoint: Url,
    api_key: String,
    pending: Option<IncomingMessage>,
}

impl RemoteAgent {
    fn record(&mut self, channel: ChannelType, input: &str) {
        self.pending = Some(IncomingMessage::new(channel, input));
    }
}

#[async_trait]
impl AgentProtocol for RemoteAgent {
    async fn process_voice_input(&mut self, input: &str) -> Result<(), AgentError> {
        self.record(ChannelType::Voice, input);
        Ok(())
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<(), AgentError> {
        self.record(ChannelType::Chat, input);
        Ok(())
    }

    async fn process_email_input(&mut self, input: &str) -> Result<(), AgentError> {
        self.record(ChannelType::Email, input);
        Ok(())
    }

    async fn process_text_input(&mut self, input: &str) -> Result<(), AgentError> {
        self.record(ChannelType::Text, input);
        Ok(())
    }

    async fn generate_response(&mut self) -> Result<Value, AgentError> {
        let msg = self.pending.take().ok_or(AgentError::NoPendingInput)?;

        debug!(
            "Forwarding {} message {} to {}",
            msg.channel, msg.id, self.endpoint
        );

        let mut request = self.client.post(self.endpoint.clone()).json(&msg);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = match read_capped(response, MAX_ERROR_BODY_BYTES).await {
                Ok((bytes, _)) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => "Unknown error".to_string(),
            };
            error!("Agent at {} returned {}: {}", self.endpoint, status, body);
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let (bytes, truncated) = read_capped(response, MAX_RESPONSE_BYTES).await?;
        if truncated {
            return Err(AgentError::InvalidResponse(format!(
                "response body exceeds {} bytes",
                MAX_RESPONSE_BYTES
            )));
        }
        serde_json::from_slice(&bytes).map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }
}

/// Read at most `limit` bytes of the body. The flag is set when more was
/// available; the rest of the body is left unread.
async fn read_capped(
    mut response: Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn factory(server: &MockServer, api_key: &str) -> RemoteAgentFactory {
        let endpoint = Url::parse(&format!("{}/respond", server.uri())).unwrap();
        RemoteAgentFactory::new(endpoint, api_key.to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_message_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond"))
            .and(body_partial_json(
                serde_json::json!({"channel": "email", "content": "hello"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"reply": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        agent.process_email_input("hello").await.unwrap();
        let resp = agent.generate_response().await.unwrap();
        assert_eq!(resp, serde_json::json!({"reply": "hi"}));
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let mut agent = factory(&server, "secret").create();
        agent.process_text_input("x").await.unwrap();
        assert_eq!(agent.generate_response().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        agent.process_chat_input("x").await.unwrap();
        match agent.generate_response().await.unwrap_err() {
            AgentError::Upstream { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_body_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(100_000)))
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        agent.process_chat_input("x").await.unwrap();
        match agent.generate_response().await.unwrap_err() {
            AgentError::Upstream { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY_BYTES);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let server = MockServer::start().await;
        let huge = format!("\"{}\"", "a".repeat(MAX_RESPONSE_BYTES));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(huge))
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        agent.process_text_input("x").await.unwrap();
        let err = agent.generate_response().await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(ref m) if m.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        agent.process_voice_input("x").await.unwrap();
        let err = agent.generate_response().await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_no_request_without_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut agent = factory(&server, "").create();
        let err = agent.generate_response().await.unwrap_err();
        assert!(matches!(err, AgentError::NoPendingInput));
    }

    #[test]
    fn test_debug_hides_key() {
        let f = RemoteAgentFactory::new(
            Url::parse("http://localhost:8700/respond").unwrap(),
            "top-secret".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        let debug = format!("{:?}", f);
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("localhost:8700"));
    }
}
