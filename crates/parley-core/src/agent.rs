//! Local agent - an in-process collaborator that answers without any backend

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::AgentError;
use crate::protocol::{AgentFactory, AgentProtocol};
use crate::types::{ChannelType, IncomingMessage};

/// Longest summary quoted back in a reply, in characters.
const MAX_SUMMARY_CHARS: usize = 120;

/// Records one message and acknowledges it with a short channel-aware reply.
#[derive(Debug, Default)]
pub struct LocalAgent {
    pending: Option<IncomingMessage>,
}

impl LocalAgent {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, channel: ChannelType, input: &str) {
        debug!("LocalAgent recorded {} input ({} chars)", channel, input.chars().count());
        self.pending = Some(IncomingMessage::new(channel, input));
    }
}

#[async_trait]
impl AgentProtocol for LocalAgent {
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
        let summary = summarize(msg.channel, &msg.content);
        let reply = if summary.is_empty() {
            format!("Received an empty {} message.", msg.channel)
        } else {
            format!("Received your {} message: {}", msg.channel, summary)
        };

        Ok(json!({
            "id": msg.id,
            "channel": msg.channel,
            "reply": reply,
            "received_at": msg.timestamp,
            "input_chars": msg.content.chars().count(),
        }))
    }
}

/// Factory handing out a new [`LocalAgent`] per request
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAgentFactory;

impl AgentFactory for LocalAgentFactory {
    fn create(&self) -> Box<dyn AgentProtocol> {
        Box::new(LocalAgent::new())
    }
}

fn summarize(channel: ChannelType, content: &str) -> String {
    let summary = match channel {
        // Transcripts arrive with arbitrary line breaks and pauses
        ChannelType::Voice => content.split_whitespace().collect::<Vec<_>>().join(" "),
        ChannelType::Email => email_subject(content)
            .unwrap_or_else(|| first_line(content))
            .to_string(),
        ChannelType::Chat | ChannelType::Text => first_line(content).to_string(),
    };
    truncate(&summary, MAX_SUMMARY_CHARS)
}

fn email_subject(content: &str) -> Option<&str> {
    let line = content.lines().next()?.trim();
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case("subject") {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    } else {
        None
    }
}

fn first_line(content: &str) -> &str {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
