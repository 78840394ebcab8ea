//! Shared types for parley-core

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input channel a request arrived on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Voice,
    Chat,
    Email,
    Text,
}

impl ChannelType {
    /// All channels, in route order
    pub const ALL: [ChannelType; 4] = [Self::Voice, Self::Chat, Self::Email, Self::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Chat => "chat",
            Self::Email => "email",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a channel name is not one of the four known channels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}' (expected voice, chat, email or text)")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelType {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "voice" => Ok(Self::Voice),
            "chat" => Ok(Self::Chat),
            "email" => Ok(Self::Email),
            "text" => Ok(Self::Text),
            _ => Err(UnknownChannel(s.to_string())),
        }
    }
}

/// One piece of input handed to a collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub channel: ChannelType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: ChannelType, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse() {
        assert_eq!("voice".parse::<ChannelType>().unwrap(), ChannelType::Voice);
        assert_eq!(" EMAIL ".parse::<ChannelType>().unwrap(), ChannelType::Email);
        assert!("discord".parse::<ChannelType>().is_err());
    }

    #[test]
    fn test_channel_display_matches_serde() {
        for channel in ChannelType::ALL {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel));
        }
    }

    #[test]
    fn test_incoming_message_ids_unique() {
        let a = IncomingMessage::new(ChannelType::Chat, "hi");
        let b = IncomingMessage::new(ChannelType::Chat, "hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.content, "hi");
    }
}
