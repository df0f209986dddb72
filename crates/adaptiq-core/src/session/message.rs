//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, content and the feedback attached to assistant replies.

use super::feedback::FeedbackRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI tutor.
    Assistant,
}

/// A single message in a session.
///
/// `id` is the identity used for feedback targeting. Records written by older
/// clients carry no id; those get a stable one derived from the session id,
/// position and timestamp (see [`Message::stable_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Creation time (RFC 3339, UTC).
    pub timestamp: String,
    /// Present on assistant messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackRecord>,
}

impl Message {
    /// Creates a user message stamped with `at`.
    pub fn user(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: format_timestamp(at),
            feedback: None,
        }
    }

    /// Creates an assistant message with a default feedback record.
    pub fn assistant(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: format_timestamp(at),
            feedback: Some(FeedbackRecord::default()),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// Deterministic id for a message persisted without one.
    pub fn stable_id(session_id: &str, index: usize, timestamp: &str) -> String {
        let name = format!("{}:{}:{}", session_id, index, timestamp);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }
}

/// How a caller points at the assistant message a feedback event is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum MessageRef {
    /// Match on the message id.
    Id(String),
    /// Match on `role == assistant && timestamp == value`, first match wins.
    Timestamp(String),
}

impl MessageRef {
    /// Index of the first message this reference selects.
    pub fn locate(&self, messages: &[Message]) -> Option<usize> {
        messages.iter().position(|m| match self {
            MessageRef::Id(id) => m.is_assistant() && &m.id == id,
            MessageRef::Timestamp(ts) => m.is_assistant() && &m.timestamp == ts,
        })
    }
}

/// Formats a timestamp the way messages store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
