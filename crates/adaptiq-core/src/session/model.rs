//! Session domain model.
//!
//! A session is one grouped conversation inside a `(context_key, mode)`
//! partition. The same camelCase shape is used for remote documents and for
//! local cache records.

use super::message::{Message, MessageRole};
use super::mode::{ChatMode, Partition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse like/dislike counters kept on the remote session document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackStats {
    pub positive: u64,
    pub negative: u64,
}

/// One conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque unique id, immutable once created
    pub session_id: String,
    #[serde(default)]
    pub context_key: String,
    #[serde(default)]
    pub mode: ChatMode,
    /// Short label derived from the first user message
    pub title: String,
    /// User/assistant pairs in append order
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub feedback_stats: FeedbackStats,
}

impl Session {
    /// Starts an empty session titled after `first_user_text`.
    pub fn new(
        session_id: impl Into<String>,
        partition: &Partition,
        first_user_text: &str,
        title_max_chars: usize,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            context_key: partition.context_key.clone(),
            mode: partition.mode,
            title: derive_title(first_user_text, title_max_chars),
            messages: Vec::new(),
            created_at: at,
            last_updated_at: at,
            feedback_stats: FeedbackStats::default(),
        }
    }

    /// Appends one user/assistant pair and bumps `last_updated_at`.
    pub fn push_exchange(&mut self, user: Message, assistant: Message, at: DateTime<Utc>) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.touch(at);
    }

    /// Replaces the message at `index` in place.
    ///
    /// Returns `false` when the index is out of bounds.
    pub fn replace_message_at(&mut self, index: usize, message: Message) -> bool {
        match self.messages.get_mut(index) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    /// Bumps `last_updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated_at = at.max(self.created_at);
    }

    /// Gives every id-less message a stable id.
    pub fn assign_missing_message_ids(&mut self) {
        for (index, message) in self.messages.iter_mut().enumerate() {
            if message.id.is_empty() {
                message.id = Message::stable_id(&self.session_id, index, &message.timestamp);
            }
        }
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == MessageRole::User)
    }

    pub fn first_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == MessageRole::Assistant)
    }

    /// True when the session holds at least one user and one assistant message.
    pub fn has_full_exchange(&self) -> bool {
        self.first_user_message().is_some() && self.first_assistant_message().is_some()
    }

    /// Flattens the session into a listing entry.
    pub fn into_summary(self) -> SessionSummary {
        let user_message = self
            .first_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let bot_response = self
            .first_assistant_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        SessionSummary {
            session: self,
            user_message,
            bot_response,
        }
    }
}

/// A listing entry: the session plus the flat fields older consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    /// Content of the first user message
    pub user_message: String,
    /// Content of the first assistant message
    pub bot_response: String,
}

/// Result of appending an exchange, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub session_id: String,
    pub user_text: String,
    pub assistant_text: String,
    /// Id of the stored assistant message, for later feedback
    pub assistant_message_id: String,
    /// Timestamp of the stored assistant message
    pub assistant_timestamp: String,
}

/// First `max_chars` characters of `text`, with `...` when truncated.
pub fn derive_title(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
