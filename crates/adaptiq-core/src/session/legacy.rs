//! Pre-session history format and its one-way upgrade.
//!
//! Older clients stored chat history as a flat list of independent
//! `(userMessage, botResponse, timestamp)` records. This module recognizes
//! that shape and groups it into sessions by inactivity gaps.

use super::identity::generate_session_id;
use super::message::{Message, MessageRole};
use super::mode::Partition;
use super::model::Session;
use super::feedback::FeedbackRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One record of the flat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEntry {
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: String,
}

/// Shape of a raw stored history value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFormat {
    /// Flat `(userMessage, botResponse, timestamp)` records
    LegacyFlat,
    /// Grouped sessions (current format)
    SessionList,
    Unknown,
}

/// Classifies a stored value without interpreting it further.
pub fn detect_format(raw: &Value) -> HistoryFormat {
    let Some(items) = raw.as_array() else {
        return HistoryFormat::Unknown;
    };
    let Some(first) = items.first() else {
        return HistoryFormat::SessionList;
    };
    let Some(first) = first.as_object() else {
        return HistoryFormat::Unknown;
    };

    if first.contains_key("messages") {
        HistoryFormat::SessionList
    } else if first.contains_key("userMessage") || first.contains_key("botResponse") {
        HistoryFormat::LegacyFlat
    } else {
        HistoryFormat::Unknown
    }
}

/// Groups flat history into sessions.
#[derive(Debug, Clone)]
pub struct LegacyMigrator {
    gap: Duration,
    title_max_chars: usize,
}

impl Default for LegacyMigrator {
    fn default() -> Self {
        Self::new(5, 30)
    }
}

impl LegacyMigrator {
    pub fn new(gap_minutes: i64, title_max_chars: usize) -> Self {
        Self {
            gap: Duration::minutes(gap_minutes),
            title_max_chars,
        }
    }

    /// Converts `entries` into sessions of `partition`, in input order.
    ///
    /// A new session starts when the gap since the current session's last
    /// update exceeds the configured inactivity gap. An entry whose timestamp
    /// cannot be parsed joins the current session.
    pub fn migrate(&self, entries: &[LegacyEntry], partition: &Partition) -> Vec<Session> {
        let mut sessions: Vec<Session> = Vec::new();

        for entry in entries {
            let parsed = parse_timestamp(&entry.timestamp);

            let starts_new = match (sessions.last(), parsed) {
                (None, _) => true,
                (Some(current), Some(at)) => at - current.last_updated_at > self.gap,
                (Some(_), None) => false,
            };

            if starts_new {
                let at = parsed.unwrap_or_else(Utc::now);
                sessions.push(Session::new(
                    generate_session_id(),
                    partition,
                    &entry.user_message,
                    self.title_max_chars,
                    at,
                ));
            }

            if let Some(current) = sessions.last_mut() {
                let at = parsed.unwrap_or(current.last_updated_at);
                let (user, assistant) = legacy_pair(entry);
                current.push_exchange(user, assistant, at);
            }
        }

        sessions
    }
}

fn legacy_pair(entry: &LegacyEntry) -> (Message, Message) {
    let user = Message {
        id: Uuid::new_v4().to_string(),
        role: MessageRole::User,
        content: entry.user_message.clone(),
        timestamp: entry.timestamp.clone(),
        feedback: None,
    };
    let assistant = Message {
        id: Uuid::new_v4().to_string(),
        role: MessageRole::Assistant,
        content: entry.bot_response.clone(),
        timestamp: entry.timestamp.clone(),
        feedback: Some(FeedbackRecord::default()),
    };
    (user, assistant)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
