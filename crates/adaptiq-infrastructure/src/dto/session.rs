//! Cached session DTOs and migrations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use version_migrate::{IntoDomain, MigratesTo, Versioned};

use adaptiq_core::session::{
    ChatMode, FeedbackRecord, FeedbackStats, Message, MessageRole, Session,
};

// ============================================================================
// Message DTOs
// ============================================================================

/// Message as written by clients that predate message ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMessageV1_0_0 {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackRecord>,
}

// ============================================================================
// Session DTOs
// ============================================================================

/// Represents V1.0.0 of the cached session schema.
/// Records carried no `version` field, no message ids and string timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
#[serde(rename_all = "camelCase")]
pub struct CachedSessionV1_0_0 {
    pub session_id: String,
    #[serde(default)]
    pub context_key: String,
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<CachedMessageV1_0_0>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_updated_at: String,
}

/// Represents V1.1.0 of the cached session schema.
/// Added message ids, typed timestamps and feedback counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.1.0")]
#[serde(rename_all = "camelCase")]
pub struct CachedSessionV1_1_0 {
    pub session_id: String,
    pub context_key: String,
    pub mode: ChatMode,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub feedback_stats: FeedbackStats,
}

/// Type alias for the latest cached session version.
pub type CachedSessionDTO = CachedSessionV1_1_0;

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Migration from V1.0.0 to V1.1.0.
/// Derives stable message ids, parses timestamps and counts existing feedback.
impl MigratesTo<CachedSessionV1_1_0> for CachedSessionV1_0_0 {
    fn migrate(self) -> CachedSessionV1_1_0 {
        let first_message_at = self
            .messages
            .iter()
            .find_map(|m| parse_timestamp(&m.timestamp));
        let created_at = parse_timestamp(&self.created_at)
            .or(first_message_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let last_updated_at = parse_timestamp(&self.last_updated_at)
            .unwrap_or(created_at)
            .max(created_at);

        let mut feedback_stats = FeedbackStats::default();
        let messages = self
            .messages
            .into_iter()
            .enumerate()
            .map(|(index, m)| {
                if let Some(feedback) = &m.feedback {
                    if feedback.liked {
                        feedback_stats.positive += 1;
                    }
                    if feedback.disliked {
                        feedback_stats.negative += 1;
                    }
                }
                Message {
                    id: Message::stable_id(&self.session_id, index, &m.timestamp),
                    role: m.role,
                    content: m.content,
                    timestamp: m.timestamp,
                    feedback: m.feedback,
                }
            })
            .collect();

        CachedSessionV1_1_0 {
            session_id: self.session_id,
            context_key: self.context_key,
            mode: self.mode,
            title: self.title,
            messages,
            created_at,
            last_updated_at,
            feedback_stats,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

/// Convert CachedSessionV1_1_0 DTO to domain model.
impl IntoDomain<Session> for CachedSessionV1_1_0 {
    fn into_domain(self) -> Session {
        let mut session = Session {
            session_id: self.session_id,
            context_key: self.context_key,
            mode: self.mode,
            title: self.title,
            messages: self.messages,
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
            feedback_stats: self.feedback_stats,
        };
        session.assign_missing_message_ids();
        session
    }
}

/// Convert domain model to CachedSessionV1_1_0 DTO for persistence.
impl version_migrate::FromDomain<Session> for CachedSessionV1_1_0 {
    fn from_domain(session: Session) -> Self {
        CachedSessionV1_1_0 {
            session_id: session.session_id,
            context_key: session.context_key,
            mode: session.mode,
            title: session.title,
            messages: session.messages,
            created_at: session.created_at,
            last_updated_at: session.last_updated_at,
            feedback_stats: session.feedback_stats,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Entity name the cached session path is registered under.
pub const CACHED_SESSION_ENTITY: &str = "cached_session";

/// Version assumed for records that carry no `version` field.
pub const UNVERSIONED_SESSION_VERSION: &str = "1.0.0";

/// Creates and configures a Migrator instance for cached Session records.
///
/// # Migration Path
///
/// - V1.0.0 → V1.1.0: Adds message ids, typed timestamps and feedback counters
/// - V1.1.0 → Session: Converts DTO to domain model
///
/// # Example
///
/// ```ignore
/// let migrator = create_cached_session_migrator();
/// let session: Session = migrator.load_flat_from(CACHED_SESSION_ENTITY, json_value)?;
/// ```
pub fn create_cached_session_migrator() -> version_migrate::Migrator {
    let mut migrator = version_migrate::Migrator::builder().build();

    // Register migration path: V1.0.0 -> V1.1.0 -> Session
    let session_path = version_migrate::Migrator::define(CACHED_SESSION_ENTITY)
        .from::<CachedSessionV1_0_0>()
        .step::<CachedSessionV1_1_0>()
        .into_with_save::<Session>();

    migrator
        .register(session_path)
        .expect("Failed to register cached_session migration path");

    migrator
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cached_session_migration_v1_0_0_to_domain() {
        let migrator = create_cached_session_migrator();

        let value = json!({
            "version": "1.0.0",
            "sessionId": "session_1_abc",
            "title": "What is a prime?",
            "messages": [
                {"role": "user", "content": "What is a prime?", "timestamp": "2024-03-01T09:00:00.000Z"},
                {"role": "assistant", "content": "A number...", "timestamp": "2024-03-01T09:00:00.000Z",
                 "feedback": {"liked": true, "inferredSentiment": "positive"}}
            ],
            "createdAt": "2024-03-01T09:00:00.000Z",
            "lastUpdatedAt": "2024-03-01T09:00:00.000Z"
        });

        let result: Result<Session, _> = migrator.load_flat_from(CACHED_SESSION_ENTITY, value);

        assert!(result.is_ok(), "Migration failed: {:?}", result.err());
        let session = result.unwrap();
        assert_eq!(session.session_id, "session_1_abc");
        assert_eq!(session.messages.len(), 2);
        assert!(session.messages.iter().all(|m| !m.id.is_empty()));
        assert_eq!(
            session.messages[1].id,
            Message::stable_id("session_1_abc", 1, "2024-03-01T09:00:00.000Z")
        );
        assert_eq!(session.feedback_stats.positive, 1);
        assert_eq!(session.created_at, parse_timestamp("2024-03-01T09:00:00Z").unwrap());
    }

    #[test]
    fn test_unparseable_created_at_falls_back_to_first_message() {
        let dto = CachedSessionV1_0_0 {
            session_id: "s".to_string(),
            context_key: String::new(),
            mode: ChatMode::Quiz,
            title: "t".to_string(),
            messages: vec![CachedMessageV1_0_0 {
                role: MessageRole::User,
                content: "q".to_string(),
                timestamp: "2024-05-05T10:00:00Z".to_string(),
                feedback: None,
            }],
            created_at: "Sun May 05 2024".to_string(),
            last_updated_at: String::new(),
        };

        let migrated = dto.migrate();
        assert_eq!(migrated.created_at, parse_timestamp("2024-05-05T10:00:00Z").unwrap());
        assert_eq!(migrated.last_updated_at, migrated.created_at);
        assert_eq!(migrated.mode, ChatMode::Quiz);
    }

    #[test]
    fn test_cached_session_save() {
        let migrator = create_cached_session_migrator();
        let at = parse_timestamp("2024-03-01T09:00:00Z").unwrap();
        let session = Session {
            session_id: "session_2_def".to_string(),
            context_key: "Algebra".to_string(),
            mode: ChatMode::Chat,
            title: "hello".to_string(),
            messages: vec![Message::user("hello", at)],
            created_at: at,
            last_updated_at: at,
            feedback_stats: FeedbackStats::default(),
        };

        let json_str = migrator
            .save_domain_flat(CACHED_SESSION_ENTITY, &session)
            .unwrap();

        assert!(json_str.contains("\"version\":\"1.1.0\""));
        assert!(json_str.contains("\"sessionId\":\"session_2_def\""));

        let value: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        let loaded: Session = migrator.load_flat_from(CACHED_SESSION_ENTITY, value).unwrap();
        assert_eq!(loaded, session);
    }
}
