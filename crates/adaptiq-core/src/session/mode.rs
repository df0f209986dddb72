//! Partition keys for conversation history.
//!
//! Every history operation is scoped to a `(context_key, mode)` pair. This
//! module owns the mapping from that pair to local cache keys and remote
//! document paths so no other module builds those strings by hand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Context key used for general-purpose chat outside any course.
pub const GENERAL_CHAT_CONTEXT: &str = "General Chat";

/// Which kind of conversation a session holds.
///
/// Chat and quiz histories are stored apart and never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Free-form tutoring conversation.
    #[default]
    Chat,
    /// Quiz generation and answering.
    Quiz,
}

impl ChatMode {
    /// All modes, in clearing order.
    pub const ALL: [ChatMode; 2] = [ChatMode::Chat, ChatMode::Quiz];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chat",
            ChatMode::Quiz => "quiz",
        }
    }

    /// Name of the remote sub-collection holding this mode's sessions.
    pub fn collection_name(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chatSessions",
            ChatMode::Quiz => "quizSessions",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Ok(ChatMode::Chat),
            "quiz" => Ok(ChatMode::Quiz),
            other => Err(format!("unknown chat mode '{}' (expected chat or quiz)", other)),
        }
    }
}

/// A `(context_key, mode)` partition of the history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub context_key: String,
    pub mode: ChatMode,
}

impl Partition {
    pub fn new(context_key: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            context_key: context_key.into(),
            mode,
        }
    }

    /// Partition for general-purpose chat.
    pub fn general(mode: ChatMode) -> Self {
        Self::new(GENERAL_CHAT_CONTEXT, mode)
    }

    /// Normalized context id used in remote paths.
    pub fn context_id(&self) -> String {
        normalize_context_id(&self.context_key)
    }

    // ------------------------------------------------------------------
    // Local cache keys
    // ------------------------------------------------------------------

    /// Key holding the session list (current format).
    pub fn sessions_key(&self) -> String {
        format!("{}Sessions_{}", self.mode, self.context_key)
    }

    /// Key holding the pre-session flat history.
    pub fn legacy_history_key(&self) -> String {
        format!("{}History_{}", self.mode, self.context_key)
    }

    /// Key of the current-session pointer written by older clients.
    pub fn legacy_session_key(&self) -> String {
        format!("{}_session_{}", self.mode, self.context_key)
    }

    /// Key holding the current-session pointer.
    pub fn current_session_key(&self) -> String {
        format!("{}CurrentSession_{}", self.mode, self.context_key)
    }

    // ------------------------------------------------------------------
    // Remote paths
    // ------------------------------------------------------------------

    /// Path of the context (course) record: `users/{uid}/courses/{contextId}`.
    pub fn context_doc_path(&self, user_id: &str) -> String {
        format!("users/{}/courses/{}", user_id, self.context_id())
    }

    /// Path of the mode-specific session collection.
    pub fn collection_path(&self, user_id: &str) -> String {
        format!(
            "{}/{}",
            self.context_doc_path(user_id),
            self.mode.collection_name()
        )
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context_key, self.mode)
    }
}

/// Lowercases a context key and replaces whitespace runs with `-`.
pub fn normalize_context_id(context_key: &str) -> String {
    context_key
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_normalization() {
        assert_eq!(normalize_context_id("Linear Algebra"), "linear-algebra");
        assert_eq!(normalize_context_id("  Intro  to   CS "), "intro-to-cs");
        assert_eq!(normalize_context_id("Physics"), "physics");
    }

    #[test]
    fn test_local_keys() {
        let partition = Partition::new("Algebra", ChatMode::Quiz);
        assert_eq!(partition.sessions_key(), "quizSessions_Algebra");
        assert_eq!(partition.legacy_history_key(), "quizHistory_Algebra");
        assert_eq!(partition.legacy_session_key(), "quiz_session_Algebra");
        assert_eq!(partition.current_session_key(), "quizCurrentSession_Algebra");
    }

    #[test]
    fn test_remote_paths_are_mode_specific() {
        let chat = Partition::new("Linear Algebra", ChatMode::Chat);
        let quiz = Partition::new("Linear Algebra", ChatMode::Quiz);
        assert_eq!(
            chat.collection_path("u1"),
            "users/u1/courses/linear-algebra/chatSessions"
        );
        assert_eq!(
            quiz.collection_path("u1"),
            "users/u1/courses/linear-algebra/quizSessions"
        );
        assert_eq!(chat.context_doc_path("u1"), quiz.context_doc_path("u1"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Quiz".parse::<ChatMode>().unwrap(), ChatMode::Quiz);
        assert_eq!(" chat ".parse::<ChatMode>().unwrap(), ChatMode::Chat);
        assert!("essay".parse::<ChatMode>().is_err());
        assert_eq!(serde_json::to_string(&ChatMode::Quiz).unwrap(), "\"quiz\"");
    }
}
