use serde::{Deserialize, Serialize};

/// Tunables for the conversation history subsystem.
///
/// Every field has a default so a partial `[history]` table in `config.toml`
/// is enough.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Owner of the remote documents (`users/{user_id}/...`).
    pub user_id: String,
    /// Sessions retained per local-cache partition.
    pub max_local_sessions: usize,
    /// Default `max_items` for session listings.
    pub default_list_limit: usize,
    /// Characters of the first user message used as a session title.
    pub title_max_chars: usize,
    /// Inactivity gap that splits legacy flat history into sessions.
    pub legacy_gap_minutes: i64,
    /// Prior exchanges replayed into a tutoring prompt.
    pub prompt_context_exchanges: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            max_local_sessions: 20,
            default_list_limit: 20,
            title_max_chars: 30,
            legacy_gap_minutes: 5,
            prompt_context_exchanges: 6,
        }
    }
}

impl HistoryConfig {
    /// Returns a default config owned by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}
