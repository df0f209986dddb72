//! Caller-facing chat history operations.
//!
//! `ChatHistoryService` is the surface the chat and quiz screens talk to. It
//! resolves context keys to partitions, owns the current-session lifecycle
//! and forwards to [`SessionStore`].

use adaptiq_core::config::HistoryConfig;
use adaptiq_core::document::DocumentStore;
use adaptiq_core::session::{
    ChatMode, ClearReport, Exchange, FeedbackUpdate, LegacyEntry, MessageRef, Partition, Session,
    SessionCache, SessionStore, SessionSummary,
};
use adaptiq_infrastructure::storage::{FileKeyValueStore, MemoryKeyValueStore};
use adaptiq_infrastructure::{
    AppConfig, AsyncDirDocumentStore, InMemoryDocumentStore, KeyValueSessionCache,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a caller hands to [`ChatHistoryService::save_chat_history`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRecord {
    /// One exchange; without a session id it goes to the current session.
    Exchange {
        user_text: String,
        bot_text: String,
        #[serde(default)]
        session_id: Option<String>,
    },
    /// The whole flat history older screens pass; only the most recent
    /// entry is new.
    Legacy(Vec<LegacyEntry>),
}

impl ChatRecord {
    pub fn exchange(user_text: impl Into<String>, bot_text: impl Into<String>) -> Self {
        ChatRecord::Exchange {
            user_text: user_text.into(),
            bot_text: bot_text.into(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, id: impl Into<String>) -> Self {
        if let ChatRecord::Exchange { session_id, .. } = &mut self {
            *session_id = Some(id.into());
        }
        self
    }
}

/// Sessions of both modes of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CombinedHistory {
    pub chat: Vec<SessionSummary>,
    pub quiz: Vec<SessionSummary>,
}

/// Chat history facade over a [`SessionStore`].
pub struct ChatHistoryService {
    store: Arc<SessionStore>,
}

impl ChatHistoryService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Service over explicit backends.
    pub fn with_backends(
        cache: Arc<dyn SessionCache>,
        remote: Arc<dyn DocumentStore>,
        config: HistoryConfig,
    ) -> Self {
        Self::new(Arc::new(SessionStore::new(cache, remote, config)))
    }

    /// Service whose tiers both live in memory.
    pub fn in_memory(config: HistoryConfig) -> Self {
        Self::with_backends(
            Arc::new(KeyValueSessionCache::new(Arc::new(MemoryKeyValueStore::new()))),
            Arc::new(InMemoryDocumentStore::new()),
            config,
        )
    }

    /// Service over the on-disk cache and document directory of `config`.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let paths = config.paths();
        let cache_file = paths.cache_file().context("Failed to resolve cache file")?;
        let documents_dir = paths
            .documents_dir()
            .context("Failed to resolve documents directory")?;

        let remote = AsyncDirDocumentStore::new(&documents_dir)
            .await
            .with_context(|| format!("Failed to open document store at {}", documents_dir.display()))?;
        tracing::debug!(
            "Opened history at {} (cache) and {} (documents)",
            cache_file.display(),
            documents_dir.display()
        );

        Ok(Self::with_backends(
            Arc::new(KeyValueSessionCache::new(Arc::new(FileKeyValueStore::new(cache_file)))),
            Arc::new(remote),
            config.history.clone(),
        ))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolves a context key; blank keys mean general chat.
    pub fn partition(context_key: &str, mode: ChatMode) -> Partition {
        if context_key.trim().is_empty() {
            Partition::general(mode)
        } else {
            Partition::new(context_key, mode)
        }
    }

    // ------------------------------------------------------------------
    // Identity lifecycle
    // ------------------------------------------------------------------

    pub fn get_or_create_session_id(&self, context_key: &str, mode: ChatMode) -> String {
        self.store
            .identity()
            .get_or_create(&Self::partition(context_key, mode))
    }

    pub fn force_new_session(&self, context_key: &str, mode: ChatMode) -> String {
        self.store
            .identity()
            .force_new(&Self::partition(context_key, mode))
    }

    pub fn end_current_session(&self, context_key: &str, mode: ChatMode) {
        self.store
            .identity()
            .end_current(&Self::partition(context_key, mode))
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Appends an exchange. `None` when a legacy record holds no entries.
    pub async fn save_chat_history(
        &self,
        context_key: &str,
        mode: ChatMode,
        record: ChatRecord,
    ) -> Option<Exchange> {
        let partition = Self::partition(context_key, mode);

        let (user_text, bot_text, session_id) = match record {
            ChatRecord::Exchange {
                user_text,
                bot_text,
                session_id,
            } => (user_text, bot_text, session_id),
            ChatRecord::Legacy(mut entries) => {
                let latest = entries.pop()?;
                (latest.user_message, latest.bot_response, None)
            }
        };

        let session_id =
            session_id.unwrap_or_else(|| self.store.identity().get_or_create(&partition));

        Some(
            self.store
                .append_exchange(&partition, &session_id, &user_text, &bot_text)
                .await,
        )
    }

    /// Sessions of one mode, most recent first; `max_items` defaults to the
    /// configured listing limit.
    pub async fn get_chat_history(
        &self,
        context_key: &str,
        mode: ChatMode,
        max_items: Option<usize>,
    ) -> Vec<SessionSummary> {
        let limit = max_items.unwrap_or(self.store.config().default_list_limit);
        self.store
            .list_sessions(&Self::partition(context_key, mode), limit)
            .await
    }

    pub async fn get_all_chat_history(
        &self,
        context_key: &str,
        max_items: Option<usize>,
    ) -> CombinedHistory {
        let (chat, quiz) = futures::join!(
            self.get_chat_history(context_key, ChatMode::Chat, max_items),
            self.get_chat_history(context_key, ChatMode::Quiz, max_items),
        );
        CombinedHistory { chat, quiz }
    }

    pub async fn get_conversation_session(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: &str,
    ) -> Option<Session> {
        self.store
            .get_session(&Self::partition(context_key, mode), session_id)
            .await
    }

    pub async fn clear_chat_history(&self, context_key: &str, mode: Option<ChatMode>) -> bool {
        self.clear_chat_history_report(context_key, mode)
            .await
            .local_cleared()
    }

    pub async fn clear_chat_history_report(
        &self,
        context_key: &str,
        mode: Option<ChatMode>,
    ) -> ClearReport {
        let context_key = Self::partition(context_key, mode.unwrap_or_default()).context_key;
        self.store.clear_history_report(&context_key, mode).await
    }

    pub async fn update_message_feedback(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: &str,
        target: &MessageRef,
        update: &FeedbackUpdate,
    ) -> bool {
        self.store
            .update_feedback(&Self::partition(context_key, mode), session_id, target, update)
            .await
    }
}
