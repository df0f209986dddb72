use super::feedback::{self, FeedbackTransition, FeedbackUpdate};
use super::identity::SessionIdentity;
use super::legacy::{LegacyEntry, LegacyMigrator};
use super::message::{Message, MessageRef};
use super::mode::{ChatMode, Partition};
use super::model::{Exchange, Session, SessionSummary};
use super::repository::{CachedHistory, SessionCache};
use crate::config::HistoryConfig;
use crate::document::{Direction, Document, DocumentStore, Fields, Query};
use crate::error::{AdaptiqError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of clearing one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionClearReport {
    pub mode: ChatMode,
    pub local_cleared: bool,
    /// Remote documents that were deleted
    pub deleted: Vec<String>,
    /// Remote documents that survived, with the delete error
    pub failed: Vec<FailedDeletion>,
    /// Set when the remote collection could not even be listed
    pub query_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub path: String,
    pub error: String,
}

/// Outcome of [`SessionStore::clear_history_report`].
///
/// Remote deletion is per document and not transactional; this report says
/// exactly which documents are left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub partitions: Vec<PartitionClearReport>,
    /// Whether `historyCleared` was written to the context record
    pub context_stamped: bool,
}

impl ClearReport {
    /// True when every affected partition was cleared locally.
    pub fn local_cleared(&self) -> bool {
        !self.partitions.is_empty() && self.partitions.iter().all(|p| p.local_cleared)
    }

    /// True when every remote document of the affected partitions is gone.
    pub fn remote_complete(&self) -> bool {
        self.partitions
            .iter()
            .all(|p| p.query_error.is_none() && p.failed.is_empty())
    }

    pub fn failed_deletions(&self) -> impl Iterator<Item = &FailedDeletion> {
        self.partitions.iter().flat_map(|p| p.failed.iter())
    }
}

/// Conversation history over a local cache and a remote document store.
///
/// `SessionStore` is responsible for:
/// - Appending exchanges (local first, then remote)
/// - Listing and reading sessions (remote first, local fallback)
/// - Merging feedback into assistant messages
/// - Clearing a context's history
///
/// Remote failures are logged and never returned: the local cache keeps the
/// caller working. Callers must await one append before issuing the next to
/// the same session; nothing here serializes them.
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    remote: Arc<dyn DocumentStore>,
    identity: SessionIdentity,
    migrator: LegacyMigrator,
    config: HistoryConfig,
}

impl SessionStore {
    /// Creates a new `SessionStore`.
    ///
    /// # Arguments
    ///
    /// * `cache` - The local tier, also holding current-session pointers
    /// * `remote` - The authoritative remote tier
    /// * `config` - User id and retention settings
    pub fn new(
        cache: Arc<dyn SessionCache>,
        remote: Arc<dyn DocumentStore>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            identity: SessionIdentity::new(cache.clone()),
            migrator: LegacyMigrator::new(config.legacy_gap_minutes, config.title_max_chars),
            cache,
            remote,
            config,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Append
    // ========================================================================

    /// Appends one user/assistant exchange to a session.
    ///
    /// The session is created on first append. Always reports the exchange,
    /// even when one or both tiers failed to store it.
    pub async fn append_exchange(
        &self,
        partition: &Partition,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Exchange {
        let now = Utc::now();
        let user = Message::user(user_text, now);
        let assistant = Message::assistant(assistant_text, now);

        let exchange = Exchange {
            session_id: session_id.to_string(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            assistant_message_id: assistant.id.clone(),
            assistant_timestamp: assistant.timestamp.clone(),
        };

        if let Err(e) = self.local_append(partition, session_id, &user, &assistant, now) {
            tracing::warn!("Failed to cache exchange for {} in {}: {}", session_id, partition, e);
        }

        if let Err(e) = self
            .remote_append(partition, session_id, &user, &assistant, now)
            .await
        {
            tracing::warn!("Failed to save exchange for {} remotely: {}", session_id, e);
        }

        if let Err(e) = self.touch_context(partition).await {
            tracing::debug!("Failed to update activity marker for {}: {}", partition, e);
        }

        exchange
    }

    fn local_append(
        &self,
        partition: &Partition,
        session_id: &str,
        user: &Message,
        assistant: &Message,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.local_sessions_for_write(partition)?;

        match sessions.iter_mut().find(|s| s.session_id == session_id) {
            Some(session) => session.push_exchange(user.clone(), assistant.clone(), now),
            None => {
                let mut session = Session::new(
                    session_id,
                    partition,
                    &user.content,
                    self.config.title_max_chars,
                    now,
                );
                session.push_exchange(user.clone(), assistant.clone(), now);
                sessions.push(session);
            }
        }

        self.persist_local(partition, sessions)
    }

    async fn remote_append(
        &self,
        partition: &Partition,
        session_id: &str,
        user: &Message,
        assistant: &Message,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let collection = partition.collection_path(&self.config.user_id);

        match self.find_remote_document(&collection, session_id).await? {
            Some(doc) => {
                let mut messages = doc
                    .fields
                    .get("messages")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                messages.push(serde_json::to_value(user)?);
                messages.push(serde_json::to_value(assistant)?);

                let mut fields = Fields::new();
                fields.insert("messages".to_string(), Value::Array(messages));
                fields.insert("lastUpdatedAt".to_string(), self.remote.server_timestamp());
                self.remote.update(&doc.path, fields).await
            }
            None => {
                let mut session = Session::new(
                    session_id,
                    partition,
                    &user.content,
                    self.config.title_max_chars,
                    now,
                );
                session.push_exchange(user.clone(), assistant.clone(), now);

                let mut fields = session_fields(&session)?;
                fields.insert("createdAt".to_string(), self.remote.server_timestamp());
                fields.insert("lastUpdatedAt".to_string(), self.remote.server_timestamp());
                let path = self.remote.add_document(&collection, fields).await?;
                tracing::debug!("Created remote session {} at {}", session_id, path);
                Ok(())
            }
        }
    }

    async fn touch_context(&self, partition: &Partition) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("lastActivity".to_string(), self.remote.server_timestamp());
        fields.insert(
            "lastActivityMode".to_string(),
            Value::String(partition.mode.to_string()),
        );
        self.remote
            .set(&partition.context_doc_path(&self.config.user_id), fields, true)
            .await
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Merges a feedback event into one assistant message.
    ///
    /// A target that cannot be found is a no-op for that tier. Returns `false`
    /// only when the local cache itself failed.
    pub async fn update_feedback(
        &self,
        partition: &Partition,
        session_id: &str,
        target: &MessageRef,
        update: &FeedbackUpdate,
    ) -> bool {
        let now = Utc::now();

        let local_ok = match self.local_update_feedback(partition, session_id, target, update, now) {
            Ok(applied) => {
                if !applied {
                    tracing::debug!("No local message {:?} in session {}", target, session_id);
                }
                true
            }
            Err(e) => {
                tracing::warn!("Failed to update cached feedback for {}: {}", session_id, e);
                false
            }
        };

        match self
            .remote_update_feedback(partition, session_id, target, update, now)
            .await
        {
            Ok(false) => tracing::debug!("No remote message {:?} in session {}", target, session_id),
            Ok(true) => {}
            Err(e) => tracing::warn!("Failed to update remote feedback for {}: {}", session_id, e),
        }

        local_ok
    }

    fn local_update_feedback(
        &self,
        partition: &Partition,
        session_id: &str,
        target: &MessageRef,
        update: &FeedbackUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let CachedHistory::Sessions(mut sessions) = self.cache.load(partition)? else {
            return Ok(false);
        };

        let applied = sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .and_then(|session| apply_feedback(session, target, update, now))
            .is_some();

        if applied {
            self.persist_local(partition, sessions)?;
        }
        Ok(applied)
    }

    async fn remote_update_feedback(
        &self,
        partition: &Partition,
        session_id: &str,
        target: &MessageRef,
        update: &FeedbackUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let collection = partition.collection_path(&self.config.user_id);
        let Some(doc) = self.find_remote_document(&collection, session_id).await? else {
            return Ok(false);
        };

        let mut session = decode_session(partition, &doc)?;
        let Some(transition) = apply_feedback(&mut session, target, update, now) else {
            return Ok(false);
        };

        let mut fields = Fields::new();
        fields.insert(
            "messages".to_string(),
            serde_json::to_value(&session.messages)?,
        );
        fields.insert("lastUpdatedAt".to_string(), self.remote.server_timestamp());

        if !transition.is_noop() {
            let mut stats = session.feedback_stats;
            if transition.became_liked {
                stats.positive += 1;
            }
            if transition.became_disliked {
                stats.negative += 1;
            }
            fields.insert("feedbackStats".to_string(), serde_json::to_value(stats)?);
        }

        self.remote.update(&doc.path, fields).await?;
        Ok(true)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Lists sessions, most recently updated first.
    ///
    /// Reads the remote store; when it is unreachable or holds nothing, the
    /// local cache is used, upgrading legacy flat history on the way.
    pub async fn list_sessions(&self, partition: &Partition, max_items: usize) -> Vec<SessionSummary> {
        let sessions = match self.remote_sessions(partition, max_items).await {
            Ok(sessions) if !sessions.is_empty() => sessions,
            Ok(_) => self.local_sessions(partition, max_items).await,
            Err(e) => {
                tracing::warn!("Remote history unavailable for {}: {}", partition, e);
                self.local_sessions(partition, max_items).await
            }
        };

        sessions.into_iter().map(Session::into_summary).collect()
    }

    /// Reads one session's full transcript.
    pub async fn get_session(&self, partition: &Partition, session_id: &str) -> Option<Session> {
        let remote = self
            .remote_session(partition, session_id)
            .await
            .inspect_err(|e| tracing::warn!("Remote lookup of {} failed: {}", session_id, e))
            .ok()
            .flatten();

        remote.or_else(|| self.local_session(partition, session_id))
    }

    async fn remote_sessions(&self, partition: &Partition, max_items: usize) -> Result<Vec<Session>> {
        let query = Query::new()
            .order_by("lastUpdatedAt", Direction::Descending)
            .limit(max_items);
        let documents = self
            .remote
            .query(&partition.collection_path(&self.config.user_id), &query)
            .await?;

        Ok(documents
            .iter()
            .filter_map(|doc| {
                decode_session(partition, doc)
                    .inspect_err(|e| tracing::warn!("Skipping unreadable session {}: {}", doc.path, e))
                    .ok()
            })
            .collect())
    }

    async fn remote_session(&self, partition: &Partition, session_id: &str) -> Result<Option<Session>> {
        let collection = partition.collection_path(&self.config.user_id);
        match self.find_remote_document(&collection, session_id).await? {
            Some(doc) => decode_session(partition, &doc).map(Some),
            None => Ok(None),
        }
    }

    async fn local_sessions(&self, partition: &Partition, max_items: usize) -> Vec<Session> {
        let mut sessions = match self.cache.load(partition) {
            Ok(CachedHistory::Sessions(sessions)) => sessions,
            Ok(CachedHistory::Legacy(entries)) => self.upgrade_legacy(partition, &entries).await,
            Ok(CachedHistory::Empty) => Vec::new(),
            Err(e) => {
                tracing::warn!("Local history unavailable for {}: {}", partition, e);
                Vec::new()
            }
        };

        sort_recent_first(&mut sessions);
        sessions.truncate(max_items);
        sessions
    }

    fn local_session(&self, partition: &Partition, session_id: &str) -> Option<Session> {
        match self.cache.load(partition) {
            Ok(CachedHistory::Sessions(sessions)) => {
                sessions.into_iter().find(|s| s.session_id == session_id)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Local lookup of {} failed: {}", session_id, e);
                None
            }
        }
    }

    /// Converts legacy flat history, stores the result locally and pushes
    /// complete sessions to the remote store.
    async fn upgrade_legacy(&self, partition: &Partition, entries: &[LegacyEntry]) -> Vec<Session> {
        let migrated = self.migrator.migrate(entries, partition);
        tracing::info!(
            "Migrated {} legacy entries into {} sessions for {}",
            entries.len(),
            migrated.len(),
            partition
        );

        if let Err(e) = self.persist_local(partition, migrated.clone()) {
            tracing::warn!("Failed to cache migrated history for {}: {}", partition, e);
        }

        for session in migrated.iter().filter(|s| s.has_full_exchange()) {
            if let Err(e) = self.remote_push(partition, session).await {
                tracing::warn!("Failed to push migrated session {}: {}", session.session_id, e);
            }
        }

        migrated
    }

    async fn remote_push(&self, partition: &Partition, session: &Session) -> Result<()> {
        let collection = partition.collection_path(&self.config.user_id);
        if self
            .find_remote_document(&collection, &session.session_id)
            .await?
            .is_some()
        {
            return Ok(());
        }
        self.remote
            .add_document(&collection, session_fields(session)?)
            .await
            .map(|_| ())
    }

    // ========================================================================
    // Clear
    // ========================================================================

    /// Clears one mode of a context, or both when `mode` is `None`.
    ///
    /// Returns whether the local cache was cleared.
    pub async fn clear_history(&self, context_key: &str, mode: Option<ChatMode>) -> bool {
        self.clear_history_report(context_key, mode)
            .await
            .local_cleared()
    }

    /// Like [`clear_history`](Self::clear_history), reporting every remote
    /// document that could not be deleted.
    pub async fn clear_history_report(&self, context_key: &str, mode: Option<ChatMode>) -> ClearReport {
        let modes = match mode {
            Some(mode) => vec![mode],
            None => ChatMode::ALL.to_vec(),
        };

        let mut report = ClearReport::default();
        for mode in modes {
            let partition = Partition::new(context_key, mode);
            let mut partition_report = PartitionClearReport {
                mode,
                local_cleared: true,
                deleted: Vec::new(),
                failed: Vec::new(),
                query_error: None,
            };

            if let Err(e) = self.cache.clear(&partition) {
                tracing::warn!("Failed to clear local history for {}: {}", partition, e);
                partition_report.local_cleared = false;
            }

            self.remote_clear(&partition, &mut partition_report).await;
            report.partitions.push(partition_report);
        }

        let context = Partition::new(context_key, mode.unwrap_or_default());
        let mut fields = Fields::new();
        fields.insert("historyCleared".to_string(), self.remote.server_timestamp());
        report.context_stamped = match self
            .remote
            .set(&context.context_doc_path(&self.config.user_id), fields, true)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to stamp historyCleared for {}: {}", context_key, e);
                false
            }
        };

        let failed = report.failed_deletions().count();
        if failed > 0 {
            tracing::error!(
                "History of {} partially cleared: {} remote documents remain",
                context_key,
                failed
            );
        } else {
            tracing::info!("Cleared history of {}", context_key);
        }

        report
    }

    async fn remote_clear(&self, partition: &Partition, report: &mut PartitionClearReport) {
        let collection = partition.collection_path(&self.config.user_id);
        let documents = match self.remote.query(&collection, &Query::new()).await {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!("Failed to list remote history for {}: {}", partition, e);
                report.query_error = Some(e.to_string());
                return;
            }
        };

        for doc in documents {
            match self.remote.delete_document(&doc.path).await {
                Ok(()) => report.deleted.push(doc.path),
                Err(e) => report.failed.push(FailedDeletion {
                    path: doc.path,
                    error: e.to_string(),
                }),
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn find_remote_document(&self, collection: &str, session_id: &str) -> Result<Option<Document>> {
        let query = Query::new().where_eq("sessionId", session_id).limit(1);
        Ok(self.remote.query(collection, &query).await?.into_iter().next())
    }

    /// Current-format sessions of a partition, upgrading legacy history so an
    /// append never drops it.
    fn local_sessions_for_write(&self, partition: &Partition) -> Result<Vec<Session>> {
        Ok(match self.cache.load(partition)? {
            CachedHistory::Sessions(sessions) => sessions,
            CachedHistory::Legacy(entries) => self.migrator.migrate(&entries, partition),
            CachedHistory::Empty => Vec::new(),
        })
    }

    /// Stores sessions most recent first, evicting beyond the retention cap.
    fn persist_local(&self, partition: &Partition, mut sessions: Vec<Session>) -> Result<()> {
        sort_recent_first(&mut sessions);
        if sessions.len() > self.config.max_local_sessions {
            tracing::debug!(
                "Evicting {} cached sessions from {}",
                sessions.len() - self.config.max_local_sessions,
                partition
            );
            sessions.truncate(self.config.max_local_sessions);
        }
        self.cache.store(partition, &sessions)
    }
}

/// Locates the target message, merges the update and writes it back in place.
///
/// `None` when the session has no such assistant message.
fn apply_feedback(
    session: &mut Session,
    target: &MessageRef,
    update: &FeedbackUpdate,
    now: DateTime<Utc>,
) -> Option<FeedbackTransition> {
    let index = target.locate(&session.messages)?;
    let mut message = session.messages[index].clone();

    let merged = feedback::merge(message.feedback.as_ref(), update);
    let transition = FeedbackTransition::between(message.feedback.as_ref(), &merged);
    message.feedback = Some(merged);

    session.replace_message_at(index, message);
    session.touch(now);
    Some(transition)
}

fn sort_recent_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
}

fn session_fields(session: &Session) -> Result<Fields> {
    match serde_json::to_value(session)? {
        Value::Object(fields) => Ok(fields),
        other => Err(AdaptiqError::internal(format!(
            "session serialized to a non-object: {}",
            other
        ))),
    }
}

fn decode_session(partition: &Partition, doc: &Document) -> Result<Session> {
    let mut session: Session = serde_json::from_value(Value::Object(doc.fields.clone()))?;
    session.context_key = partition.context_key.clone();
    session.mode = partition.mode;
    session.assign_missing_message_ids();
    Ok(session)
}
