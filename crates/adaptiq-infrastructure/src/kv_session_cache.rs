//! `SessionCache` over a key-value store.
//!
//! Key layout per partition (see [`Partition`]):
//!
//! ```text
//! {mode}Sessions_{ctx}        # versioned session records (JSON array)
//! {mode}History_{ctx}         # flat history of older clients
//! {mode}CurrentSession_{ctx}  # current-session pointer
//! {mode}_session_{ctx}        # pointer written by older clients
//! ```

use crate::dto::{CACHED_SESSION_ENTITY, UNVERSIONED_SESSION_VERSION, create_cached_session_migrator};
use crate::storage::KeyValueStore;
use adaptiq_core::error::{AdaptiqError, Result};
use adaptiq_core::session::{
    CachedHistory, HistoryFormat, LegacyEntry, Partition, Session, SessionCache, detect_format,
};
use serde_json::Value;
use std::sync::Arc;

/// Local session cache persisted through a [`KeyValueStore`].
pub struct KeyValueSessionCache {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueSessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Decodes a stored session list, skipping records that cannot be read.
    fn decode_sessions(&self, partition: &Partition, raw: Value) -> Result<Vec<Session>> {
        let Value::Array(records) = raw else {
            return Err(AdaptiqError::Serialization {
                format: "JSON".to_string(),
                message: format!("session list of {} is not an array", partition),
            });
        };

        let migrator = create_cached_session_migrator();
        let mut sessions: Vec<Session> = Vec::with_capacity(records.len());
        for mut record in records {
            if let Value::Object(fields) = &mut record {
                fields
                    .entry("version")
                    .or_insert_with(|| Value::String(UNVERSIONED_SESSION_VERSION.to_string()));
            }

            let loaded: std::result::Result<Session, _> =
                migrator.load_flat_from(CACHED_SESSION_ENTITY, record);
            match loaded {
                Ok(mut session) => {
                    session.context_key = partition.context_key.clone();
                    session.mode = partition.mode;
                    sessions.push(session);
                }
                Err(e) => tracing::warn!("Skipping unreadable cached session in {}: {}", partition, e),
            }
        }
        Ok(sessions)
    }

    fn decode_legacy(&self, partition: &Partition, raw: Value) -> Result<CachedHistory> {
        match detect_format(&raw) {
            HistoryFormat::LegacyFlat => match serde_json::from_value::<Vec<LegacyEntry>>(raw) {
                Ok(entries) => Ok(CachedHistory::Legacy(entries)),
                Err(e) => {
                    tracing::warn!("Ignoring malformed legacy history of {}: {}", partition, e);
                    Ok(CachedHistory::Empty)
                }
            },
            HistoryFormat::SessionList => {
                Ok(CachedHistory::Sessions(self.decode_sessions(partition, raw)?))
            }
            HistoryFormat::Unknown => {
                tracing::warn!("Ignoring history of unknown shape in {}", partition);
                Ok(CachedHistory::Empty)
            }
        }
    }
}

impl SessionCache for KeyValueSessionCache {
    fn load(&self, partition: &Partition) -> Result<CachedHistory> {
        if let Some(raw) = self.store.get(&partition.sessions_key())? {
            match self.decode_sessions(partition, raw) {
                Ok(sessions) => return Ok(CachedHistory::Sessions(sessions)),
                Err(e) => tracing::warn!("Ignoring malformed session list of {}: {}", partition, e),
            }
        }

        match self.store.get(&partition.legacy_history_key())? {
            Some(raw) => self.decode_legacy(partition, raw),
            None => Ok(CachedHistory::Empty),
        }
    }

    fn store(&self, partition: &Partition, sessions: &[Session]) -> Result<()> {
        let migrator = create_cached_session_migrator();
        let records = sessions
            .iter()
            .map(|session| {
                let json = migrator.save_domain_flat(CACHED_SESSION_ENTITY, session)?;
                Ok(serde_json::from_str::<Value>(&json)?)
            })
            .collect::<Result<Vec<Value>>>()?;

        self.store
            .set(&partition.sessions_key(), Value::Array(records))?;
        self.store.remove(&partition.legacy_history_key())
    }

    fn clear(&self, partition: &Partition) -> Result<()> {
        for key in [
            partition.sessions_key(),
            partition.legacy_history_key(),
            partition.current_session_key(),
            partition.legacy_session_key(),
        ] {
            self.store.remove(&key)?;
        }
        Ok(())
    }

    fn current_session_id(&self, partition: &Partition) -> Result<Option<String>> {
        if let Some(Value::String(id)) = self.store.get(&partition.current_session_key())? {
            return Ok(Some(id));
        }

        // Adopt a pointer left by an older client
        match self.store.get(&partition.legacy_session_key())? {
            Some(Value::String(id)) if !id.is_empty() => {
                self.set_current_session_id(partition, &id)?;
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    fn set_current_session_id(&self, partition: &Partition, session_id: &str) -> Result<()> {
        self.store.set(
            &partition.current_session_key(),
            Value::String(session_id.to_string()),
        )?;
        self.store.remove(&partition.legacy_session_key())
    }

    fn clear_current_session_id(&self, partition: &Partition) -> Result<()> {
        self.store.remove(&partition.current_session_key())?;
        self.store.remove(&partition.legacy_session_key())
    }
}
