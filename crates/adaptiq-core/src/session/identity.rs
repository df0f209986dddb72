//! Session identifiers and current-session pointers.

use super::mode::Partition;
use super::repository::SessionCache;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Mints a new opaque session id.
///
/// Combines the wall clock in milliseconds with 48 random bits, so ids from
/// rapid successive calls differ.
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..12])
}

/// Owns the "current session" pointer of each partition.
///
/// The pointer lives in the injected local cache, so two `SessionIdentity`
/// values over the same cache agree on the current session.
#[derive(Clone)]
pub struct SessionIdentity {
    cache: Arc<dyn SessionCache>,
}

impl SessionIdentity {
    pub fn new(cache: Arc<dyn SessionCache>) -> Self {
        Self { cache }
    }

    /// Returns the current session of the partition, minting one if needed.
    ///
    /// Never fails: when the cache cannot be read or written the fresh id is
    /// still returned.
    pub fn get_or_create(&self, partition: &Partition) -> String {
        match self.cache.current_session_id(partition) {
            Ok(Some(session_id)) => {
                tracing::debug!("Continuing session {} for {}", session_id, partition);
                session_id
            }
            Ok(None) => self.force_new(partition),
            Err(e) => {
                tracing::warn!("Failed to read current session for {}: {}", partition, e);
                self.force_new(partition)
            }
        }
    }

    /// Mints a fresh id and makes it the partition's current session.
    pub fn force_new(&self, partition: &Partition) -> String {
        let session_id = generate_session_id();
        if let Err(e) = self.cache.set_current_session_id(partition, &session_id) {
            tracing::warn!("Failed to store current session for {}: {}", partition, e);
        }
        tracing::debug!("Started session {} for {}", session_id, partition);
        session_id
    }

    /// Forgets the partition's current session.
    pub fn end_current(&self, partition: &Partition) {
        if let Err(e) = self.cache.clear_current_session_id(partition) {
            tracing::warn!("Failed to clear current session for {}: {}", partition, e);
        }
    }
}
