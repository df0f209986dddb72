//! Local cache trait.
//!
//! Defines the interface for the synchronous, process-local tier of the
//! history. The remote tier is the [`DocumentStore`](crate::document::DocumentStore).

use super::legacy::LegacyEntry;
use super::mode::Partition;
use super::model::Session;
use crate::error::Result;

/// What a partition of the local cache currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedHistory {
    /// Sessions in the current format
    Sessions(Vec<Session>),
    /// Only the pre-session flat history is present
    Legacy(Vec<LegacyEntry>),
    /// Nothing stored (or nothing readable)
    Empty,
}

/// The local, synchronous tier of conversation history.
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Malformed stored data: report it as [`CachedHistory::Empty`] rather than
///   an error; `Err` is reserved for the store itself being unusable.
/// - Record versioning: older record shapes must load as current `Session`s.
pub trait SessionCache: Send + Sync {
    /// Loads everything stored for a partition.
    fn load(&self, partition: &Partition) -> Result<CachedHistory>;

    /// Replaces the partition's session list.
    ///
    /// Writing the current format supersedes any legacy flat history of the
    /// same partition.
    fn store(&self, partition: &Partition, sessions: &[Session]) -> Result<()>;

    /// Removes every key of the partition, legacy keys and the current-session
    /// pointer included.
    fn clear(&self, partition: &Partition) -> Result<()>;

    /// Gets the current-session pointer of a partition.
    fn current_session_id(&self, partition: &Partition) -> Result<Option<String>>;

    /// Sets the current-session pointer of a partition.
    fn set_current_session_id(&self, partition: &Partition, session_id: &str) -> Result<()>;

    /// Clears the current-session pointer of a partition.
    fn clear_current_session_id(&self, partition: &Partition) -> Result<()>;
}
