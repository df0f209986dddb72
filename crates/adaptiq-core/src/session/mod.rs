//! Conversation sessions and feedback.
//!
//! # Module Structure
//!
//! - `mode`: Chat modes and history partitions (`ChatMode`, `Partition`)
//! - `message`: Messages and message references (`Message`, `MessageRef`)
//! - `feedback`: Feedback records and merging (`FeedbackRecord`, `merge`)
//! - `model`: Session aggregate (`Session`, `SessionSummary`)
//! - `identity`: Session ids and current-session pointers (`SessionIdentity`)
//! - `legacy`: Flat history upgrade (`LegacyMigrator`)
//! - `repository`: Local cache trait (`SessionCache`)
//! - `store`: Dual-tier history (`SessionStore`)
//!
//! # Usage
//!
//! ```ignore
//! use adaptiq_core::session::{ChatMode, Partition, SessionStore};
//! ```

mod feedback;
mod identity;
mod legacy;
mod message;
mod mode;
mod model;
mod repository;
mod store;

// Re-export public API
pub use feedback::{FeedbackRecord, FeedbackTransition, FeedbackUpdate, Sentiment, merge};
pub use identity::{SessionIdentity, generate_session_id};
pub use legacy::{HistoryFormat, LegacyEntry, LegacyMigrator, detect_format};
pub use message::{Message, MessageRef, MessageRole, format_timestamp};
pub use mode::{ChatMode, GENERAL_CHAT_CONTEXT, Partition, normalize_context_id};
pub use model::{Exchange, FeedbackStats, Session, SessionSummary, derive_title};
pub use repository::{CachedHistory, SessionCache};
pub use store::{ClearReport, FailedDeletion, PartitionClearReport, SessionStore};
