//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned schema of local cache records. They are
//! private to the infrastructure layer and handle the evolution of the
//! storage format over time.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes (field removal, type changes)
//! - **MINOR (1.X.0)**: Backward-compatible additions (new optional fields)
//!
//! ### Cached Session Version History
//! - **1.0.0**: Unversioned records of older clients (no message ids)
//! - **1.1.0**: Message ids, typed timestamps and `feedbackStats`

mod session;

// Re-export session DTOs and migrator
pub use session::{
    CACHED_SESSION_ENTITY, CachedMessageV1_0_0, CachedSessionDTO, CachedSessionV1_0_0,
    CachedSessionV1_1_0, UNVERSIONED_SESSION_VERSION, create_cached_session_migrator,
};
