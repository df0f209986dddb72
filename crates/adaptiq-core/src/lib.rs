//! Domain layer of AdaptIQ conversation history.
//!
//! Holds the session model, feedback merging, legacy upgrade and the
//! [`session::SessionStore`] that reconciles a local cache with a remote
//! document store. Storage backends live in `adaptiq-infrastructure`.

pub mod config;
pub mod document;
pub mod error;
pub mod session;

// Re-export common error type
pub use error::AdaptiqError;
