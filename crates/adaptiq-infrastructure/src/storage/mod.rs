//! Storage layer for atomic file operations and key-value stores.

mod atomic_file;
mod kv;

pub use atomic_file::{AtomicFile, AtomicFileError, FileFormat};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
