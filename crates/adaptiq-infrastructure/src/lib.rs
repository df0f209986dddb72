pub mod async_dir_document_store;
pub mod config_service;
pub mod dto;
pub mod in_memory_document_store;
pub mod kv_session_cache;
pub mod paths;
pub mod storage;

pub use crate::async_dir_document_store::AsyncDirDocumentStore;
pub use crate::config_service::{AppConfig, ConfigService};
pub use crate::in_memory_document_store::InMemoryDocumentStore;
pub use crate::kv_session_cache::KeyValueSessionCache;
