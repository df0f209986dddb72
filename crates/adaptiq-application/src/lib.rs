//! Application layer for AdaptIQ.
//!
//! This crate provides the use cases the chat and quiz screens call,
//! coordinating the domain `SessionStore` with the infrastructure backends.

pub mod chat_history_service;
pub mod tutor_chat;

pub use chat_history_service::{ChatHistoryService, ChatRecord, CombinedHistory};
pub use tutor_chat::{TextCompletion, TutorChatService, build_tutor_prompt};
