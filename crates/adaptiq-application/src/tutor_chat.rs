//! Tutoring chat use case.
//!
//! Turns a student question into a completion prompt that replays the recent
//! exchanges of the session, records the answer and supports regenerating a
//! discarded answer.

use crate::chat_history_service::{ChatHistoryService, ChatRecord};
use adaptiq_core::session::{
    ChatMode, Exchange, FeedbackUpdate, GENERAL_CHAT_CONTEXT, Message, MessageRef, MessageRole,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Text generation capability the tutor is built on.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Returns the whole completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Streams the completion for `prompt` in chunks.
    async fn generate_streaming(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}

/// Builds the prompt for one question.
///
/// Replays at most `max_exchanges` prior exchanges from `history`, skipping
/// answers the student asked to regenerate.
pub fn build_tutor_prompt(
    context_key: &str,
    mode: ChatMode,
    history: &[Message],
    question: &str,
    max_exchanges: usize,
) -> String {
    let mut prompt = match (mode, context_key == GENERAL_CHAT_CONTEXT) {
        (ChatMode::Quiz, _) => format!(
            "You are a tutor quizzing a student on {}. Ask or grade one question at a time and explain mistakes briefly.\n",
            context_key
        ),
        (ChatMode::Chat, true) => {
            "You are a friendly study assistant. Answer clearly and check the student's understanding.\n"
                .to_string()
        }
        (ChatMode::Chat, false) => format!(
            "You are a patient tutor helping a student with {}. Explain step by step and keep answers focused.\n",
            context_key
        ),
    };

    let exchanges = prior_exchanges(history);
    let skip = exchanges.len().saturating_sub(max_exchanges);
    if skip < exchanges.len() {
        prompt.push_str("\nConversation so far:\n");
        for (user, assistant) in &exchanges[skip..] {
            prompt.push_str(&format!("Student: {}\nTutor: {}\n", user.content, assistant.content));
        }
    }

    prompt.push_str(&format!("\nStudent: {}\nTutor:", question));
    prompt
}

/// User/assistant pairs in order, without regenerated answers.
fn prior_exchanges(history: &[Message]) -> Vec<(&Message, &Message)> {
    history
        .windows(2)
        .filter(|pair| pair[0].role == MessageRole::User && pair[1].is_assistant())
        .filter(|pair| !pair[1].feedback.as_ref().is_some_and(|f| f.regenerated))
        .map(|pair| (&pair[0], &pair[1]))
        .collect()
}

/// Tutoring conversation over [`ChatHistoryService`] and a [`TextCompletion`].
pub struct TutorChatService {
    history: Arc<ChatHistoryService>,
    completion: Arc<dyn TextCompletion>,
}

impl TutorChatService {
    pub fn new(history: Arc<ChatHistoryService>, completion: Arc<dyn TextCompletion>) -> Self {
        Self { history, completion }
    }

    /// Answers `question` in the given (or current) session and records the
    /// exchange.
    pub async fn ask(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: Option<&str>,
        question: &str,
    ) -> Result<Exchange> {
        let session_id = self.resolve_session(context_key, mode, session_id);
        let prompt = self.prompt_for(context_key, mode, &session_id, question, None).await;

        let answer = self.completion.generate(&prompt).await?;
        self.record(context_key, mode, &session_id, question, answer).await
    }

    /// Like [`ask`](Self::ask), forwarding each chunk to `on_chunk` as it
    /// arrives. Nothing is recorded if the stream fails.
    pub async fn ask_streaming<F>(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: Option<&str>,
        question: &str,
        mut on_chunk: F,
    ) -> Result<Exchange>
    where
        F: FnMut(&str) + Send,
    {
        let session_id = self.resolve_session(context_key, mode, session_id);
        let prompt = self.prompt_for(context_key, mode, &session_id, question, None).await;

        let mut stream = self.completion.generate_streaming(&prompt).await?;
        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            answer.push_str(&chunk);
        }

        self.record(context_key, mode, &session_id, question, answer).await
    }

    /// Discards the assistant answer `target` and asks its question again.
    ///
    /// The old answer stays in the transcript marked `regenerated`; the new
    /// answer is appended as a fresh exchange.
    pub async fn regenerate(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: &str,
        target: &MessageRef,
    ) -> Result<Exchange> {
        let session = self
            .history
            .get_conversation_session(context_key, mode, session_id)
            .await
            .ok_or_else(|| anyhow!("Session not found: {}", session_id))?;

        let index = target
            .locate(&session.messages)
            .ok_or_else(|| anyhow!("No assistant message {:?} in session {}", target, session_id))?;
        let question = index
            .checked_sub(1)
            .and_then(|i| session.messages.get(i))
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .ok_or_else(|| anyhow!("Answer {:?} has no preceding question", target))?;

        self.history
            .update_message_feedback(context_key, mode, session_id, target, &FeedbackUpdate::regenerated())
            .await;

        let prompt = self
            .prompt_for(context_key, mode, session_id, &question, Some(index - 1))
            .await;
        let answer = self.completion.generate(&prompt).await?;
        tracing::debug!("Regenerated answer for session {}", session_id);

        self.record(context_key, mode, session_id, &question, answer).await
    }

    fn resolve_session(&self, context_key: &str, mode: ChatMode, session_id: Option<&str>) -> String {
        match session_id {
            Some(id) => id.to_string(),
            None => self.history.get_or_create_session_id(context_key, mode),
        }
    }

    /// Prompt for `question`, replaying the session up to `upto` messages.
    async fn prompt_for(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: &str,
        question: &str,
        upto: Option<usize>,
    ) -> String {
        let messages = self
            .history
            .get_conversation_session(context_key, mode, session_id)
            .await
            .map(|s| s.messages)
            .unwrap_or_default();
        let history = match upto {
            Some(end) => &messages[..end.min(messages.len())],
            None => &messages[..],
        };

        let context_name = ChatHistoryService::partition(context_key, mode).context_key;
        build_tutor_prompt(
            &context_name,
            mode,
            history,
            question,
            self.history.store().config().prompt_context_exchanges,
        )
    }

    async fn record(
        &self,
        context_key: &str,
        mode: ChatMode,
        session_id: &str,
        question: &str,
        answer: String,
    ) -> Result<Exchange> {
        let record = ChatRecord::exchange(question, answer.trim()).in_session(session_id);
        self.history
            .save_chat_history(context_key, mode, record)
            .await
            .ok_or_else(|| anyhow!("Exchange was not recorded"))
    }
}
