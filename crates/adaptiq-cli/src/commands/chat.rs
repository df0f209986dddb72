use super::print_json;
use crate::Scope;
use adaptiq_application::{ChatHistoryService, ChatRecord};
use anyhow::{Context, Result};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ChatAction {
    /// Append one question/answer exchange
    Save {
        /// Student message
        #[arg(long)]
        user: String,
        /// Tutor answer
        #[arg(long)]
        bot: String,
        /// Target session (defaults to the current one)
        #[arg(long)]
        session: Option<String>,
    },
}

pub async fn run(service: &ChatHistoryService, scope: &Scope, action: ChatAction) -> Result<()> {
    match action {
        ChatAction::Save { user, bot, session } => {
            let mut record = ChatRecord::exchange(user, bot);
            if let Some(session_id) = session {
                record = record.in_session(session_id);
            }
            let exchange = service
                .save_chat_history(&scope.context, scope.mode, record)
                .await
                .context("Exchange was not recorded")?;
            print_json(&exchange)
        }
    }
}
