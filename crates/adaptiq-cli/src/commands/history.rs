use super::print_json;
use crate::Scope;
use adaptiq_application::ChatHistoryService;
use anyhow::{Result, bail};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List sessions of the selected mode, most recent first
    List {
        /// Maximum number of sessions (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List sessions of both modes
    All {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one session with all its messages
    Show {
        /// Session id
        session_id: String,
    },
    /// Delete stored sessions of the context
    Clear {
        /// Clear chat and quiz history instead of only the selected mode
        #[arg(long)]
        all_modes: bool,
    },
}

pub async fn run(service: &ChatHistoryService, scope: &Scope, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List { limit } => {
            let sessions = service
                .get_chat_history(&scope.context, scope.mode, limit)
                .await;
            print_json(&sessions)
        }
        HistoryAction::All { limit } => {
            let history = service.get_all_chat_history(&scope.context, limit).await;
            print_json(&history)
        }
        HistoryAction::Show { session_id } => {
            match service
                .get_conversation_session(&scope.context, scope.mode, &session_id)
                .await
            {
                Some(session) => print_json(&session),
                None => bail!(
                    "Session {} not found in {} ({})",
                    session_id,
                    scope.context,
                    scope.mode
                ),
            }
        }
        HistoryAction::Clear { all_modes } => {
            let mode = (!all_modes).then_some(scope.mode);
            let report = service
                .clear_chat_history_report(&scope.context, mode)
                .await;
            for failed in report.failed_deletions() {
                tracing::warn!("Remote document {} was not deleted: {}", failed.path, failed.error);
            }
            print_json(&report)
        }
    }
}
