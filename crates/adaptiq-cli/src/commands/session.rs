use super::print_json;
use crate::Scope;
use adaptiq_application::ChatHistoryService;
use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a new session and make it current
    New,
    /// Show the current session id, creating one if none is active
    Current,
    /// Forget the current session; the next message starts a new one
    End,
}

pub fn run(service: &ChatHistoryService, scope: &Scope, action: SessionAction) -> Result<()> {
    let session_id = match action {
        SessionAction::New => Some(service.force_new_session(&scope.context, scope.mode)),
        SessionAction::Current => Some(service.get_or_create_session_id(&scope.context, scope.mode)),
        SessionAction::End => {
            service.end_current_session(&scope.context, scope.mode);
            None
        }
    };

    print_json(&json!({
        "context": scope.context,
        "mode": scope.mode,
        "sessionId": session_id,
    }))
}
