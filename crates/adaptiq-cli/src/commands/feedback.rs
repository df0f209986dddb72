use super::print_json;
use crate::Scope;
use adaptiq_application::ChatHistoryService;
use adaptiq_core::session::{FeedbackUpdate, MessageRef};
use anyhow::{Result, bail};
use clap::Args;
use serde_json::json;

#[derive(Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["message_id", "timestamp"])))]
pub struct FeedbackArgs {
    /// Session holding the message
    #[arg(long)]
    pub session: String,

    /// Id of the assistant message
    #[arg(long)]
    pub message_id: Option<String>,

    /// Timestamp of the assistant message
    #[arg(long)]
    pub timestamp: Option<String>,

    #[arg(long)]
    pub like: bool,

    #[arg(long)]
    pub dislike: bool,

    /// Mark the answer as regenerated
    #[arg(long)]
    pub regenerated: bool,

    /// Mark the answer as copied
    #[arg(long)]
    pub copied: bool,

    /// Free-text comment
    #[arg(long)]
    pub text: Option<String>,
}

impl FeedbackArgs {
    fn target(&self) -> Option<MessageRef> {
        match (&self.message_id, &self.timestamp) {
            (Some(id), _) => Some(MessageRef::Id(id.clone())),
            (None, Some(ts)) => Some(MessageRef::Timestamp(ts.clone())),
            (None, None) => None,
        }
    }

    fn update(&self) -> FeedbackUpdate {
        FeedbackUpdate {
            liked: self.like.then_some(true),
            disliked: self.dislike.then_some(true),
            regenerated: self.regenerated.then_some(true),
            copied_response: self.copied.then_some(true),
            text_feedback: self.text.clone(),
        }
    }
}

pub async fn run(service: &ChatHistoryService, scope: &Scope, args: FeedbackArgs) -> Result<()> {
    let Some(target) = args.target() else {
        bail!("Either --message-id or --timestamp is required");
    };
    let update = args.update();
    if update.is_empty() {
        bail!("No feedback given; pass --like, --dislike, --regenerated, --copied or --text");
    }

    let updated = service
        .update_message_feedback(&scope.context, scope.mode, &args.session, &target, &update)
        .await;

    print_json(&json!({
        "sessionId": args.session,
        "updated": updated,
    }))
}
