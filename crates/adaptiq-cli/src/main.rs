use adaptiq_application::ChatHistoryService;
use adaptiq_core::session::{ChatMode, GENERAL_CHAT_CONTEXT};
use adaptiq_infrastructure::ConfigService;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptiq")]
#[command(about = "AdaptIQ CLI - inspect and manage tutoring chat history", long_about = None)]
struct Cli {
    #[command(flatten)]
    scope: Scope,

    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Partition every command operates on.
#[derive(Args, Clone)]
pub struct Scope {
    /// Course or topic name
    #[arg(long, global = true, default_value = GENERAL_CHAT_CONTEXT)]
    pub context: String,

    /// Conversation mode: chat or quiz
    #[arg(long, global = true, default_value_t = ChatMode::Chat)]
    pub mode: ChatMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the current session pointer
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// List, show and clear stored sessions
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Record chat exchanges
    Chat {
        #[command(subcommand)]
        action: commands::chat::ChatAction,
    },
    /// Record feedback on an assistant message
    Feedback(commands::feedback::FeedbackArgs),
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let config = config_service
        .get_config()
        .with_context(|| format!("Failed to load {}", config_service.path().display()))?;
    init_tracing(&config.logging.filter);

    let service = ChatHistoryService::open(&config).await?;
    let scope = cli.scope;

    match cli.command {
        Commands::Session { action } => commands::session::run(&service, &scope, action)?,
        Commands::History { action } => commands::history::run(&service, &scope, action).await?,
        Commands::Chat { action } => commands::chat::run(&service, &scope, action).await?,
        Commands::Feedback(args) => commands::feedback::run(&service, &scope, args).await?,
    }

    Ok(())
}
