//! Convrag CLI
//!
//! Main entry point for the `convrag` command-line tool: index documents,
//! ask questions in a conversation, or serve the conversation over HTTP.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, ServeCommand, StatsCommand};
use convrag_core::logging::{self, LogFormat};
use convrag_core::{config::AppConfig, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// Convrag - conversational question answering over your documents
#[derive(Parser, Debug)]
#[command(name = "convrag")]
#[command(about = "Conversational RAG over an indexed document corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CONVRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CONVRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Generation provider (gemini, ollama)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask questions in a conversation
    Ask(AskCommand),

    /// Index documents into the vector index
    Index(IndexCommand),

    /// Serve the conversation over HTTP
    Serve(ServeCommand),

    /// Show vector index statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::Index(_) => "index",
            Self::Serve(_) => "serve",
            Self::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace, cli.config)?.with_overrides(
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // The server logs one JSON object per event; interactive commands stay readable
    let format = match cli.command {
        Commands::Serve(_) => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("Convrag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Generation: {}/{}",
        config.generation.provider,
        config.generation.model
    );

    config.ensure_convrag_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let result = async {
        match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Index(cmd) => cmd.execute(&config).await,
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
