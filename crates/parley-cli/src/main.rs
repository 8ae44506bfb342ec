use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Parley - paced, per-correspondent relay between a message feed and an AI backend", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "parley_application=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Relay messages from the inbox feed to the AI backend until interrupted
    Run {
        /// Inbox file to poll (overrides source.inbox_path)
        #[arg(long)]
        inbox: Option<PathBuf>,
    },
    /// Talk to the AI backend from the terminal through the same pacing pipeline
    Chat {
        /// Correspondent id the typed lines are attributed to
        #[arg(long, default_value = "local")]
        sender: String,

        /// Keep the transcript in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Inspect or clear stored history and the resume cursor
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DbAction {
    /// Show message counts and the resume cursor
    Stats,
    /// Delete all transcripts, keeping the resume cursor
    ClearMessages,
    /// Move the resume cursor; messages after it are relayed again on the next run
    ResetCursor {
        /// New cursor value. 0 removes the state so the next run starts fresh
        #[arg(long, default_value_t = 0)]
        to: i64,
    },
    /// Delete all transcripts and the resume cursor
    ClearAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, paths) = commands::load_config(cli.config.as_deref())?;

    let default_level = match cli.command {
        Commands::Run { .. } => "info",
        Commands::Chat { .. } | Commands::Db { .. } => "warn",
    };
    let log_file = match cli.command {
        Commands::Run { .. } => Some(
            config
                .logging
                .file
                .clone()
                .unwrap_or_else(|| paths.log_file()),
        ),
        _ => config.logging.file.clone(),
    };
    logging::init(logging::LogOptions {
        level: cli.log_level.as_deref(),
        default_level,
        json: cli.log_json,
        file: log_file.as_deref(),
    })?;

    match cli.command {
        Commands::Run { inbox } => commands::run::execute(config, paths, inbox).await?,
        Commands::Chat { sender, ephemeral } => {
            commands::chat::execute(config, paths, sender, ephemeral).await?
        }
        Commands::Db { action } => commands::db::execute(&paths, action).await?,
    }

    Ok(())
}
