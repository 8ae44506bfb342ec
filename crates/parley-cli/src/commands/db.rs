use crate::DbAction;
use anyhow::{Context, Result};
use colored::Colorize;
use parley_core::feed::ProcessingStateRepository;
use parley_core::history::HistoryStore;
use parley_infrastructure::{ParleyPaths, TomlHistoryStore, TomlProcessingStateRepository};

pub async fn execute(paths: &ParleyPaths, action: DbAction) -> Result<()> {
    let history = TomlHistoryStore::new(paths.history_dir());
    let state = TomlProcessingStateRepository::open(paths.state_file())
        .await
        .context("Failed to open processing state")?;

    for line in apply(&history, &state, action).await? {
        println!("{line}");
    }
    Ok(())
}

/// Performs `action` and returns the report lines to print.
async fn apply(
    history: &TomlHistoryStore,
    state: &TomlProcessingStateRepository,
    action: DbAction,
) -> Result<Vec<String>> {
    let lines = match action {
        DbAction::Stats => {
            let stats = history.stats().await?;
            let cursor = state.last_processed_seq().await?;
            vec![
                "Database statistics".bold().to_string(),
                format!("  Total messages:       {}", stats.total_messages),
                format!("  User messages:        {}", stats.user_messages),
                format!("  AI responses:         {}", stats.assistant_messages),
                format!("  Unique conversations: {}", stats.distinct_senders),
                format!("  Resume cursor:        {cursor}"),
            ]
        }
        DbAction::ClearMessages => {
            let removed = history.clear_all().await?;
            vec![
                format!("Deleted {removed} messages").green().to_string(),
                "Resume cursor has been preserved.".to_string(),
            ]
        }
        DbAction::ResetCursor { to } if to <= 0 => {
            state.delete().await?;
            vec![
                "Resume cursor removed".green().to_string(),
                "The next run starts from the end of the inbox, skipping everything already in it."
                    .yellow()
                    .to_string(),
            ]
        }
        DbAction::ResetCursor { to } => {
            state.set_last_processed_seq(to).await?;
            vec![
                format!("Resume cursor set to {to}").green().to_string(),
                format!("WARNING: every inbox message after seq {to} will be relayed again on the next run.")
                    .yellow()
                    .to_string(),
            ]
        }
        DbAction::ClearAll => {
            let removed = history.clear_all().await?;
            let had_state = state.delete().await?;
            let mut lines = vec![format!("Deleted {removed} messages").green().to_string()];
            if had_state {
                lines.push("Resume cursor removed.".to_string());
            }
            lines
        }
    };
    Ok(lines)
}
