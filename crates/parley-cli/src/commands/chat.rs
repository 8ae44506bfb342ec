//! Interactive chat: typed lines become incoming events for one fixed
//! correspondent and replies come back through the console sink, paced the
//! same way they would be on the real channel.

use anyhow::{Context, Result};
use colored::Colorize;
use parley_application::ConversationRelay;
use parley_core::config::ParleyConfig;
use parley_core::conversation::{CorrespondentId, IncomingMessage};
use parley_core::history::HistoryStore;
use parley_infrastructure::{InMemoryHistoryStore, ParleyPaths, TomlHistoryStore};
use parley_interaction::{ConsoleSink, HttpAiBackend};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Clear,
    History,
    Message(&'a str),
    Empty,
}

fn classify(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatInput::Empty,
        "exit" | "quit" | "q" => ChatInput::Quit,
        "clear" => ChatInput::Clear,
        "history" => ChatInput::History,
        _ => ChatInput::Message(trimmed),
    }
}

pub async fn execute(
    config: ParleyConfig,
    paths: ParleyPaths,
    sender: String,
    ephemeral: bool,
) -> Result<()> {
    config.dispatch.validate().context("Invalid dispatch configuration")?;
    let ai = Arc::new(HttpAiBackend::from_config(&config.ai)?);

    let history: Arc<dyn HistoryStore> = if ephemeral {
        Arc::new(InMemoryHistoryStore::new())
    } else {
        Arc::new(TomlHistoryStore::new(paths.history_dir()))
    };
    let sink = Arc::new(ConsoleSink::stdout(config.sink.typing_indicator));
    let relay = ConversationRelay::new(config.dispatch.clone(), ai, history.clone(), sink);

    let sender = CorrespondentId::new(sender);
    let context_size = config.dispatch.history_context_size;

    let mut rl = DefaultEditor::new()?;

    println!("{}", "=== Parley chat ===".bright_magenta().bold());
    println!(
        "{}",
        format!("Chatting as '{sender}'. Commands: history, clear, exit").bright_black()
    );
    println!();

    let mut seq: i64 = 0;
    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", format!("Input error: {e}").red());
                break;
            }
        };

        match classify(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Clear => {
                relay.reset_session(&sender).await;
                match history.clear_sender(&sender).await {
                    Ok(()) => println!("{}", "Conversation cleared.".bright_green()),
                    Err(e) => eprintln!("{}", format!("Failed to clear history: {e}").red()),
                }
            }
            ChatInput::History => match history.read_recent(&sender, context_size).await {
                Ok(entries) if entries.is_empty() => {
                    println!("{}", "No history yet.".bright_black())
                }
                Ok(entries) => {
                    for entry in entries {
                        let who = if entry.is_from_user() {
                            "you".green()
                        } else {
                            "ai".bright_blue()
                        };
                        let at = entry.timestamp.format("%H:%M:%S").to_string();
                        println!("{} {}: {}", at.bright_black(), who, entry.text);
                    }
                }
                Err(e) => eprintln!("{}", format!("Failed to read history: {e}").red()),
            },
            ChatInput::Message(text) => {
                let _ = rl.add_history_entry(text);
                seq += 1;
                relay
                    .on_incoming_message(IncomingMessage::new(sender.clone(), text, seq))
                    .await;
            }
        }
    }

    println!("{}", "Waiting for pending replies...".bright_black());
    relay.shutdown().await;
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}
