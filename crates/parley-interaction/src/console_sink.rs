//! ConsoleSink - renders output units to a terminal.

use async_trait::async_trait;
use colored::Colorize;
use parley_core::conversation::CorrespondentId;
use parley_core::presentation::{PresentationSink, SinkError};
use std::io::{self, Write};
use std::sync::Mutex;

pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
    show_typing: bool,
}

impl ConsoleSink {
    pub fn stdout(show_typing: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), show_typing)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, show_typing: bool) -> Self {
        Self {
            out: Mutex::new(out),
            show_typing,
        }
    }

    fn write_line(&self, line: String) -> Result<(), SinkError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Unavailable("console writer poisoned".to_string()))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PresentationSink for ConsoleSink {
    async fn set_typing(&self, sender: &CorrespondentId, on: bool) -> Result<(), SinkError> {
        if !self.show_typing || !on {
            return Ok(());
        }
        self.write_line(format!("{}", format!("  [to {sender}] typing...").dimmed()))
    }

    async fn send_text(&self, sender: &CorrespondentId, text: &str) -> Result<(), SinkError> {
        let prefix = format!("[to {sender}]").cyan().bold();
        self.write_line(format!("{prefix} {text}"))
    }

    async fn mark_read(&self, sender: &CorrespondentId) -> Result<(), SinkError> {
        self.write_line(format!("{}", format!("  [{sender}] read").dimmed()))
    }
}
