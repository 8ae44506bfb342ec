//! OsascriptSink - drives Messages.app through AppleScript.
//!
//! Messages has no scripting hook for typing indicators, so "typing on"
//! opens the conversation and types a placeholder into the compose field
//! through System Events, and "typing off" clears it again. Both are skipped
//! when the indicator is disabled.
//!
//! Only sends are retried with backoff. Typing and read-receipt scripts run
//! once, since the caller holds the delivery lock while they run.

use async_trait::async_trait;
use parley_core::config::SinkConfig;
use parley_core::conversation::CorrespondentId;
use parley_core::presentation::{PresentationSink, SinkError};
use std::time::Duration;
use tokio::process::Command;

const TYPING_PLACEHOLDER: &str = "…";

pub struct OsascriptSink {
    program: String,
    retry_count: u32,
    retry_delay: Duration,
    typing_indicator: bool,
}

impl OsascriptSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            program: "osascript".to_string(),
            retry_count: config.retry_count.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            typing_indicator: config.typing_indicator,
        }
    }

    /// Replaces the `osascript` executable (used by tests).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Runs `script`, retrying with exponential backoff on failure.
    async fn run_with_retry(&self, action: &'static str, script: &str) -> Result<(), SinkError> {
        let mut attempt = 0;
        loop {
            let result = self.run_once(script).await;
            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt + 1 < self.retry_count => {
                    let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(attempt));
                    tracing::warn!(
                        action,
                        attempt = attempt + 1,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "AppleScript failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(action, attempts = attempt + 1, error = %err, "AppleScript failed");
                    return Err(err);
                }
            }
        }
    }

    async fn run_single(&self, action: &'static str, script: &str) -> Result<(), SinkError> {
        self.run_once(script).await.inspect_err(|err| {
            tracing::debug!(action, error = %err, "AppleScript failed");
        })
    }

    async fn run_once(&self, script: &str) -> Result<(), SinkError> {
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .output()
            .await
            .map_err(|e| SinkError::Spawn(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(SinkError::CommandFailed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr
            )))
        }
    }
}

#[async_trait]
impl PresentationSink for OsascriptSink {
    async fn set_typing(&self, sender: &CorrespondentId, on: bool) -> Result<(), SinkError> {
        if !self.typing_indicator {
            return Ok(());
        }
        self.run_single("typing", &typing_script(sender.as_str(), on))
            .await
    }

    async fn send_text(&self, sender: &CorrespondentId, text: &str) -> Result<(), SinkError> {
        self.run_with_retry("send", &send_script(sender.as_str(), text)).await?;
        tracing::info!(sender = %sender, "Sent message");
        Ok(())
    }

    async fn mark_read(&self, sender: &CorrespondentId) -> Result<(), SinkError> {
        self.run_single("mark_read", &open_conversation_script(sender.as_str()))
            .await
    }
}

/// Escapes text for use inside an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn send_script(recipient: &str, text: &str) -> String {
    format!(
        r#"tell application "Messages"
    set targetService to 1st account whose service type = iMessage
    set targetBuddy to participant "{recipient}" of targetService
    send "{text}" to targetBuddy
end tell"#,
        recipient = escape_applescript(recipient),
        text = escape_applescript(text),
    )
}

fn open_conversation_script(recipient: &str) -> String {
    format!(
        r#"tell application "Messages" to activate
open location "imessage://{recipient}""#,
        recipient = escape_applescript(recipient),
    )
}

fn typing_script(recipient: &str, on: bool) -> String {
    let keys = if on {
        format!(r#"keystroke "{TYPING_PLACEHOLDER}""#)
    } else {
        "keystroke \"a\" using command down\n        key code 51".to_string()
    };
    format!(
        r#"{open}
delay 0.2
tell application "System Events"
    tell process "Messages"
        {keys}
    end tell
end tell"#,
        open = open_conversation_script(recipient),
    )
}
