//! Configuration model.
//!
//! Loading (file lookup, environment overrides) lives in
//! `parley-infrastructure`; this module only defines the shape, defaults and
//! validation rules.

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on bubbles produced from one reply. Not configurable.
pub const MAX_BUBBLES: usize = 5;

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm having trouble processing your message right now. Please try again in a moment.";

/// Values consumed by the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Quiet period before a burst of messages is dispatched.
    pub debounce_ms: u64,
    /// Maximum number of AI calls in flight at once.
    pub max_concurrent_calls: usize,
    /// Number of history entries passed to the AI as context.
    pub history_context_size: usize,
    pub bubble_delay_min_ms: u64,
    pub bubble_delay_max_ms: u64,
    /// Optional extra timeout around the AI call. The backend's own timeout
    /// applies regardless.
    pub ai_call_timeout_ms: Option<u64>,
    /// Extra attempts for a bubble whose send failed. 0 = best-effort, no retry.
    /// Each attempt is itself subject to the sink's own `retry_count`.
    pub sink_retry_attempts: u32,
    /// Consecutive failed bubbles after which the rest of a reply is dropped.
    pub max_consecutive_sink_failures: u32,
    pub fallback_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_concurrent_calls: 20,
            history_context_size: 20,
            bubble_delay_min_ms: 1000,
            bubble_delay_max_ms: 3000,
            ai_call_timeout_ms: None,
            sink_retry_attempts: 0,
            max_consecutive_sink_failures: 2,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn bubble_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.bubble_delay_min_ms),
            Duration::from_millis(self.bubble_delay_max_ms),
        )
    }

    pub fn ai_call_timeout(&self) -> Option<Duration> {
        self.ai_call_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(ParleyError::config("dispatch.max_concurrent_calls must be positive"));
        }
        if self.bubble_delay_min_ms > self.bubble_delay_max_ms {
            return Err(ParleyError::config(
                "dispatch.bubble_delay_min_ms must not exceed dispatch.bubble_delay_max_ms",
            ));
        }
        if self.max_consecutive_sink_failures == 0 {
            return Err(ParleyError::config(
                "dispatch.max_consecutive_sink_failures must be positive",
            ));
        }
        Ok(())
    }
}

/// HTTP AI backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.as_deref().is_none_or(str::is_empty) {
            return Err(ParleyError::config("ai.endpoint (PARLEY_AI_ENDPOINT) is required"));
        }
        if self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ParleyError::config("ai.api_key (PARLEY_AI_API_KEY) is required"));
        }
        if self.max_retries == 0 {
            return Err(ParleyError::config("ai.max_retries must be at least 1"));
        }
        Ok(())
    }
}

/// Incoming message source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON-lines inbox to poll. Defaults to `<data_dir>/inbox.jsonl`.
    pub inbox_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            inbox_path: None,
            poll_interval_ms: 500,
        }
    }
}

impl SourceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Render output units to the terminal.
    #[default]
    Console,
    /// Drive Messages.app through `osascript`.
    Osascript,
}

/// Presentation sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub typing_indicator: bool,
    /// Attempts per send command (osascript sink only). Typing and read
    /// receipts always run once.
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Console,
            typing_indicator: true,
            retry_count: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for history and processing state. Defaults to the platform
    /// data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Optional log file, appended to in addition to stdout.
    pub file: Option<PathBuf>,
}

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub dispatch: DispatchConfig,
    pub ai: AiConfig,
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl ParleyConfig {
    /// Validation for commands that run the relay against the AI backend.
    pub fn validate(&self) -> Result<()> {
        self.ai.validate()?;
        self.dispatch.validate()?;
        if self.source.poll_interval_ms == 0 {
            return Err(ParleyError::config("source.poll_interval_ms must be positive"));
        }
        Ok(())
    }
}
