//! Tracing subscriber setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub struct LogOptions<'a> {
    /// Explicit filter from `--log-level`; wins over `RUST_LOG`.
    pub level: Option<&'a str>,
    /// Filter used when neither `--log-level` nor `RUST_LOG` is set.
    pub default_level: &'a str,
    pub json: bool,
    /// Appends plain-text logs here as well as to stdout.
    pub file: Option<&'a Path>,
}

pub fn init(options: LogOptions<'_>) -> Result<()> {
    let filter = build_filter(options.level, options.default_level)?;

    let file_layer = match options.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let json_layer = options.json.then(|| fmt::layer().json().with_current_span(false));
    let text_layer = (!options.json).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn build_filter(level: Option<&str>, default_level: &str) -> Result<EnvFilter> {
    match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log filter '{level}'"))
        }
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level))),
    }
}
