pub mod chat;
pub mod db;
pub mod run;

use anyhow::{Context, Result};
use parley_core::config::{ParleyConfig, SinkConfig, SinkKind};
use parley_core::presentation::PresentationSink;
use parley_infrastructure::{ConfigService, ParleyPaths};
use parley_interaction::{ConsoleSink, OsascriptSink};
use std::path::Path;
use std::sync::Arc;

/// Loads the configuration and resolves the data directory it points at.
pub fn load_config(path: Option<&Path>) -> Result<(ParleyConfig, ParleyPaths)> {
    let service = ConfigService::new(path)?;
    let config = service
        .load()
        .with_context(|| format!("Failed to load config from {}", service.path().display()))?;
    let paths = ParleyPaths::new(config.storage.data_dir.as_deref())?;
    Ok((config, paths))
}

pub fn build_sink(config: &SinkConfig) -> Arc<dyn PresentationSink> {
    match config.kind {
        SinkKind::Console => Arc::new(ConsoleSink::stdout(config.typing_indicator)),
        SinkKind::Osascript => Arc::new(OsascriptSink::new(config)),
    }
}
