//! Configuration loading.
//!
//! Reads `config.toml` (missing file means defaults) and then applies
//! `PARLEY_*` environment overrides on top.

use crate::paths::ParleyPaths;
use parley_core::config::ParleyConfig;
use parley_core::error::{ParleyError, Result};
use std::path::{Path, PathBuf};

pub const ENV_AI_ENDPOINT: &str = "PARLEY_AI_ENDPOINT";
pub const ENV_AI_API_KEY: &str = "PARLEY_AI_API_KEY";
pub const ENV_POLL_INTERVAL_MS: &str = "PARLEY_POLL_INTERVAL_MS";
pub const ENV_HISTORY_LIMIT: &str = "PARLEY_HISTORY_LIMIT";

/// Loads [`ParleyConfig`] from a file plus the environment.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    /// Uses `path`, or the platform default `config.toml` when `None`.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => ParleyPaths::config_file()?,
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file and applies overrides from the process environment.
    pub fn load(&self) -> Result<ParleyConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Loads the file and applies overrides looked up through `env`.
    pub fn load_with_env<F>(&self, env: F) -> Result<ParleyConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.read_file()?;
        apply_env_overrides(&mut config, env)?;
        Ok(config)
    }

    fn read_file(&self) -> Result<ParleyConfig> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(ParleyConfig::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            ParleyError::config(format!("Invalid config file {}: {}", self.path.display(), e))
        })
    }
}

/// Applies `PARLEY_*` overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ParleyConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    if let Some(endpoint) = lookup(ENV_AI_ENDPOINT) {
        config.ai.endpoint = Some(endpoint);
    }
    if let Some(api_key) = lookup(ENV_AI_API_KEY) {
        config.ai.api_key = Some(api_key);
    }
    if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
        config.source.poll_interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_HISTORY_LIMIT) {
        config.dispatch.history_context_size = parse_env(ENV_HISTORY_LIMIT, &value)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ParleyError::config(format!("{key} must be a non-negative integer, got '{value}'")))
}
