//! Error types for the Parley relay.

use thiserror::Error;

/// Errors from storage, configuration and plumbing.
///
/// Failures the dispatch core reacts to (an AI call that went wrong, a sink
/// command that failed) have their own types in [`crate::backend`] and
/// [`crate::presentation`]; they never become a `ParleyError`.
#[derive(Error, Debug, Clone)]
pub enum ParleyError {
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A file could not be parsed or written in the given format.
    #[error("{format} error: {message}")]
    Serialization {
        format: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// History or processing-state storage is unusable (lock, corrupt file).
    #[error("Storage error: {0}")]
    DataAccess(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for ParleyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON",
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML",
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ParleyError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML",
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
