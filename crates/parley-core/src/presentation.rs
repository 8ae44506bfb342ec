//! Presentation sink contract.
//!
//! The sink renders typing indicators, sends text and marks conversations as
//! read on the underlying messaging network. It assumes single-actor use; the
//! delivery serializer in `parley-application` is what guarantees it.

use crate::conversation::CorrespondentId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The automation command ran and reported failure.
    #[error("sink command failed: {0}")]
    CommandFailed(String),

    /// The automation command could not be started.
    #[error("failed to start sink command: {0}")]
    Spawn(String),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PresentationSink: Send + Sync {
    async fn set_typing(&self, sender: &CorrespondentId, on: bool) -> Result<(), SinkError>;

    async fn send_text(&self, sender: &CorrespondentId, text: &str) -> Result<(), SinkError>;

    async fn mark_read(&self, sender: &CorrespondentId) -> Result<(), SinkError>;
}
