//! AI backend call contract.

use crate::conversation::{CorrespondentId, HistoryEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by an [`AiBackend`].
///
/// The dispatch core treats all of them alike (fallback bubble, no retry);
/// the distinction matters to backends that implement their own retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiCallError {
    #[error("AI call timed out")]
    Timeout,

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI backend returned status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("AI backend returned an empty reply")]
    EmptyReply,

    #[error("AI backend response could not be parsed: {0}")]
    MalformedResponse(String),
}

impl AiCallError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Http { retryable, .. } => *retryable,
            Self::EmptyReply | Self::MalformedResponse(_) => false,
        }
    }
}

/// An external AI that turns a message plus context into a reply.
///
/// Calls may be slow and may fail. No ordering is required between concurrent
/// calls for different senders.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn call(
        &self,
        sender: &CorrespondentId,
        latest_text: &str,
        context: &[HistoryEntry],
    ) -> Result<String, AiCallError>;
}
