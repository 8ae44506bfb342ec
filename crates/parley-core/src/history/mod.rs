//! Conversation history store interface.
//!
//! Defines the append/read contract the dispatch core uses to keep a full
//! transcript per correspondent, plus the maintenance operations the CLI
//! exposes.

use crate::conversation::{CorrespondentId, HistoryEntry};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub distinct_senders: usize,
}

/// An abstract store for conversation transcripts.
///
/// # Implementation Notes
///
/// Implementations must preserve append order per sender; `read_recent`
/// returns the newest `limit` entries, oldest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one entry to the sender's transcript.
    async fn append(
        &self,
        sender: &CorrespondentId,
        text: &str,
        is_from_user: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Reads at most `limit` of the most recent entries, oldest first.
    async fn read_recent(&self, sender: &CorrespondentId, limit: usize)
    -> Result<Vec<HistoryEntry>>;

    /// Removes every entry for one sender.
    async fn clear_sender(&self, sender: &CorrespondentId) -> Result<()>;

    /// Removes every entry in the store and returns how many were deleted.
    async fn clear_all(&self) -> Result<usize>;

    async fn stats(&self) -> Result<HistoryStats>;
}
