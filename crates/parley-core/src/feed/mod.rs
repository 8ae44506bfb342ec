//! Incoming message feed and processing state.
//!
//! A [`MessageFeed`] is the raw data source (an inbox file, a chat database)
//! that a polling event source reads from. The [`ProcessingStateRepository`]
//! keeps the resume cursor so a restart does not replay already-seen events.

use crate::conversation::IncomingMessage;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row of a message feed, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub message: IncomingMessage,
    /// True for messages we sent ourselves; these are never relayed.
    pub is_from_me: bool,
}

impl FeedRecord {
    /// Whether the record should become an incoming message event.
    pub fn is_relayable(&self) -> bool {
        !self.is_from_me && !self.message.text.trim().is_empty()
    }
}

#[async_trait]
pub trait MessageFeed: Send + Sync {
    /// Highest sequence number currently present in the feed (0 when empty).
    async fn max_seq(&self) -> Result<i64>;

    /// All records with a sequence number strictly greater than `after`,
    /// in ascending sequence order.
    async fn fetch_after(&self, after: i64) -> Result<Vec<FeedRecord>>;
}

/// Persistent processing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    /// Highest feed sequence already handed to the relay. 0 means "never ran".
    #[serde(default)]
    pub last_processed_seq: i64,
}

/// Repository for the resume cursor.
#[async_trait]
pub trait ProcessingStateRepository: Send + Sync {
    async fn last_processed_seq(&self) -> Result<i64>;

    async fn set_last_processed_seq(&self, seq: i64) -> Result<()>;
}
