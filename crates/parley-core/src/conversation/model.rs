//! Conversation domain model.
//!
//! Correspondents, incoming message events and the dispatch snapshots the
//! relay builds from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable key identifying one conversational party (e.g. a phone
/// number or an iMessage handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrespondentId(String);

impl CorrespondentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrespondentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrespondentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrespondentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single message received from the event source.
///
/// `source_seq` is assigned by the source in arrival order and is the only
/// ordering the relay trusts for a given sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub sender: CorrespondentId,
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub source_seq: i64,
}

impl IncomingMessage {
    pub fn new(sender: impl Into<CorrespondentId>, text: impl Into<String>, source_seq: i64) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            received_at: Utc::now(),
            source_seq,
        }
    }
}

/// Snapshot of a session's pending buffer taken when its debounce timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub sender: CorrespondentId,
    /// Messages folded into this dispatch, oldest first.
    pub messages: Vec<IncomingMessage>,
    /// Session generation at fire time. A mismatch on completion means the
    /// request was superseded.
    pub generation: u64,
    /// The subset of `messages` not yet written to the history store.
    pub unrecorded: Vec<IncomingMessage>,
}

impl DispatchRequest {
    /// Text handed to the AI backend: every folded message, one per line.
    pub fn combined_text(&self) -> String {
        self.messages
            .iter()
            .map(|message| message.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn last_seq(&self) -> Option<i64> {
        self.messages.last().map(|message| message.source_seq)
    }
}
