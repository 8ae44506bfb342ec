//! Transcript entries stored in the history store.

use super::model::CorrespondentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the correspondent.
    User,
    /// Reply produced by the AI backend.
    Assistant,
}

impl MessageRole {
    pub fn from_user_flag(is_from_user: bool) -> Self {
        if is_from_user { Self::User } else { Self::Assistant }
    }

    pub fn is_user(self) -> bool {
        matches!(self, Self::User)
    }
}

/// A single entry of a correspondent's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: CorrespondentId,
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn is_from_user(&self) -> bool {
        self.role.is_user()
    }
}
