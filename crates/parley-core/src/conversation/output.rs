//! Output units consumed one at a time by the delivery serializer.

use super::model::CorrespondentId;
use std::time::Duration;

/// One outgoing bubble: a discrete message with its pacing delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub sender: CorrespondentId,
    pub text: String,
    /// Zero-based position within its response.
    pub ordinal: usize,
    /// Typing time shown before the bubble is sent.
    pub delay: Duration,
}

/// A single action against the presentation sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputUnit {
    TypingOn(CorrespondentId),
    Bubble(Bubble),
    TypingOff(CorrespondentId),
    ReadReceipt(CorrespondentId),
}

impl OutputUnit {
    pub fn sender(&self) -> &CorrespondentId {
        match self {
            Self::TypingOn(sender) | Self::TypingOff(sender) | Self::ReadReceipt(sender) => sender,
            Self::Bubble(bubble) => &bubble.sender,
        }
    }
}
