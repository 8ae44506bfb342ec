//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: correspondents, incoming events and dispatch snapshots
//! - `message`: transcript entries (`HistoryEntry`, `MessageRole`)
//! - `output`: output units emitted towards the presentation sink

mod message;
mod model;
mod output;

pub use message::{HistoryEntry, MessageRole};
pub use model::{CorrespondentId, DispatchRequest, IncomingMessage};
pub use output::{Bubble, OutputUnit};
