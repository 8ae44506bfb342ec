//! Session registry and per-correspondent state.
//!
//! - `model`: the debounce / dispatch state machine for one correspondent
//! - `registry`: one session per correspondent

mod model;
mod registry;

pub use model::{ConversationSession, SessionSnapshot, TimerOutcome};
pub use registry::{SessionHandle, SessionRegistry};
