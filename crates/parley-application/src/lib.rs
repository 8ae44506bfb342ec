//! Application layer for Parley: the conversation dispatch core.
//!
//! This crate coordinates many bursty per-correspondent input streams against
//! a bounded pool of AI calls and a single, strictly ordered output channel.
//!
//! - [`session`]: one debounce / dispatch state machine per correspondent
//! - [`admission`]: global bound on concurrent AI calls
//! - [`dispatch_worker`]: one AI call, its history bookkeeping and delivery
//! - [`delivery`]: the serialized, paced path to the presentation sink
//! - [`relay`]: wiring, timers and the event loop

pub mod admission;
pub mod bubbles;
pub mod delivery;
pub mod dispatch_worker;
pub mod relay;
pub mod session;

pub use admission::{AdmissionLimiter, AdmissionPermit};
pub use delivery::{DeliveryPolicy, DeliveryReport, DeliverySerializer};
pub use dispatch_worker::{DispatchOutcome, DispatchWorker};
pub use relay::{ConversationRelay, RelayStats};
