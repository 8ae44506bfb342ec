//! Message feeds the polling event source reads from.

mod jsonl_inbox;

pub use jsonl_inbox::JsonlInboxFeed;
