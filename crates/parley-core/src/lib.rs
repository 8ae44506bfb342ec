//! Domain layer for Parley.
//!
//! Types shared by every crate in the workspace and the collaborator
//! contracts the dispatch core is written against.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod feed;
pub mod history;
pub mod presentation;

// Re-export common error type
pub use error::ParleyError;
