//! Infrastructure layer for Parley: file locations, configuration loading,
//! persistent stores and the polling event source.

pub mod config_service;
pub mod event_source;
pub mod feed;
pub mod history;
pub mod paths;
pub mod state_repository;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::event_source::PollingEventSource;
pub use crate::feed::JsonlInboxFeed;
pub use crate::history::{InMemoryHistoryStore, TomlHistoryStore};
pub use crate::paths::ParleyPaths;
pub use crate::state_repository::TomlProcessingStateRepository;
