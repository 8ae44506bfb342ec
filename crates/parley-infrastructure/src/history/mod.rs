//! History store implementations.

mod memory_store;
mod toml_store;

pub use memory_store::InMemoryHistoryStore;
pub use toml_store::TomlHistoryStore;
