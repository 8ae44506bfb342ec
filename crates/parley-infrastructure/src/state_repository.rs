//! Processing state (resume cursor) persistence.

use crate::storage::AtomicTomlFile;
use parley_core::error::{ParleyError, Result};
use parley_core::feed::{ProcessingState, ProcessingStateRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Keeps [`ProcessingState`] in a TOML file and caches it in memory.
#[derive(Clone)]
pub struct TomlProcessingStateRepository {
    state: Arc<Mutex<ProcessingState>>,
    file: Arc<AtomicTomlFile<ProcessingState>>,
}

impl TomlProcessingStateRepository {
    /// Opens the state file, starting from the default state when it is
    /// missing.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let file = Arc::new(AtomicTomlFile::<ProcessingState>::new(path));

        let loader = file.clone();
        let initial = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| ParleyError::internal(format!("Failed to join task: {}", e)))??
            .unwrap_or_default();

        Ok(Self {
            state: Arc::new(Mutex::new(initial)),
            file,
        })
    }

    /// Removes the state file. The next run starts as a first run.
    pub async fn delete(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        *state = ProcessingState::default();
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.remove())
            .await
            .map_err(|e| ParleyError::internal(format!("Failed to join task: {}", e)))?
    }
}

#[async_trait::async_trait]
impl ProcessingStateRepository for TomlProcessingStateRepository {
    async fn last_processed_seq(&self) -> Result<i64> {
        Ok(self.state.lock().await.last_processed_seq)
    }

    async fn set_last_processed_seq(&self, seq: i64) -> Result<()> {
        let mut state = self.state.lock().await;

        let file = self.file.clone();
        tokio::task::spawn_blocking(move || {
            file.update(ProcessingState::default(), |stored| {
                stored.last_processed_seq = seq;
            })
        })
        .await
        .map_err(|e| ParleyError::internal(format!("Failed to join task: {}", e)))??;

        state.last_processed_seq = seq;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_starts_at_zero() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlProcessingStateRepository::open(temp_dir.path().join("state.toml"))
            .await
            .unwrap();

        assert_eq!(repo.last_processed_seq().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cursor_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.toml");

        let repo = TomlProcessingStateRepository::open(path.clone()).await.unwrap();
        repo.set_last_processed_seq(1234).await.unwrap();

        let reopened = TomlProcessingStateRepository::open(path).await.unwrap();
        assert_eq!(reopened.last_processed_seq().await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn test_delete_resets_to_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.toml");
        let repo = TomlProcessingStateRepository::open(path.clone()).await.unwrap();
        repo.set_last_processed_seq(7).await.unwrap();

        assert!(repo.delete().await.unwrap());
        assert_eq!(repo.last_processed_seq().await.unwrap(), 0);
        assert!(!path.exists());
    }
}
