//! File-backed history store: one TOML transcript per correspondent.

use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::conversation::{CorrespondentId, HistoryEntry, MessageRole};
use parley_core::error::{ParleyError, Result};
use parley_core::history::{HistoryStats, HistoryStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// On-disk layout of one transcript file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TranscriptDto {
    sender: String,
    #[serde(default)]
    entries: Vec<TranscriptEntryDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TranscriptEntryDto {
    role: MessageRole,
    text: String,
    timestamp: DateTime<Utc>,
}

impl TranscriptDto {
    fn into_entries(self) -> Vec<HistoryEntry> {
        let sender = CorrespondentId::new(self.sender);
        self.entries
            .into_iter()
            .map(|entry| HistoryEntry {
                sender: sender.clone(),
                role: entry.role,
                text: entry.text,
                timestamp: entry.timestamp,
            })
            .collect()
    }

    fn from_entries(sender: &CorrespondentId, entries: &[HistoryEntry]) -> Self {
        Self {
            sender: sender.to_string(),
            entries: entries
                .iter()
                .map(|entry| TranscriptEntryDto {
                    role: entry.role,
                    text: entry.text.clone(),
                    timestamp: entry.timestamp,
                })
                .collect(),
        }
    }
}

/// One sender's cached transcript; `None` until first loaded from disk.
type TranscriptSlot = Arc<Mutex<Option<Vec<HistoryEntry>>>>;

/// A [`HistoryStore`] that keeps each correspondent's transcript in
/// `<dir>/<uuid-v5 of sender>.toml`.
///
/// Transcripts are loaded lazily and cached behind one lock per sender, so
/// file I/O for one correspondent never waits on another's. Every append
/// rewrites the sender's file atomically.
pub struct TomlHistoryStore {
    dir: PathBuf,
    transcripts: Mutex<HashMap<CorrespondentId, TranscriptSlot>>,
}

impl TomlHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            transcripts: Mutex::new(HashMap::new()),
        }
    }

    fn file_for(&self, sender: &CorrespondentId) -> AtomicTomlFile<TranscriptDto> {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, sender.as_str().as_bytes());
        AtomicTomlFile::new(self.dir.join(format!("{id}.toml")))
    }

    /// Returns the sender's slot. The map lock is held only for the lookup.
    async fn slot(&self, sender: &CorrespondentId) -> TranscriptSlot {
        self.transcripts
            .lock()
            .await
            .entry(sender.clone())
            .or_default()
            .clone()
    }

    async fn load_transcript(&self, sender: &CorrespondentId) -> Result<Vec<HistoryEntry>> {
        let file = self.file_for(sender);
        let loaded = blocking(move || file.load()).await?;
        Ok(loaded.map(TranscriptDto::into_entries).unwrap_or_default())
    }

    async fn save_transcript(&self, sender: &CorrespondentId, entries: &[HistoryEntry]) -> Result<()> {
        let file = self.file_for(sender);
        let dto = TranscriptDto::from_entries(sender, entries);
        blocking(move || file.save(&dto)).await
    }

    /// Loads every transcript file in the directory.
    async fn scan(&self) -> Result<Vec<(PathBuf, TranscriptDto)>> {
        let dir = self.dir.clone();
        blocking(move || scan_dir(&dir)).await
    }
}

/// Runs file work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ParleyError::internal(format!("Failed to join task: {}", e)))?
}

fn scan_dir(dir: &Path) -> Result<Vec<(PathBuf, TranscriptDto)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut transcripts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        match AtomicTomlFile::<TranscriptDto>::new(path.clone()).load() {
            Ok(Some(dto)) => transcripts.push((path, dto)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable transcript");
            }
        }
    }
    Ok(transcripts)
}

#[async_trait]
impl HistoryStore for TomlHistoryStore {
    async fn append(
        &self,
        sender: &CorrespondentId,
        text: &str,
        is_from_user: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let slot = self.slot(sender).await;
        let mut cached = slot.lock().await;
        if cached.is_none() {
            *cached = Some(self.load_transcript(sender).await?);
        }
        let Some(entries) = cached.as_mut() else {
            return Err(ParleyError::internal("transcript cache entry vanished"));
        };

        entries.push(HistoryEntry {
            sender: sender.clone(),
            role: MessageRole::from_user_flag(is_from_user),
            text: text.to_string(),
            timestamp,
        });

        if let Err(e) = self.save_transcript(sender, entries).await {
            entries.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn read_recent(&self, sender: &CorrespondentId, limit: usize) -> Result<Vec<HistoryEntry>> {
        let slot = self.slot(sender).await;
        let mut cached = slot.lock().await;
        if cached.is_none() {
            *cached = Some(self.load_transcript(sender).await?);
        }

        let entries = cached.as_deref().unwrap_or_default();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries[skip..].to_vec())
    }

    async fn clear_sender(&self, sender: &CorrespondentId) -> Result<()> {
        let slot = self.slot(sender).await;
        let mut cached = slot.lock().await;
        let file = self.file_for(sender);
        blocking(move || file.remove()).await?;
        *cached = None;
        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        // Holding the map lock keeps new senders out; every known sender's
        // slot is locked before the files go.
        let transcripts = self.transcripts.lock().await;
        let mut guards = Vec::with_capacity(transcripts.len());
        for slot in transcripts.values() {
            guards.push(slot.clone().lock_owned().await);
        }

        let files = self.scan().await?;
        let removed = blocking(move || {
            let mut removed = 0;
            for (path, dto) in files {
                std::fs::remove_file(&path)?;
                removed += dto.entries.len();
            }
            Ok(removed)
        })
        .await?;

        for cached in &mut guards {
            **cached = None;
        }

        tracing::info!(removed, dir = %self.dir.display(), "Cleared conversation history");
        Ok(removed)
    }

    async fn stats(&self) -> Result<HistoryStats> {
        // Transcript files are replaced atomically, so a scan needs no lock.
        let transcripts = self.scan().await?;

        let mut stats = HistoryStats::default();
        let mut senders = HashSet::new();
        for (_, dto) in &transcripts {
            if dto.entries.is_empty() {
                continue;
            }
            senders.insert(dto.sender.clone());
            for entry in &dto.entries {
                stats.total_messages += 1;
                if entry.role.is_user() {
                    stats.user_messages += 1;
                } else {
                    stats.assistant_messages += 1;
                }
            }
        }
        stats.distinct_senders = senders.len();
        Ok(stats)
    }
}
