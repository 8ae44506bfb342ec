use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::conversation::{CorrespondentId, HistoryEntry, MessageRole};
use parley_core::error::Result;
use parley_core::history::{HistoryStats, HistoryStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`HistoryStore`] that lives only as long as the process.
///
/// Used by `parley chat --ephemeral` and by tests.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    transcripts: RwLock<HashMap<CorrespondentId, Vec<HistoryEntry>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        sender: &CorrespondentId,
        text: &str,
        is_from_user: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut transcripts = self.transcripts.write().await;
        transcripts
            .entry(sender.clone())
            .or_default()
            .push(HistoryEntry {
                sender: sender.clone(),
                role: MessageRole::from_user_flag(is_from_user),
                text: text.to_string(),
                timestamp,
            });
        Ok(())
    }

    async fn read_recent(&self, sender: &CorrespondentId, limit: usize) -> Result<Vec<HistoryEntry>> {
        let transcripts = self.transcripts.read().await;
        let entries = transcripts.get(sender).map(Vec::as_slice).unwrap_or_default();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries[skip..].to_vec())
    }

    async fn clear_sender(&self, sender: &CorrespondentId) -> Result<()> {
        self.transcripts.write().await.remove(sender);
        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut transcripts = self.transcripts.write().await;
        let removed = transcripts.values().map(Vec::len).sum();
        transcripts.clear();
        Ok(removed)
    }

    async fn stats(&self) -> Result<HistoryStats> {
        let transcripts = self.transcripts.read().await;
        let mut stats = HistoryStats::default();
        for entries in transcripts.values().filter(|entries| !entries.is_empty()) {
            stats.distinct_senders += 1;
            stats.total_messages += entries.len();
            stats.user_messages += entries.iter().filter(|entry| entry.is_from_user()).count();
        }
        stats.assistant_messages = stats.total_messages - stats.user_messages;
        Ok(stats)
    }
}
