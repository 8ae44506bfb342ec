use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::conversation::IncomingMessage;
use parley_core::error::Result;
use parley_core::feed::{FeedRecord, MessageFeed};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One line of the inbox file.
#[derive(Debug, Deserialize)]
struct InboxLine {
    seq: i64,
    sender: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_from_me: bool,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
}

impl From<InboxLine> for FeedRecord {
    fn from(line: InboxLine) -> Self {
        let mut message = IncomingMessage::new(line.sender, line.text, line.seq);
        if let Some(received_at) = line.received_at {
            message.received_at = received_at;
        }
        Self {
            message,
            is_from_me: line.is_from_me,
        }
    }
}

/// A [`MessageFeed`] over a JSON-lines file that some bridge process appends
/// to, one message per line:
///
/// ```text
/// {"seq": 17, "sender": "+15550001", "text": "hi", "is_from_me": false, "received_at": "2024-05-01T10:00:00Z"}
/// ```
///
/// Malformed lines are logged and skipped. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonlInboxFeed {
    path: PathBuf,
}

impl JsonlInboxFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<FeedRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InboxLine>(line) {
                Ok(parsed) => records.push(FeedRecord::from(parsed)),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping malformed inbox line"
                    );
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl MessageFeed for JsonlInboxFeed {
    async fn max_seq(&self) -> Result<i64> {
        let records = self.read_records().await?;
        Ok(records
            .iter()
            .map(|record| record.message.source_seq)
            .max()
            .unwrap_or(0))
    }

    async fn fetch_after(&self, after: i64) -> Result<Vec<FeedRecord>> {
        let mut records: Vec<FeedRecord> = self
            .read_records()
            .await?
            .into_iter()
            .filter(|record| record.message.source_seq > after)
            .collect();
        records.sort_by_key(|record| record.message.source_seq);
        Ok(records)
    }
}
