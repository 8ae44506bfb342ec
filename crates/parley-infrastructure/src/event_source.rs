//! Polling event source.
//!
//! Turns a [`MessageFeed`] into a lazy, infinite stream of incoming message
//! events, persisting the resume cursor after every batch so a restart picks
//! up where the previous run stopped.

use futures::Stream;
use parley_core::conversation::IncomingMessage;
use parley_core::error::Result;
use parley_core::feed::{MessageFeed, ProcessingStateRepository};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub struct PollingEventSource<F> {
    feed: F,
    state: Arc<dyn ProcessingStateRepository>,
    poll_interval: Duration,
}

struct PollState<F> {
    source: PollingEventSource<F>,
    cursor: i64,
    buffered: VecDeque<IncomingMessage>,
    polled_once: bool,
}

impl<F> PollingEventSource<F>
where
    F: MessageFeed + 'static,
{
    pub fn new(feed: F, state: Arc<dyn ProcessingStateRepository>, poll_interval: Duration) -> Self {
        Self {
            feed,
            state,
            poll_interval,
        }
    }

    /// Returns the cursor to resume from.
    ///
    /// On first run (stored cursor 0) the cursor jumps to the feed's current
    /// maximum, so messages that predate the relay are never answered.
    pub async fn resume_cursor(&self) -> Result<i64> {
        let stored = self.state.last_processed_seq().await?;
        if stored > 0 {
            tracing::info!(cursor = stored, "Resuming from stored cursor");
            return Ok(stored);
        }

        let current_max = self.feed.max_seq().await?;
        self.state.set_last_processed_seq(current_max).await?;
        tracing::info!(
            cursor = current_max,
            "First run: skipping existing messages"
        );
        Ok(current_max)
    }

    /// Resolves the resume cursor and starts streaming.
    pub async fn into_stream(self) -> Result<impl Stream<Item = IncomingMessage> + Send + 'static> {
        let cursor = self.resume_cursor().await?;
        Ok(self.stream_from(cursor))
    }

    /// Streams relayable messages with a sequence greater than `cursor`.
    ///
    /// The first poll happens immediately; later ones wait `poll_interval`.
    /// Poll failures are logged and retried on the next tick.
    pub fn stream_from(self, cursor: i64) -> impl Stream<Item = IncomingMessage> + Send + 'static {
        let initial = PollState {
            source: self,
            cursor,
            buffered: VecDeque::new(),
            polled_once: false,
        };

        futures::stream::unfold(initial, |mut state| async move {
            loop {
                if let Some(message) = state.buffered.pop_front() {
                    return Some((message, state));
                }
                if state.polled_once {
                    tokio::time::sleep(state.source.poll_interval).await;
                }
                state.polled_once = true;

                let (batch, next_cursor) = state.source.poll_once(state.cursor).await;
                state.cursor = next_cursor;
                state.buffered.extend(batch);
            }
        })
    }

    async fn poll_once(&self, cursor: i64) -> (Vec<IncomingMessage>, i64) {
        let records = match self.feed.fetch_after(cursor).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(cursor, error = %e, "Error polling message feed");
                return (Vec::new(), cursor);
            }
        };

        let next_cursor = records
            .iter()
            .map(|record| record.message.source_seq)
            .fold(cursor, i64::max);

        if next_cursor > cursor {
            if let Err(e) = self.state.set_last_processed_seq(next_cursor).await {
                tracing::warn!(cursor = next_cursor, error = %e, "Failed to persist cursor");
            }
        }

        let messages: Vec<IncomingMessage> = records
            .into_iter()
            .filter(|record| record.is_relayable())
            .map(|record| record.message)
            .collect();

        for message in &messages {
            let preview: String = message.text.chars().take(50).collect();
            tracing::info!(
                sender = %message.sender,
                source_seq = message.source_seq,
                preview = %preview,
                "New message"
            );
        }

        (messages, next_cursor)
    }
}
