//! Collaborator stubs shared by the dispatch core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_application::ConversationRelay;
use parley_core::backend::{AiBackend, AiCallError};
use parley_core::config::DispatchConfig;
use parley_core::conversation::{CorrespondentId, HistoryEntry, IncomingMessage, MessageRole};
use parley_core::error::Result;
use parley_core::history::{HistoryStats, HistoryStore};
use parley_core::presentation::{PresentationSink, SinkError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Presentation sink
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Read(String),
    TypingOn(String),
    Text(String, String),
    TypingOff(String),
}

impl SinkEvent {
    pub fn sender(&self) -> &str {
        match self {
            Self::Read(s) | Self::TypingOn(s) | Self::TypingOff(s) | Self::Text(s, _) => s,
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Instant, SinkEvent)>>,
    /// Number of sink calls currently executing, and the highest seen.
    active: Mutex<(usize, usize)>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, SinkEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Text(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn peak_concurrent_calls(&self) -> usize {
        self.active.lock().unwrap().1
    }

    async fn record(&self, event: SinkEvent) {
        {
            let mut active = self.active.lock().unwrap();
            active.0 += 1;
            active.1 = active.1.max(active.0);
        }
        // Yield so overlapping callers would be observed.
        tokio::task::yield_now().await;
        self.events.lock().unwrap().push((Instant::now(), event));
        self.active.lock().unwrap().0 -= 1;
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    async fn set_typing(&self, sender: &CorrespondentId, on: bool) -> std::result::Result<(), SinkError> {
        let event = if on {
            SinkEvent::TypingOn(sender.to_string())
        } else {
            SinkEvent::TypingOff(sender.to_string())
        };
        self.record(event).await;
        Ok(())
    }

    async fn send_text(&self, sender: &CorrespondentId, text: &str) -> std::result::Result<(), SinkError> {
        self.record(SinkEvent::Text(sender.to_string(), text.to_string()))
            .await;
        Ok(())
    }

    async fn mark_read(&self, sender: &CorrespondentId) -> std::result::Result<(), SinkError> {
        self.record(SinkEvent::Read(sender.to_string())).await;
        Ok(())
    }
}

// ============================================================================
// AI backend
// ============================================================================

type Responder = dyn Fn(&str, &str) -> std::result::Result<String, AiCallError> + Send + Sync;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub sender: String,
    pub text: String,
    pub context_len: usize,
}

pub struct ScriptedAi {
    delay: Duration,
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    total: usize,
    peak_total: usize,
    per_sender: HashMap<String, usize>,
    peak_per_sender: usize,
}

impl ScriptedAi {
    pub fn new<F>(delay: Duration, responder: F) -> Self
    where
        F: Fn(&str, &str) -> std::result::Result<String, AiCallError> + Send + Sync + 'static,
    {
        Self {
            delay,
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Replies `"reply to: <text>"` after `delay`.
    pub fn echo(delay: Duration) -> Self {
        Self::new(delay, |_, text| Ok(format!("reply to: {text}")))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_total(&self) -> usize {
        self.in_flight.lock().unwrap().peak_total
    }

    pub fn peak_per_sender(&self) -> usize {
        self.in_flight.lock().unwrap().peak_per_sender
    }
}

#[async_trait]
impl AiBackend for ScriptedAi {
    async fn call(
        &self,
        sender: &CorrespondentId,
        latest_text: &str,
        context: &[HistoryEntry],
    ) -> std::result::Result<String, AiCallError> {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            sender: sender.to_string(),
            text: latest_text.to_string(),
            context_len: context.len(),
        });
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            in_flight.total += 1;
            in_flight.peak_total = in_flight.peak_total.max(in_flight.total);
            let count = in_flight.per_sender.entry(sender.to_string()).or_default();
            *count += 1;
            let count = *count;
            in_flight.peak_per_sender = in_flight.peak_per_sender.max(count);
        }

        tokio::time::sleep(self.delay).await;

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            in_flight.total -= 1;
            if let Some(count) = in_flight.per_sender.get_mut(sender.as_str()) {
                *count -= 1;
            }
        }
        (self.responder)(sender.as_str(), latest_text)
    }
}

// ============================================================================
// History store
// ============================================================================

#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn transcript(&self, sender: &str) -> Vec<(String, bool)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.sender.as_str() == sender)
            .map(|entry| (entry.text.clone(), entry.is_from_user()))
            .collect()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(
        &self,
        sender: &CorrespondentId,
        text: &str,
        is_from_user: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.entries.lock().unwrap().push(HistoryEntry {
            sender: sender.clone(),
            role: MessageRole::from_user_flag(is_from_user),
            text: text.to_string(),
            timestamp,
        });
        Ok(())
    }

    async fn read_recent(&self, sender: &CorrespondentId, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries.lock().unwrap();
        let matching: Vec<HistoryEntry> = entries
            .iter()
            .filter(|entry| &entry.sender == sender)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn clear_sender(&self, sender: &CorrespondentId) -> Result<()> {
        self.entries.lock().unwrap().retain(|entry| &entry.sender != sender);
        Ok(())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn stats(&self) -> Result<HistoryStats> {
        let entries = self.entries.lock().unwrap();
        let mut senders: Vec<&CorrespondentId> = entries.iter().map(|entry| &entry.sender).collect();
        senders.sort();
        senders.dedup();
        let user_messages = entries.iter().filter(|entry| entry.is_from_user()).count();
        Ok(HistoryStats {
            total_messages: entries.len(),
            user_messages,
            assistant_messages: entries.len() - user_messages,
            distinct_senders: senders.len(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub relay: ConversationRelay,
    pub ai: Arc<ScriptedAi>,
    pub history: Arc<MemoryHistory>,
    pub sink: Arc<RecordingSink>,
    pub started: Instant,
    seq: Mutex<i64>,
}

impl Harness {
    pub fn new(config: DispatchConfig, ai: ScriptedAi) -> Self {
        let ai = Arc::new(ai);
        let history = Arc::new(MemoryHistory::default());
        let sink = Arc::new(RecordingSink::default());
        let relay = ConversationRelay::new(config, ai.clone(), history.clone(), sink.clone());
        Self {
            relay,
            ai,
            history,
            sink,
            started: Instant::now(),
            seq: Mutex::new(0),
        }
    }

    pub fn event(&self, sender: &str, text: &str) -> IncomingMessage {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        IncomingMessage::new(sender, text, *seq)
    }

    pub async fn send(&self, sender: &str, text: &str) {
        let event = self.event(sender, text);
        self.relay.on_incoming_message(event).await;
    }

    pub async fn sleep_until_ms(&self, ms: u64) {
        tokio::time::sleep_until(self.started + Duration::from_millis(ms)).await;
    }

    pub fn elapsed_ms(&self, at: Instant) -> u64 {
        at.duration_since(self.started).as_millis() as u64
    }
}
