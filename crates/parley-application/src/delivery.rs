//! Serialized, paced delivery of output units to the presentation sink.
//!
//! The sink is a single actor (one GUI automation target), so every call into
//! it goes through one mutual-exclusion lock. The unit of exclusion is a
//! bubble's TypingOn → delay → Bubble → TypingOff triplet; different senders
//! may interleave between triplets but never inside one.

use crate::bubbles::typing_delay;
use parley_core::config::DispatchConfig;
use parley_core::conversation::{Bubble, CorrespondentId, OutputUnit};
use parley_core::presentation::{PresentationSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Failure handling for bubble sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Extra send attempts for one bubble before it counts as failed.
    pub retry_attempts: u32,
    /// Consecutive failed bubbles that abort the rest of a sequence.
    pub max_consecutive_failures: u32,
}

impl From<&DispatchConfig> for DeliveryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        let (delay_min, delay_max) = config.bubble_delay_range();
        Self {
            delay_min,
            delay_max,
            retry_attempts: config.sink_retry_attempts,
            max_consecutive_failures: config.max_consecutive_sink_failures.max(1),
        }
    }
}

/// Outcome of delivering one bubble sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Bubbles never attempted because the sequence was short-circuited.
    pub skipped: usize,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

pub struct DeliverySerializer {
    sink: Arc<dyn PresentationSink>,
    automation: Mutex<()>,
    policy: DeliveryPolicy,
}

impl DeliverySerializer {
    pub fn new(sink: Arc<dyn PresentationSink>, policy: DeliveryPolicy) -> Self {
        Self {
            sink,
            automation: Mutex::new(()),
            policy,
        }
    }

    /// Turns bubble texts into paced bubbles, in split order.
    pub fn plan(&self, sender: &CorrespondentId, texts: Vec<String>) -> Vec<Bubble> {
        texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Bubble {
                sender: sender.clone(),
                delay: typing_delay(&text, self.policy.delay_min, self.policy.delay_max),
                text,
                ordinal,
            })
            .collect()
    }

    /// Delivers bubbles strictly in order, one locked triplet each.
    ///
    /// A failed bubble does not stop the sequence until
    /// `max_consecutive_failures` failures happen back to back.
    pub async fn deliver(&self, bubbles: &[Bubble]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut consecutive_failures = 0;

        for (index, bubble) in bubbles.iter().enumerate() {
            match self.deliver_bubble(bubble).await {
                Ok(()) => {
                    report.sent += 1;
                    consecutive_failures = 0;
                    tracing::debug!(
                        sender = %bubble.sender,
                        ordinal = bubble.ordinal,
                        total = bubbles.len(),
                        "Bubble delivered"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    consecutive_failures += 1;
                    tracing::error!(
                        sender = %bubble.sender,
                        ordinal = bubble.ordinal,
                        error = %err,
                        "Failed to deliver bubble"
                    );
                    if consecutive_failures >= self.policy.max_consecutive_failures {
                        report.skipped = bubbles.len() - index - 1;
                        if report.skipped > 0 {
                            tracing::warn!(
                                sender = %bubble.sender,
                                skipped = report.skipped,
                                "Too many consecutive delivery failures, dropping rest of reply"
                            );
                        }
                        break;
                    }
                }
            }
        }

        report
    }

    /// Emits a ReadReceipt. It still takes the automation lock so it cannot
    /// interfere with a triplet in progress, but holds it only for the call.
    pub async fn mark_read(&self, sender: &CorrespondentId) -> Result<(), SinkError> {
        let _guard = self.automation.lock().await;
        self.emit(&OutputUnit::ReadReceipt(sender.clone())).await
    }

    async fn deliver_bubble(&self, bubble: &Bubble) -> Result<(), SinkError> {
        let _guard = self.automation.lock().await;

        self.emit_best_effort(&OutputUnit::TypingOn(bubble.sender.clone()))
            .await;
        tokio::time::sleep(bubble.delay).await;
        let result = self.emit(&OutputUnit::Bubble(bubble.clone())).await;
        // Typing off runs on every path so the next triplet starts clean.
        self.emit_best_effort(&OutputUnit::TypingOff(bubble.sender.clone()))
            .await;

        result
    }

    /// Performs one unit against the sink. Callers hold the automation lock.
    async fn emit(&self, unit: &OutputUnit) -> Result<(), SinkError> {
        match unit {
            OutputUnit::ReadReceipt(sender) => self.sink.mark_read(sender).await,
            OutputUnit::TypingOn(sender) => self.sink.set_typing(sender, true).await,
            OutputUnit::TypingOff(sender) => self.sink.set_typing(sender, false).await,
            OutputUnit::Bubble(bubble) => self.send_with_retry(bubble).await,
        }
    }

    /// Typing indicator failures are logged and never fail the bubble.
    async fn emit_best_effort(&self, unit: &OutputUnit) {
        if let Err(err) = self.emit(unit).await {
            tracing::warn!(sender = %unit.sender(), unit = ?unit, error = %err, "Output unit failed");
        }
    }

    async fn send_with_retry(&self, bubble: &Bubble) -> Result<(), SinkError> {
        let mut attempt = 0;
        loop {
            match self.sink.send_text(&bubble.sender, &bubble.text).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.policy.retry_attempts => {
                    attempt += 1;
                    tracing::debug!(
                        sender = %bubble.sender,
                        attempt,
                        error = %err,
                        "Retrying bubble send"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}
