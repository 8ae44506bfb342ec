//! Performs one AI call for one dispatch request and hands the result to
//! delivery.

use crate::admission::AdmissionLimiter;
use crate::bubbles::split_into_bubbles;
use crate::delivery::{DeliveryReport, DeliverySerializer};
use crate::session::SessionHandle;
use chrono::Utc;
use parley_core::backend::{AiBackend, AiCallError};
use parley_core::config::DispatchConfig;
use parley_core::conversation::{DispatchRequest, HistoryEntry};
use parley_core::history::HistoryStore;
use std::sync::Arc;
use std::time::Duration;

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply was split and delivered.
    Replied(DeliveryReport),
    /// The AI call failed; the fallback message was delivered instead.
    Fallback(DeliveryReport),
    /// A newer event superseded the request; nothing was delivered.
    Superseded,
}

pub struct DispatchWorker {
    ai: Arc<dyn AiBackend>,
    history: Arc<dyn HistoryStore>,
    limiter: AdmissionLimiter,
    delivery: Arc<DeliverySerializer>,
    context_size: usize,
    call_timeout: Option<Duration>,
    fallback_message: String,
}

impl DispatchWorker {
    pub fn new(
        config: &DispatchConfig,
        ai: Arc<dyn AiBackend>,
        history: Arc<dyn HistoryStore>,
        limiter: AdmissionLimiter,
        delivery: Arc<DeliverySerializer>,
    ) -> Self {
        Self {
            ai,
            history,
            limiter,
            delivery,
            context_size: config.history_context_size,
            call_timeout: config.ai_call_timeout(),
            fallback_message: config.fallback_message.clone(),
        }
    }

    /// Runs one dispatch to completion.
    ///
    /// The session handle is only used to check, once the AI call returns,
    /// whether `request.generation` is still current.
    pub async fn run(&self, request: &DispatchRequest, session: &SessionHandle) -> DispatchOutcome {
        let sender = &request.sender;
        tracing::info!(
            sender = %sender,
            generation = request.generation,
            messages = request.messages.len(),
            last_seq = ?request.last_seq(),
            "Handling conversation"
        );

        if let Err(err) = self.delivery.mark_read(sender).await {
            tracing::warn!(sender = %sender, error = %err, "Failed to mark conversation as read");
        }

        self.record_inputs(request).await;

        let reply = {
            let _permit = self.limiter.acquire().await;
            let context = self.load_context(request).await;
            self.call_ai(request, &context).await
        };

        if !session.lock().await.is_current(request.generation) {
            tracing::debug!(
                sender = %sender,
                generation = request.generation,
                "Discarding superseded reply"
            );
            return DispatchOutcome::Superseded;
        }

        let bubbles = reply.and_then(|text| {
            let bubbles = split_into_bubbles(&text);
            if bubbles.is_empty() {
                Err(AiCallError::EmptyReply)
            } else {
                Ok(bubbles)
            }
        });

        match bubbles {
            Ok(bubbles) => {
                tracing::info!(sender = %sender, bubbles = bubbles.len(), "Split reply into bubbles");
                for bubble in &bubbles {
                    self.append_history(request, bubble, false).await;
                }
                let planned = self.delivery.plan(sender, bubbles);
                let report = self.delivery.deliver(&planned).await;
                if report.is_complete() {
                    tracing::info!(sender = %sender, sent = report.sent, "Finished conversation turn");
                } else {
                    tracing::warn!(
                        sender = %sender,
                        sent = report.sent,
                        failed = report.failed,
                        skipped = report.skipped,
                        "Reply only partially delivered"
                    );
                }
                DispatchOutcome::Replied(report)
            }
            Err(err) => {
                tracing::warn!(sender = %sender, error = %err, "No AI reply, sending fallback");
                let planned = self
                    .delivery
                    .plan(sender, vec![self.fallback_message.clone()]);
                DispatchOutcome::Fallback(self.delivery.deliver(&planned).await)
            }
        }
    }

    async fn record_inputs(&self, request: &DispatchRequest) {
        for message in &request.unrecorded {
            if let Err(err) = self
                .history
                .append(&request.sender, &message.text, true, message.received_at)
                .await
            {
                tracing::warn!(
                    sender = %request.sender,
                    source_seq = message.source_seq,
                    error = %err,
                    "Failed to record incoming message"
                );
            }
        }
    }

    async fn append_history(&self, request: &DispatchRequest, text: &str, is_from_user: bool) {
        if let Err(err) = self
            .history
            .append(&request.sender, text, is_from_user, Utc::now())
            .await
        {
            tracing::warn!(sender = %request.sender, error = %err, "Failed to record reply");
        }
    }

    async fn load_context(&self, request: &DispatchRequest) -> Vec<HistoryEntry> {
        match self
            .history
            .read_recent(&request.sender, self.context_size)
            .await
        {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(
                    sender = %request.sender,
                    error = %err,
                    "Failed to load conversation context, continuing without it"
                );
                Vec::new()
            }
        }
    }

    async fn call_ai(
        &self,
        request: &DispatchRequest,
        context: &[HistoryEntry],
    ) -> Result<String, AiCallError> {
        let latest_text = request.combined_text();
        let call = self.ai.call(&request.sender, &latest_text, context);

        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(AiCallError::Timeout)),
            None => call.await,
        }
    }
}
