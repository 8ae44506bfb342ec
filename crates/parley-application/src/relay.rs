//! Conversation relay: debounce coordination and dispatch wiring.
//!
//! Each incoming event resets its session's debounce timer. When a timer
//! fires undisturbed, the session's pending buffer becomes one dispatch
//! request, which runs behind the session's previous dispatch (never beside
//! it) and competes with other sessions only for an admission slot and for
//! the delivery lock.

use crate::admission::AdmissionLimiter;
use crate::delivery::{DeliveryPolicy, DeliverySerializer};
use crate::dispatch_worker::{DispatchOutcome, DispatchWorker};
use crate::session::{SessionHandle, SessionRegistry, SessionSnapshot, TimerOutcome};
use futures::{Stream, StreamExt};
use parley_core::backend::AiBackend;
use parley_core::config::DispatchConfig;
use parley_core::conversation::{CorrespondentId, DispatchRequest, IncomingMessage};
use parley_core::history::HistoryStore;
use parley_core::presentation::PresentationSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Point-in-time counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub sessions: usize,
    pub in_flight_calls: usize,
    pub call_capacity: usize,
}

/// The conversation dispatch core. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConversationRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    quiet_period: Duration,
    registry: SessionRegistry,
    limiter: AdmissionLimiter,
    worker: DispatchWorker,
    tasks: TaskTracker,
}

impl ConversationRelay {
    pub fn new(
        config: DispatchConfig,
        ai: Arc<dyn AiBackend>,
        history: Arc<dyn HistoryStore>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        let limiter = AdmissionLimiter::new(config.max_concurrent_calls);
        let delivery = Arc::new(DeliverySerializer::new(sink, DeliveryPolicy::from(&config)));
        let worker = DispatchWorker::new(&config, ai, history, limiter.clone(), delivery);

        Self {
            inner: Arc::new(RelayInner {
                quiet_period: config.debounce(),
                registry: SessionRegistry::new(),
                limiter,
                worker,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Buffers an event and (re)arms its session's debounce timer.
    pub async fn on_incoming_message(&self, event: IncomingMessage) {
        let sender = event.sender.clone();
        let source_seq = event.source_seq;
        let handle = self.inner.registry.get_or_create(&sender).await;

        let mut session = handle.lock().await;
        let Some(generation) = session.accept(event) else {
            tracing::debug!(sender = %sender, source_seq, "Ignoring replayed message");
            return;
        };

        let relay = self.clone();
        let timer_session = handle.clone();
        let quiet_period = self.inner.quiet_period;
        let timer = self.inner.tasks.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            relay.on_timer_fired(timer_session, generation).await;
        });
        session.arm_timer(timer);

        tracing::debug!(sender = %sender, source_seq, generation, "Debounce timer armed");
    }

    /// Feeds events from `events` until it ends or `shutdown` is cancelled,
    /// then waits for all armed timers and in-flight dispatches.
    pub async fn run<S>(&self, events: S, shutdown: CancellationToken)
    where
        S: Stream<Item = IncomingMessage>,
    {
        let mut events = std::pin::pin!(events);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Relay received shutdown signal");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => self.on_incoming_message(event).await,
                    None => {
                        tracing::info!("Event source ended");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
    }

    /// Waits for armed timers to fire and for every dispatch they start.
    pub async fn shutdown(&self) {
        let pending = self.inner.tasks.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for active conversation tasks to complete");
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        tracing::info!("Relay shut down");
    }

    /// Evicts a session. Its buffered messages are dropped and any reply
    /// still in flight for it is discarded.
    pub async fn reset_session(&self, sender: &CorrespondentId) -> bool {
        match self.inner.registry.remove(sender).await {
            Some(handle) => {
                handle.lock().await.reset();
                tracing::info!(sender = %sender, "Session reset");
                true
            }
            None => false,
        }
    }

    pub async fn session_snapshot(&self, sender: &CorrespondentId) -> Option<SessionSnapshot> {
        let handle = self.inner.registry.get(sender).await?;
        let snapshot = handle.lock().await.snapshot();
        Some(snapshot)
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            sessions: self.inner.registry.len().await,
            in_flight_calls: self.inner.limiter.in_flight(),
            call_capacity: self.inner.limiter.capacity(),
        }
    }

    async fn on_timer_fired(&self, handle: SessionHandle, generation: u64) {
        let outcome = handle.lock().await.on_timer_fired(generation);
        match outcome {
            TimerOutcome::Dispatch(request) => self.spawn_dispatch(handle, request),
            TimerOutcome::Queued => {
                tracing::debug!(generation, "Dispatch queued behind active one");
            }
            TimerOutcome::Superseded | TimerOutcome::Idle => {}
        }
    }

    /// Runs `request` and then every dispatch queued behind it for the same
    /// session, one after another on a single task.
    fn spawn_dispatch(&self, handle: SessionHandle, request: DispatchRequest) {
        let relay = self.clone();
        self.inner.tasks.spawn(async move {
            let mut next = Some(request);
            while let Some(request) = next {
                let outcome = relay.inner.worker.run(&request, &handle).await;
                let superseded = outcome == DispatchOutcome::Superseded;
                next = handle.lock().await.finish_dispatch(request, superseded);
            }
        });
    }
}
