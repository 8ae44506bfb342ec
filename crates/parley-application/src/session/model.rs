//! Per-correspondent conversation state.
//!
//! `ConversationSession` is a pure state machine: it never spawns or sleeps.
//! The relay drives it under the session lock, which is what makes timer
//! cancellation and timer firing mutually exclusive.

use parley_core::conversation::{CorrespondentId, DispatchRequest, IncomingMessage};
use tokio::task::JoinHandle;

/// What a fired debounce timer should lead to.
#[derive(Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    /// A newer event re-armed the timer; this firing is void.
    Superseded,
    /// A dispatch is still running; the new one will start when it finishes.
    Queued,
    /// Nothing to dispatch (the session was reset).
    Idle,
    Dispatch(DispatchRequest),
}

/// Read-only view used for stats and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub pending: usize,
    pub generation: u64,
    pub timer_armed: bool,
    pub dispatch_active: bool,
    pub dispatch_owed: bool,
    pub history_cursor: i64,
}

#[derive(Debug)]
pub struct ConversationSession {
    sender: CorrespondentId,
    /// Events not yet folded into a dispatch, oldest first.
    pending: Vec<IncomingMessage>,
    /// Bumped on every accepted event; stamps dispatch requests.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    dispatch_active: bool,
    /// A timer fired while a dispatch was active.
    dispatch_owed: bool,
    /// Highest source sequence already written to the history store.
    history_cursor: i64,
    /// Highest source sequence accepted, for replay detection.
    last_seen_seq: Option<i64>,
}

impl ConversationSession {
    pub fn new(sender: CorrespondentId) -> Self {
        Self {
            sender,
            pending: Vec::new(),
            generation: 0,
            timer: None,
            dispatch_active: false,
            dispatch_owed: false,
            history_cursor: i64::MIN,
            last_seen_seq: None,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Buffers an event and supersedes any armed timer or owed dispatch.
    ///
    /// Returns the new generation for the caller to arm a timer with, or
    /// `None` when the event is a replay of an already-accepted sequence.
    pub fn accept(&mut self, event: IncomingMessage) -> Option<u64> {
        if self
            .last_seen_seq
            .is_some_and(|last_seen| event.source_seq <= last_seen)
        {
            return None;
        }

        self.last_seen_seq = Some(event.source_seq);
        self.pending.push(event);
        self.cancel_timer();
        self.dispatch_owed = false;
        self.generation += 1;
        Some(self.generation)
    }

    /// Stores the handle of the timer armed for the current generation.
    pub fn arm_timer(&mut self, handle: JoinHandle<()>) {
        self.cancel_timer();
        self.timer = Some(handle);
    }

    pub fn on_timer_fired(&mut self, generation: u64) -> TimerOutcome {
        if !self.is_current(generation) {
            return TimerOutcome::Superseded;
        }
        self.timer = None;

        if self.dispatch_active {
            self.dispatch_owed = true;
            return TimerOutcome::Queued;
        }
        if self.pending.is_empty() {
            return TimerOutcome::Idle;
        }
        TimerOutcome::Dispatch(self.begin_dispatch())
    }

    /// Completes the active dispatch and starts the queued one, if any.
    ///
    /// A superseded request's messages go back to the front of the pending
    /// buffer so the dispatch that replaced it covers them.
    pub fn finish_dispatch(
        &mut self,
        request: DispatchRequest,
        superseded: bool,
    ) -> Option<DispatchRequest> {
        self.dispatch_active = false;

        if superseded {
            let mut restored = request.messages;
            restored.append(&mut self.pending);
            self.pending = restored;
        }

        if self.dispatch_owed && !self.pending.is_empty() {
            return Some(self.begin_dispatch());
        }
        self.dispatch_owed = false;
        None
    }

    /// Drops buffered work and invalidates anything in flight.
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.pending.clear();
        self.dispatch_owed = false;
        self.generation += 1;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            pending: self.pending.len(),
            generation: self.generation,
            timer_armed: self.timer.is_some(),
            dispatch_active: self.dispatch_active,
            dispatch_owed: self.dispatch_owed,
            history_cursor: self.history_cursor,
        }
    }

    fn begin_dispatch(&mut self) -> DispatchRequest {
        let messages = std::mem::take(&mut self.pending);
        let unrecorded: Vec<IncomingMessage> = messages
            .iter()
            .filter(|message| message.source_seq > self.history_cursor)
            .cloned()
            .collect();
        if let Some(last) = unrecorded.last() {
            self.history_cursor = last.source_seq;
        }

        self.dispatch_active = true;
        self.dispatch_owed = false;

        DispatchRequest {
            sender: self.sender.clone(),
            messages,
            generation: self.generation,
            unrecorded,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
