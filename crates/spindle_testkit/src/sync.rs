//! Synchronization callbacks that record the lifecycle they observe.

use spindle_core::{CompletionStatus, TransactionSynchronization, TxError, TxResult};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One synchronization lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// The callback's scope was suspended.
    Suspend,
    /// The callback's scope was resumed.
    Resume,
    /// `before_commit` fired, with the scope's read-only flag.
    BeforeCommit(bool),
    /// `before_completion` fired.
    BeforeCompletion,
    /// `after_commit` fired.
    AfterCommit,
    /// `after_completion` fired with the final outcome.
    AfterCompletion(CompletionStatus),
}

/// Shared, ordered log of events across any number of callbacks.
///
/// Events are tagged with the label of the callback that observed them, so a
/// single recorder can verify both phase ordering and per-callback dispatch
/// order.
#[derive(Clone, Default)]
pub struct SyncRecorder {
    events: Rc<RefCell<Vec<(String, SyncEvent)>>>,
}

impl SyncRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a callback writing to this log under the given label.
    #[must_use]
    pub fn callback(&self, label: &str) -> Rc<TrackingSynchronization> {
        Rc::new(TrackingSynchronization {
            label: label.to_string(),
            recorder: self.clone(),
            fail_before_commit: Cell::new(false),
            fail_before_completion: Cell::new(false),
            fail_after_commit: Cell::new(false),
            fail_after_completion: Cell::new(false),
        })
    }

    /// Snapshot of all recorded `(label, event)` pairs, in order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, SyncEvent)> {
        self.events.borrow().clone()
    }

    /// Event kinds only, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<SyncEvent> {
        self.events.borrow().iter().map(|(_, event)| *event).collect()
    }

    fn push(&self, label: &str, event: SyncEvent) {
        self.events.borrow_mut().push((label.to_string(), event));
    }
}

/// A synchronization callback that records every phase it observes and can
/// be told to fail in any fallible phase.
pub struct TrackingSynchronization {
    label: String,
    recorder: SyncRecorder,
    fail_before_commit: Cell<bool>,
    fail_before_completion: Cell<bool>,
    fail_after_commit: Cell<bool>,
    fail_after_completion: Cell<bool>,
}

impl TrackingSynchronization {
    /// Makes `before_commit` fail.
    pub fn fail_before_commit(&self) {
        self.fail_before_commit.set(true);
    }

    /// Makes `before_completion` fail.
    pub fn fail_before_completion(&self) {
        self.fail_before_completion.set(true);
    }

    /// Makes `after_commit` fail.
    pub fn fail_after_commit(&self) {
        self.fail_after_commit.set(true);
    }

    /// Makes `after_completion` fail.
    pub fn fail_after_completion(&self) {
        self.fail_after_completion.set(true);
    }

    fn injected(&self, phase: &str) -> TxError {
        TxError::illegal_state(format!("injected {phase} failure from '{}'", self.label))
    }
}

impl TransactionSynchronization for TrackingSynchronization {
    fn suspend(&self) {
        self.recorder.push(&self.label, SyncEvent::Suspend);
    }

    fn resume(&self) {
        self.recorder.push(&self.label, SyncEvent::Resume);
    }

    fn before_commit(&self, read_only: bool) -> TxResult<()> {
        self.recorder
            .push(&self.label, SyncEvent::BeforeCommit(read_only));
        if self.fail_before_commit.get() {
            return Err(self.injected("before_commit"));
        }
        Ok(())
    }

    fn before_completion(&self) -> TxResult<()> {
        self.recorder.push(&self.label, SyncEvent::BeforeCompletion);
        if self.fail_before_completion.get() {
            return Err(self.injected("before_completion"));
        }
        Ok(())
    }

    fn after_commit(&self) -> TxResult<()> {
        self.recorder.push(&self.label, SyncEvent::AfterCommit);
        if self.fail_after_commit.get() {
            return Err(self.injected("after_commit"));
        }
        Ok(())
    }

    fn after_completion(&self, status: CompletionStatus) -> TxResult<()> {
        self.recorder
            .push(&self.label, SyncEvent::AfterCompletion(status));
        if self.fail_after_completion.get() {
            return Err(self.injected("after_completion"));
        }
        Ok(())
    }
}
