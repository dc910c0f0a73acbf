//! Synchronization callbacks dispatched at transaction scope boundaries.
//!
//! A synchronization is registered with the ambient context while a scope is
//! open and receives lifecycle notifications as the scope suspends, resumes
//! and completes. Within every phase, callbacks run in registration order.
//!
//! Only some phases may fail: an error from `before_commit` or
//! `before_completion` aborts the commit and triggers a rollback, an error
//! from `after_commit` reaches the caller only after `after_completion` has
//! run, and errors from `after_completion` are logged and swallowed so they
//! can never mask the transaction outcome.

use crate::error::TxResult;
use std::rc::Rc;
use tracing::error;

/// Final outcome reported to [`TransactionSynchronization::after_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
    /// The outcome could not be determined at this boundary.
    Unknown,
}

/// Callback tied to the boundaries of a transactional scope.
///
/// Every method defaults to a no-op, so implementations only provide the
/// phases they care about.
pub trait TransactionSynchronization {
    /// Called when the owning scope is suspended.
    fn suspend(&self) {}

    /// Called when the owning scope is resumed.
    fn resume(&self) {}

    /// Called before the backend commit.
    ///
    /// # Errors
    ///
    /// Errors abort the commit and trigger a rollback.
    fn before_commit(&self, _read_only: bool) -> TxResult<()> {
        Ok(())
    }

    /// Called before completion, on the commit path after `before_commit`
    /// and on the rollback path as the first step.
    ///
    /// # Errors
    ///
    /// On the commit path, errors abort the commit and trigger a rollback.
    fn before_completion(&self) -> TxResult<()> {
        Ok(())
    }

    /// Called after a successful backend commit.
    ///
    /// # Errors
    ///
    /// Errors propagate to the caller, but only after `after_completion`
    /// has run; the transaction is still considered committed.
    fn after_commit(&self) -> TxResult<()> {
        Ok(())
    }

    /// Called exactly once after completion, with the final outcome.
    ///
    /// # Errors
    ///
    /// Errors are logged and swallowed.
    fn after_completion(&self, _status: CompletionStatus) -> TxResult<()> {
        Ok(())
    }
}

/// Invokes `before_commit` on every callback in registration order.
///
/// # Errors
///
/// Stops at and returns the first callback error.
pub fn invoke_before_commit(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
    read_only: bool,
) -> TxResult<()> {
    for synchronization in synchronizations {
        synchronization.before_commit(read_only)?;
    }
    Ok(())
}

/// Invokes `before_completion` on every callback in registration order.
///
/// # Errors
///
/// Stops at and returns the first callback error.
pub fn invoke_before_completion(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
) -> TxResult<()> {
    for synchronization in synchronizations {
        synchronization.before_completion()?;
    }
    Ok(())
}

/// Invokes `after_commit` on every callback in registration order.
///
/// # Errors
///
/// Stops at and returns the first callback error.
pub fn invoke_after_commit(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
) -> TxResult<()> {
    for synchronization in synchronizations {
        synchronization.after_commit()?;
    }
    Ok(())
}

/// Invokes `after_completion` on every callback in registration order.
///
/// Callback errors are logged and swallowed so every callback observes the
/// outcome and the outcome itself is never masked.
pub fn invoke_after_completion(
    synchronizations: &[Rc<dyn TransactionSynchronization>],
    status: CompletionStatus,
) {
    for synchronization in synchronizations {
        if let Err(err) = synchronization.after_completion(status) {
            error!(%err, "after_completion synchronization callback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TxError;
    use std::cell::RefCell;

    struct Recording {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail_before_commit: bool,
        fail_after_completion: bool,
    }

    impl Recording {
        fn new(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                label,
                log: Rc::clone(log),
                fail_before_commit: false,
                fail_after_completion: false,
            })
        }

        fn push(&self, phase: &str) {
            self.log.borrow_mut().push(format!("{}:{phase}", self.label));
        }
    }

    impl TransactionSynchronization for Recording {
        fn before_commit(&self, _read_only: bool) -> TxResult<()> {
            self.push("before_commit");
            if self.fail_before_commit {
                return Err(TxError::illegal_state("injected failure"));
            }
            Ok(())
        }

        fn before_completion(&self) -> TxResult<()> {
            self.push("before_completion");
            Ok(())
        }

        fn after_completion(&self, _status: CompletionStatus) -> TxResult<()> {
            self.push("after_completion");
            if self.fail_after_completion {
                return Err(TxError::illegal_state("injected failure"));
            }
            Ok(())
        }
    }

    #[test]
    fn dispatch_preserves_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let callbacks: Vec<Rc<dyn TransactionSynchronization>> = vec![
            Recording::new("a", &log),
            Recording::new("b", &log),
        ];

        invoke_before_commit(&callbacks, false).unwrap();
        invoke_before_completion(&callbacks).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "a:before_commit",
                "b:before_commit",
                "a:before_completion",
                "b:before_completion",
            ]
        );
    }

    #[test]
    fn before_commit_error_stops_dispatch() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let failing = Rc::new(Recording {
            label: "a",
            log: Rc::clone(&log),
            fail_before_commit: true,
            fail_after_completion: false,
        });
        let callbacks: Vec<Rc<dyn TransactionSynchronization>> =
            vec![failing, Recording::new("b", &log)];

        assert!(invoke_before_commit(&callbacks, false).is_err());
        assert_eq!(*log.borrow(), vec!["a:before_commit"]);
    }

    #[test]
    fn after_completion_errors_are_swallowed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let failing = Rc::new(Recording {
            label: "a",
            log: Rc::clone(&log),
            fail_before_commit: false,
            fail_after_completion: true,
        });
        let callbacks: Vec<Rc<dyn TransactionSynchronization>> =
            vec![failing, Recording::new("b", &log)];

        invoke_after_completion(&callbacks, CompletionStatus::RolledBack);
        assert_eq!(*log.borrow(), vec!["a:after_completion", "b:after_completion"]);
    }
}
