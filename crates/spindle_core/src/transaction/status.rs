//! Per-scope transaction status handle.

use crate::error::{TxError, TxResult};
use crate::transaction::suspended::SuspendedResources;
use spindle_adapter::ResourceAdapter;
use std::fmt;

/// Handle for one transactional scope.
///
/// Produced by [`TransactionManager::begin`] and terminated by exactly one of
/// [`TransactionManager::commit`] or [`TransactionManager::rollback`]. The
/// status carries the backend resource (absent for "empty" scopes that run
/// without an actual transaction), the flags describing how the scope was
/// created, any held savepoint, and the snapshot of a suspended outer scope.
///
/// [`TransactionManager::begin`]: crate::TransactionManager::begin
/// [`TransactionManager::commit`]: crate::TransactionManager::commit
/// [`TransactionManager::rollback`]: crate::TransactionManager::rollback
pub struct TransactionStatus<A: ResourceAdapter> {
    resource: Option<A::Resource>,
    new_transaction: bool,
    new_synchronization: bool,
    read_only: bool,
    local_rollback_only: bool,
    savepoint: Option<A::Savepoint>,
    suspended: Option<SuspendedResources<A>>,
    completed: bool,
}

impl<A: ResourceAdapter> TransactionStatus<A> {
    pub(crate) fn new(
        resource: Option<A::Resource>,
        new_transaction: bool,
        new_synchronization: bool,
        read_only: bool,
        suspended: Option<SuspendedResources<A>>,
    ) -> Self {
        Self {
            resource,
            new_transaction,
            new_synchronization,
            read_only,
            local_rollback_only: false,
            savepoint: None,
            suspended,
            completed: false,
        }
    }

    /// Whether this scope originated a real backend transaction.
    ///
    /// Empty scopes report `false` even though they were newly created: a new
    /// transaction implies an attached resource.
    #[must_use]
    pub fn is_new_transaction(&self) -> bool {
        self.resource.is_some() && self.new_transaction
    }

    /// Whether a backend resource is attached to this scope.
    #[must_use]
    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    /// Whether this scope initialized the synchronization list.
    #[must_use]
    pub fn is_new_synchronization(&self) -> bool {
        self.new_synchronization
    }

    /// Whether this scope is read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether this scope holds a savepoint (nested transaction).
    #[must_use]
    pub fn has_savepoint(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Whether this scope has been terminated.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether this scope was locally marked rollback-only.
    #[must_use]
    pub fn is_local_rollback_only(&self) -> bool {
        self.local_rollback_only
    }

    /// Marks this scope rollback-only: its eventual outcome will be a
    /// rollback regardless of whether commit or rollback is requested.
    ///
    /// Idempotent; the mark is never cleared before completion.
    ///
    /// # Errors
    ///
    /// Fails with an illegal-state error if the scope is already completed.
    pub fn set_rollback_only(&mut self) -> TxResult<()> {
        if self.completed {
            return Err(TxError::illegal_state(
                "cannot mark a completed transaction rollback-only",
            ));
        }
        self.local_rollback_only = true;
        Ok(())
    }

    /// Borrows the attached backend resource, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&A::Resource> {
        self.resource.as_ref()
    }

    pub(crate) fn resource_mut(&mut self) -> Option<&mut A::Resource> {
        self.resource.as_mut()
    }

    pub(crate) fn set_savepoint(&mut self, savepoint: A::Savepoint) {
        self.savepoint = Some(savepoint);
    }

    pub(crate) fn take_savepoint(&mut self) -> Option<A::Savepoint> {
        self.savepoint.take()
    }

    pub(crate) fn take_suspended(&mut self) -> Option<SuspendedResources<A>> {
        self.suspended.take()
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

impl<A: ResourceAdapter> fmt::Debug for TransactionStatus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("has_resource", &self.resource.is_some())
            .field("new_transaction", &self.new_transaction)
            .field("new_synchronization", &self.new_synchronization)
            .field("read_only", &self.read_only)
            .field("local_rollback_only", &self.local_rollback_only)
            .field("has_savepoint", &self.savepoint.is_some())
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_adapter::AdapterResult;

    struct NullAdapter;

    impl ResourceAdapter for NullAdapter {
        type Resource = ();
        type Suspended = ();
        type Savepoint = ();

        fn acquire(&self) -> AdapterResult<()> {
            Ok(())
        }

        fn begin(
            &self,
            _resource: &mut (),
            _definition: &spindle_adapter::TransactionDefinition,
        ) -> AdapterResult<()> {
            Ok(())
        }

        fn commit(&self, _resource: &mut ()) -> AdapterResult<()> {
            Ok(())
        }

        fn rollback(&self, _resource: &mut ()) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn new_status(resource: Option<()>, new_transaction: bool) -> TransactionStatus<NullAdapter> {
        TransactionStatus::new(resource, new_transaction, true, false, None)
    }

    #[test]
    fn new_transaction_requires_resource() {
        let real = new_status(Some(()), true);
        assert!(real.is_new_transaction());

        let empty = new_status(None, true);
        assert!(!empty.is_new_transaction());
        assert!(!empty.has_resource());
    }

    #[test]
    fn rollback_only_is_idempotent() {
        let mut status = new_status(Some(()), true);
        assert!(!status.is_local_rollback_only());

        status.set_rollback_only().unwrap();
        status.set_rollback_only().unwrap();
        assert!(status.is_local_rollback_only());
    }

    #[test]
    fn rollback_only_fails_after_completion() {
        let mut status = new_status(Some(()), true);
        status.mark_completed();

        assert!(status.set_rollback_only().is_err());
        assert!(status.is_completed());
    }

    #[test]
    fn savepoint_slot() {
        let mut status = new_status(Some(()), false);
        assert!(!status.has_savepoint());

        status.set_savepoint(());
        assert!(status.has_savepoint());
        assert!(status.take_savepoint().is_some());
        assert!(!status.has_savepoint());
    }
}
