//! Snapshot of a suspended outer scope.

use crate::synchronization::TransactionSynchronization;
use spindle_adapter::{Isolation, ResourceAdapter};
use std::rc::Rc;

/// Everything detached from the ambient context when an outer scope is
/// suspended, captured atomically so resumption restores the scope exactly.
///
/// The engine never introspects the snapshot; it only hands it back to
/// resume. While suspended, the captured state is reachable only through the
/// status of the scope that suspended it.
pub(crate) struct SuspendedResources<A: ResourceAdapter> {
    /// Detached backend binding, if a transaction was active.
    pub(crate) resource: Option<A::Suspended>,
    /// Parked synchronization callbacks, if synchronization was active.
    pub(crate) synchronizations: Option<Vec<Rc<dyn TransactionSynchronization>>>,
    /// Suspended scope name.
    pub(crate) name: Option<String>,
    /// Suspended read-only flag.
    pub(crate) read_only: bool,
    /// Suspended isolation level.
    pub(crate) isolation: Option<Isolation>,
    /// Suspended actual-transaction-active flag.
    pub(crate) was_active: bool,
}

impl<A: ResourceAdapter> SuspendedResources<A> {
    /// Snapshot of a resource detached while no synchronization was active.
    pub(crate) fn from_resource(resource: A::Suspended) -> Self {
        Self {
            resource: Some(resource),
            synchronizations: None,
            name: None,
            read_only: false,
            isolation: None,
            was_active: false,
        }
    }

    /// Full snapshot: resource, callbacks and the four ambient scalars.
    pub(crate) fn full(
        resource: Option<A::Suspended>,
        synchronizations: Vec<Rc<dyn TransactionSynchronization>>,
        name: Option<String>,
        read_only: bool,
        isolation: Option<Isolation>,
        was_active: bool,
    ) -> Self {
        Self {
            resource,
            synchronizations: Some(synchronizations),
            name,
            read_only,
            isolation,
            was_active,
        }
    }
}
