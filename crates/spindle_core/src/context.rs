//! Ambient transaction context bound to the logical thread.
//!
//! Every transactional scope runs on a logical thread of control, and the
//! state the engine considers "ambient" - active resource bindings, the
//! synchronization callback list, and the current scope's characteristics -
//! lives here, keyed by that thread. Suspension and resumption of an outer
//! scope are pure swaps of this state; nothing is shared across threads.
//!
//! Resource bindings are owned by adapters: an adapter binds its holder under
//! its [`ResourceKey`] in `begin`, detaches it in `suspend`, re-attaches it
//! in `resume` and unbinds it in `cleanup`. The engine only manages the
//! synchronization list and the scalar slots.
//!
//! The thread-keyed layout is correct because the engine is synchronous: a
//! scope never migrates between threads while open. Hosts with cooperative
//! scheduling must keep a scope on one thread from `begin` to completion.

use crate::error::{TxError, TxResult};
use crate::synchronization::TransactionSynchronization;
use spindle_adapter::Isolation;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a resource factory, used as the binder key.
///
/// One factory (a connection pool, a session factory) gets one key, and at
/// most one resource holder may be bound under it per logical thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(u64);

static NEXT_RESOURCE_KEY: AtomicU64 = AtomicU64::new(1);

impl ResourceKey {
    /// Creates a key with a caller-chosen identity.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh process-unique key.
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_RESOURCE_KEY.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource:{}", self.0)
    }
}

#[derive(Default)]
struct AmbientContext {
    resources: HashMap<ResourceKey, Rc<dyn Any>>,
    synchronizations: Option<Vec<Rc<dyn TransactionSynchronization>>>,
    name: Option<String>,
    read_only: bool,
    isolation: Option<Isolation>,
    actual_transaction_active: bool,
}

thread_local! {
    static CONTEXT: RefCell<AmbientContext> = RefCell::new(AmbientContext::default());
}

fn with_context<R>(f: impl FnOnce(&mut AmbientContext) -> R) -> R {
    CONTEXT.with(|context| f(&mut context.borrow_mut()))
}

/// Binds a resource holder under the given factory key.
///
/// # Errors
///
/// Fails with `DuplicateResourceBinding` if the key is already bound.
pub fn bind_resource(key: ResourceKey, value: Rc<dyn Any>) -> TxResult<()> {
    with_context(|context| {
        if context.resources.contains_key(&key) {
            return Err(TxError::DuplicateResourceBinding { key });
        }
        context.resources.insert(key, value);
        Ok(())
    })
}

/// Removes and returns the resource holder bound under the given key.
///
/// # Errors
///
/// Fails with `MissingResourceBinding` if the key is not bound.
pub fn unbind_resource(key: ResourceKey) -> TxResult<Rc<dyn Any>> {
    with_context(|context| {
        context
            .resources
            .remove(&key)
            .ok_or(TxError::MissingResourceBinding { key })
    })
}

/// Removes the resource holder bound under the given key, if any.
pub fn unbind_resource_if_bound(key: ResourceKey) -> Option<Rc<dyn Any>> {
    with_context(|context| context.resources.remove(&key))
}

/// Returns the resource holder bound under the given key, if any.
#[must_use]
pub fn resource(key: ResourceKey) -> Option<Rc<dyn Any>> {
    with_context(|context| context.resources.get(&key).cloned())
}

/// Whether a resource holder is bound under the given key.
#[must_use]
pub fn has_resource(key: ResourceKey) -> bool {
    with_context(|context| context.resources.contains_key(&key))
}

/// Number of resource holders currently bound on this logical thread.
#[must_use]
pub fn bound_resource_count() -> usize {
    with_context(|context| context.resources.len())
}

/// Whether synchronization is active for the current logical thread.
#[must_use]
pub fn is_synchronization_active() -> bool {
    with_context(|context| context.synchronizations.is_some())
}

/// Activates synchronization with an empty callback list.
///
/// # Errors
///
/// Fails with an illegal-state error if synchronization is already active.
pub fn init_synchronization() -> TxResult<()> {
    with_context(|context| {
        if context.synchronizations.is_some() {
            return Err(TxError::illegal_state(
                "cannot activate transaction synchronization - already active",
            ));
        }
        context.synchronizations = Some(Vec::new());
        Ok(())
    })
}

/// Appends a callback to the active synchronization list.
///
/// Callbacks are dispatched in registration order within every phase.
///
/// # Errors
///
/// Fails with an illegal-state error if synchronization is not active.
pub fn register_synchronization(
    synchronization: Rc<dyn TransactionSynchronization>,
) -> TxResult<()> {
    with_context(|context| match context.synchronizations.as_mut() {
        Some(synchronizations) => {
            synchronizations.push(synchronization);
            Ok(())
        }
        None => Err(TxError::illegal_state(
            "transaction synchronization is not active",
        )),
    })
}

/// Snapshot of the active synchronization list, in registration order.
///
/// # Errors
///
/// Fails with an illegal-state error if synchronization is not active.
pub fn synchronizations() -> TxResult<Vec<Rc<dyn TransactionSynchronization>>> {
    with_context(|context| match context.synchronizations.as_ref() {
        Some(synchronizations) => Ok(synchronizations.clone()),
        None => Err(TxError::illegal_state(
            "transaction synchronization is not active",
        )),
    })
}

/// Deactivates synchronization and returns the registered callbacks.
///
/// Returns an empty list if synchronization was not active.
pub(crate) fn take_synchronizations() -> Vec<Rc<dyn TransactionSynchronization>> {
    with_context(|context| context.synchronizations.take().unwrap_or_default())
}

/// Deactivates synchronization, discarding any registered callbacks.
pub fn clear_synchronization() {
    with_context(|context| context.synchronizations = None);
}

/// The current scope's name, if one was set.
#[must_use]
pub fn current_transaction_name() -> Option<String> {
    with_context(|context| context.name.clone())
}

/// Sets the current scope's name.
pub fn set_current_transaction_name(name: Option<String>) {
    with_context(|context| context.name = name);
}

/// Whether the current scope is read-only.
#[must_use]
pub fn is_current_transaction_read_only() -> bool {
    with_context(|context| context.read_only)
}

/// Sets the current scope's read-only flag.
pub fn set_current_transaction_read_only(read_only: bool) {
    with_context(|context| context.read_only = read_only);
}

/// The current scope's isolation level, if a non-default one was requested.
#[must_use]
pub fn current_isolation() -> Option<Isolation> {
    with_context(|context| context.isolation)
}

/// Sets the current scope's isolation level.
pub fn set_current_isolation(isolation: Option<Isolation>) {
    with_context(|context| context.isolation = isolation);
}

/// Whether an actual backend transaction is active for the current scope.
#[must_use]
pub fn is_actual_transaction_active() -> bool {
    with_context(|context| context.actual_transaction_active)
}

/// Sets the actual-transaction-active flag.
pub fn set_actual_transaction_active(active: bool) {
    with_context(|context| context.actual_transaction_active = active);
}

/// Resets the synchronization list and every scalar slot.
///
/// Resource bindings are left alone; they belong to the adapters.
pub fn clear() {
    with_context(|context| {
        context.synchronizations = None;
        context.name = None;
        context.read_only = false;
        context.isolation = None;
        context.actual_transaction_active = false;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronization::CompletionStatus;

    struct NoopSync;

    impl TransactionSynchronization for NoopSync {
        fn after_completion(&self, _status: CompletionStatus) -> TxResult<()> {
            Ok(())
        }
    }

    #[test]
    fn bind_and_unbind_resource() {
        let key = ResourceKey::allocate();
        bind_resource(key, Rc::new(42u32)).unwrap();
        assert!(has_resource(key));

        let value = unbind_resource(key).unwrap();
        assert_eq!(*value.downcast::<u32>().ok().unwrap(), 42);
        assert!(!has_resource(key));
    }

    #[test]
    fn duplicate_binding_fails() {
        let key = ResourceKey::allocate();
        bind_resource(key, Rc::new(1u32)).unwrap();

        let result = bind_resource(key, Rc::new(2u32));
        assert!(matches!(
            result,
            Err(TxError::DuplicateResourceBinding { key: k }) if k == key
        ));
    }

    #[test]
    fn unbind_missing_fails() {
        let key = ResourceKey::allocate();
        let result = unbind_resource(key);
        assert!(matches!(
            result,
            Err(TxError::MissingResourceBinding { key: k }) if k == key
        ));
    }

    #[test]
    fn bindings_are_isolated_per_key() {
        let first = ResourceKey::allocate();
        let second = ResourceKey::allocate();
        bind_resource(first, Rc::new(1u32)).unwrap();
        bind_resource(second, Rc::new(2u32)).unwrap();

        unbind_resource(first).unwrap();
        assert!(!has_resource(first));
        assert!(has_resource(second));
        unbind_resource(second).unwrap();
    }

    #[test]
    fn synchronization_lifecycle() {
        assert!(!is_synchronization_active());
        init_synchronization().unwrap();
        assert!(is_synchronization_active());

        register_synchronization(Rc::new(NoopSync)).unwrap();
        register_synchronization(Rc::new(NoopSync)).unwrap();
        assert_eq!(synchronizations().unwrap().len(), 2);

        clear_synchronization();
        assert!(!is_synchronization_active());
    }

    #[test]
    fn double_init_fails() {
        init_synchronization().unwrap();
        assert!(init_synchronization().is_err());
        clear_synchronization();
    }

    #[test]
    fn register_without_init_fails() {
        assert!(register_synchronization(Rc::new(NoopSync)).is_err());
    }

    #[test]
    fn take_synchronizations_deactivates() {
        init_synchronization().unwrap();
        register_synchronization(Rc::new(NoopSync)).unwrap();

        let taken = take_synchronizations();
        assert_eq!(taken.len(), 1);
        assert!(!is_synchronization_active());
        assert!(take_synchronizations().is_empty());
    }

    #[test]
    fn scalar_slots() {
        set_current_transaction_name(Some("report".to_string()));
        set_current_transaction_read_only(true);
        set_current_isolation(Some(Isolation::Serializable));
        set_actual_transaction_active(true);

        assert_eq!(current_transaction_name().as_deref(), Some("report"));
        assert!(is_current_transaction_read_only());
        assert_eq!(current_isolation(), Some(Isolation::Serializable));
        assert!(is_actual_transaction_active());
    }

    #[test]
    fn clear_resets_scalars_but_keeps_resources() {
        let key = ResourceKey::allocate();
        bind_resource(key, Rc::new(7u32)).unwrap();
        init_synchronization().unwrap();
        set_current_transaction_name(Some("scope".to_string()));
        set_actual_transaction_active(true);

        clear();

        assert!(!is_synchronization_active());
        assert!(current_transaction_name().is_none());
        assert!(!is_actual_transaction_active());
        assert!(has_resource(key));
    }

    #[test]
    fn resource_key_display() {
        assert_eq!(format!("{}", ResourceKey::new(9)), "resource:9");
    }
}
