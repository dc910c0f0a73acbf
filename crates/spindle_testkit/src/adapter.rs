//! A recording in-memory resource adapter.
//!
//! [`RecordingAdapter`] behaves like a minimal connection-backed adapter: it
//! opens a fake connection on `begin`, binds it through the ambient context
//! binder under its resource key, detaches and re-attaches it on
//! suspend/resume, and supports savepoints. Every engine-visible call is
//! recorded in order so tests can assert the exact adapter trace.

use parking_lot::Mutex;
use spindle_adapter::{
    AdapterError, AdapterResult, Isolation, ResourceAdapter, SavepointManager,
    TransactionDefinition,
};
use spindle_core::{context, ResourceKey};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// One adapter-visible operation, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterCall {
    /// `acquire` returned the current resource view.
    Acquire,
    /// `begin` opened (or nested into) a backend transaction.
    Begin,
    /// `suspend` detached the bound connection.
    Suspend,
    /// `resume` re-attached a suspended connection.
    Resume,
    /// `commit` committed the backend transaction.
    Commit,
    /// `rollback` rolled the backend transaction back.
    Rollback,
    /// `set_rollback_only` marked the connection rollback-only.
    SetRollbackOnly,
    /// `cleanup` released the connection.
    Cleanup,
    /// A savepoint with the given id was created.
    CreateSavepoint(u32),
    /// The transaction was rolled back to the given savepoint.
    RollbackToSavepoint(u32),
    /// The given savepoint was released.
    ReleaseSavepoint(u32),
}

/// A fake backend connection.
#[derive(Debug, Default)]
pub struct MockConnection {
    /// Whether a backend transaction is open on this connection.
    pub in_transaction: bool,
    /// Backend-global rollback-only marker, shared by every scope bound to
    /// this connection.
    pub rollback_only: bool,
    /// Isolation level applied at begin.
    pub isolation: Isolation,
    /// Read-only flag applied at begin.
    pub read_only: bool,
    /// Timeout applied at begin, after default resolution.
    pub timeout_secs: i32,
    /// Active savepoints, oldest first.
    pub savepoints: Vec<u32>,
}

/// Shared handle to a [`MockConnection`], as bound in the context binder.
pub type ConnectionHandle = Rc<RefCell<MockConnection>>;

/// Resource view handed to the engine by [`RecordingAdapter::acquire`].
pub struct MockResource {
    connection: Option<ConnectionHandle>,
}

impl MockResource {
    /// The underlying connection handle, if one is attached.
    #[must_use]
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection.clone()
    }
}

/// Detached connection binding returned by `suspend`.
pub struct SuspendedConnection(ConnectionHandle);

/// Savepoint handle issued by [`RecordingAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSavepoint(
    /// Savepoint id, increasing per adapter.
    pub u32,
);

#[derive(Debug)]
struct RecorderState {
    calls: Vec<AdapterCall>,
    connections_opened: u32,
    next_savepoint: u32,
    use_savepoint_for_nested: bool,
    commit_on_global_rollback_only: bool,
    supports_suspension: bool,
    fail_next_begin: bool,
    fail_next_commit: bool,
}

/// In-memory resource adapter that records every engine-visible call.
///
/// Cloning shares the recorded state, so tests keep one handle while the
/// manager owns another.
#[derive(Clone)]
pub struct RecordingAdapter {
    key: ResourceKey,
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingAdapter {
    /// Creates an adapter with a fresh resource key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: ResourceKey::allocate(),
            state: Arc::new(Mutex::new(RecorderState {
                calls: Vec::new(),
                connections_opened: 0,
                next_savepoint: 0,
                use_savepoint_for_nested: true,
                commit_on_global_rollback_only: false,
                supports_suspension: true,
                fail_next_begin: false,
                fail_next_commit: false,
            })),
        }
    }

    /// The context binder key this adapter binds its connection under.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Snapshot of every call recorded so far, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.state.lock().calls.clone()
    }

    /// Drops all recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of distinct backend connections opened by `begin`.
    #[must_use]
    pub fn connections_opened(&self) -> u32 {
        self.state.lock().connections_opened
    }

    /// Switches NESTED propagation to backend-managed begin instead of
    /// savepoints.
    pub fn use_backend_managed_nesting(&self) {
        self.state.lock().use_savepoint_for_nested = false;
    }

    /// Makes commit run even when the connection is marked rollback-only.
    pub fn commit_on_global_rollback_only(&self) {
        self.state.lock().commit_on_global_rollback_only = true;
    }

    /// Disables suspend/resume support.
    pub fn disable_suspension(&self) {
        self.state.lock().supports_suspension = false;
    }

    /// Makes the next `begin` fail.
    pub fn fail_next_begin(&self) {
        self.state.lock().fail_next_begin = true;
    }

    /// Makes the next `commit` fail.
    pub fn fail_next_commit(&self) {
        self.state.lock().fail_next_commit = true;
    }

    fn record(&self, call: AdapterCall) {
        self.state.lock().calls.push(call);
    }

    fn bound_connection(&self) -> Option<ConnectionHandle> {
        context::resource(self.key)
            .and_then(|resource| resource.downcast::<RefCell<MockConnection>>().ok())
    }
}

impl Default for RecordingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingAdapter")
            .field("key", &self.key)
            .field("calls", &self.state.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl ResourceAdapter for RecordingAdapter {
    type Resource = MockResource;
    type Suspended = SuspendedConnection;
    type Savepoint = MockSavepoint;

    fn acquire(&self) -> AdapterResult<MockResource> {
        self.record(AdapterCall::Acquire);
        Ok(MockResource {
            connection: self.bound_connection(),
        })
    }

    fn is_existing(&self, resource: &MockResource) -> bool {
        resource
            .connection
            .as_ref()
            .is_some_and(|connection| connection.borrow().in_transaction)
    }

    fn begin(
        &self,
        resource: &mut MockResource,
        definition: &TransactionDefinition,
    ) -> AdapterResult<()> {
        self.record(AdapterCall::Begin);
        {
            let mut state = self.state.lock();
            if state.fail_next_begin {
                state.fail_next_begin = false;
                return Err(AdapterError::begin("injected begin failure"));
            }
        }
        let connection = match resource.connection.clone() {
            Some(connection) => connection,
            None => {
                let connection: ConnectionHandle = Rc::new(RefCell::new(MockConnection::default()));
                context::bind_resource(self.key, connection.clone())
                    .map_err(|err| AdapterError::resource(err.to_string()))?;
                self.state.lock().connections_opened += 1;
                resource.connection = Some(connection.clone());
                connection
            }
        };
        let mut connection = connection.borrow_mut();
        connection.in_transaction = true;
        connection.isolation = definition.isolation;
        connection.read_only = definition.read_only;
        connection.timeout_secs = definition.timeout_secs;
        Ok(())
    }

    fn suspend(&self, resource: &mut MockResource) -> AdapterResult<SuspendedConnection> {
        self.record(AdapterCall::Suspend);
        if !self.state.lock().supports_suspension {
            return Err(AdapterError::SuspensionNotSupported);
        }
        let connection = resource
            .connection
            .take()
            .ok_or_else(|| AdapterError::resource("no connection to suspend"))?;
        context::unbind_resource(self.key).map_err(|err| AdapterError::resource(err.to_string()))?;
        Ok(SuspendedConnection(connection))
    }

    fn resume(&self, suspended: SuspendedConnection) -> AdapterResult<()> {
        self.record(AdapterCall::Resume);
        context::bind_resource(self.key, suspended.0)
            .map_err(|err| AdapterError::resource(err.to_string()))
    }

    fn commit(&self, resource: &mut MockResource) -> AdapterResult<()> {
        self.record(AdapterCall::Commit);
        {
            let mut state = self.state.lock();
            if state.fail_next_commit {
                state.fail_next_commit = false;
                return Err(AdapterError::commit("injected commit failure"));
            }
        }
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::commit("no connection to commit"))?;
        connection.borrow_mut().in_transaction = false;
        Ok(())
    }

    fn rollback(&self, resource: &mut MockResource) -> AdapterResult<()> {
        self.record(AdapterCall::Rollback);
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::rollback("no connection to roll back"))?;
        connection.borrow_mut().in_transaction = false;
        Ok(())
    }

    fn set_rollback_only(&self, resource: &mut MockResource) -> AdapterResult<()> {
        self.record(AdapterCall::SetRollbackOnly);
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::resource("no connection to mark rollback-only"))?;
        connection.borrow_mut().rollback_only = true;
        Ok(())
    }

    fn is_rollback_only(&self, resource: &MockResource) -> bool {
        resource
            .connection
            .as_ref()
            .is_some_and(|connection| connection.borrow().rollback_only)
    }

    fn cleanup(&self, resource: &mut MockResource) {
        self.record(AdapterCall::Cleanup);
        context::unbind_resource_if_bound(self.key);
        if let Some(connection) = resource.connection.take() {
            let mut connection = connection.borrow_mut();
            connection.in_transaction = false;
            connection.rollback_only = false;
            connection.savepoints.clear();
        }
    }

    fn use_savepoint_for_nested(&self) -> bool {
        self.state.lock().use_savepoint_for_nested
    }

    fn should_commit_on_global_rollback_only(&self) -> bool {
        self.state.lock().commit_on_global_rollback_only
    }

    fn savepoints(
        &self,
    ) -> Option<&dyn SavepointManager<Resource = MockResource, Savepoint = MockSavepoint>> {
        Some(self)
    }
}

impl SavepointManager for RecordingAdapter {
    type Resource = MockResource;
    type Savepoint = MockSavepoint;

    fn create_savepoint(&self, resource: &mut MockResource) -> AdapterResult<MockSavepoint> {
        let id = {
            let mut state = self.state.lock();
            state.next_savepoint += 1;
            state.next_savepoint
        };
        self.record(AdapterCall::CreateSavepoint(id));
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::savepoint("no connection for savepoint"))?;
        connection.borrow_mut().savepoints.push(id);
        Ok(MockSavepoint(id))
    }

    fn rollback_to_savepoint(
        &self,
        resource: &mut MockResource,
        savepoint: &MockSavepoint,
    ) -> AdapterResult<()> {
        self.record(AdapterCall::RollbackToSavepoint(savepoint.0));
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::savepoint("no connection for savepoint"))?;
        let mut connection = connection.borrow_mut();
        if !connection.savepoints.contains(&savepoint.0) {
            return Err(AdapterError::savepoint(format!(
                "unknown savepoint {}",
                savepoint.0
            )));
        }
        // Rolling back discards later savepoints but keeps this one valid.
        connection.savepoints.retain(|&id| id <= savepoint.0);
        Ok(())
    }

    fn release_savepoint(
        &self,
        resource: &mut MockResource,
        savepoint: MockSavepoint,
    ) -> AdapterResult<()> {
        self.record(AdapterCall::ReleaseSavepoint(savepoint.0));
        let connection = resource
            .connection
            .as_ref()
            .ok_or_else(|| AdapterError::savepoint("no connection for savepoint"))?;
        let mut connection = connection.borrow_mut();
        match connection.savepoints.iter().position(|&id| id == savepoint.0) {
            Some(index) => {
                connection.savepoints.remove(index);
                Ok(())
            }
            None => Err(AdapterError::savepoint(format!(
                "unknown savepoint {}",
                savepoint.0
            ))),
        }
    }
}
