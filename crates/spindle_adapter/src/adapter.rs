//! Resource adapter trait definition.

use crate::definition::TransactionDefinition;
use crate::error::{AdapterError, AdapterResult};

/// A backend-specific plug-in satisfying the engine's transaction contract.
///
/// The engine owns the propagation state machine and the commit/rollback
/// lifecycle; adapters own every backend effect. An adapter describes the
/// calling scope's transactional state through an opaque [`Resource`] value
/// that the engine hands back into later operations without inspecting it.
///
/// # Invariants
///
/// - `acquire` returns a view of the *current* ambient resource, which may
///   represent "no resource bound yet"
/// - `begin` is only called when the engine has decided to actually start a
///   transaction: either no transaction existed, or the previous one has been
///   suspended
/// - `commit` and `rollback` are only called for scopes that originated a
///   real begin; participation is handled by the engine
/// - `suspend` detaches the resource from the ambient context so a fresh
///   `begin` can run; `resume` re-attaches it from the snapshot alone
///
/// # Implementors
///
/// Only the required operations have to be provided; every optional operation
/// defaults to a clean refusal or a no-op. The testkit's `RecordingAdapter`
/// is a complete in-memory reference.
///
/// [`Resource`]: ResourceAdapter::Resource
pub trait ResourceAdapter {
    /// Backend view of the calling scope's transactional state.
    type Resource;

    /// Detached resource binding produced by [`ResourceAdapter::suspend`].
    type Suspended;

    /// Savepoint handle issued by the adapter's [`SavepointManager`].
    type Savepoint;

    /// Returns the backend's view of the current ambient resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or the view cannot
    /// be constructed.
    fn acquire(&self) -> AdapterResult<Self::Resource>;

    /// Whether `resource` describes an already-started transaction.
    fn is_existing(&self, _resource: &Self::Resource) -> bool {
        false
    }

    /// Opens a backend transaction with the definition's characteristics.
    ///
    /// Implementations apply isolation, read-only mode and timeout, disable
    /// any autocommit behavior, and bind their resource to the ambient
    /// context. Propagation has already been handled by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend transaction cannot be opened; the
    /// engine resumes any suspended outer scope before surfacing it.
    fn begin(
        &self,
        resource: &mut Self::Resource,
        definition: &TransactionDefinition,
    ) -> AdapterResult<()>;

    /// Detaches the resource from the ambient context and returns it.
    ///
    /// # Errors
    ///
    /// The default refuses with [`AdapterError::SuspensionNotSupported`].
    fn suspend(&self, _resource: &mut Self::Resource) -> AdapterResult<Self::Suspended> {
        Err(AdapterError::SuspensionNotSupported)
    }

    /// Re-attaches a previously suspended resource binding.
    ///
    /// # Errors
    ///
    /// The default refuses with [`AdapterError::SuspensionNotSupported`].
    fn resume(&self, _suspended: Self::Suspended) -> AdapterResult<()> {
        Err(AdapterError::SuspensionNotSupported)
    }

    /// Performs the final backend commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend commit fails.
    fn commit(&self, resource: &mut Self::Resource) -> AdapterResult<()>;

    /// Performs the final backend rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rollback fails.
    fn rollback(&self, resource: &mut Self::Resource) -> AdapterResult<()>;

    /// Marks the bound resource rollback-only on behalf of a participating
    /// scope, forcing the transaction originator's eventual outcome.
    ///
    /// # Errors
    ///
    /// The default refuses with [`AdapterError::ParticipationNotSupported`].
    fn set_rollback_only(&self, _resource: &mut Self::Resource) -> AdapterResult<()> {
        Err(AdapterError::ParticipationNotSupported)
    }

    /// Whether the backend has flagged the resource rollback-only.
    fn is_rollback_only(&self, _resource: &Self::Resource) -> bool {
        false
    }

    /// Hook invoked before the `before_commit` synchronization callbacks.
    ///
    /// # Errors
    ///
    /// Errors propagate to the commit caller and cause a rollback.
    fn prepare_for_commit(&self, _resource: &mut Self::Resource) -> AdapterResult<()> {
        Ok(())
    }

    /// Releases the resource after completion, on any outcome.
    fn cleanup(&self, _resource: &mut Self::Resource) {}

    /// Whether NESTED propagation should use a savepoint within the existing
    /// transaction rather than a backend-managed nested begin.
    fn use_savepoint_for_nested(&self) -> bool {
        true
    }

    /// Whether `commit` should still run on a transaction the backend has
    /// flagged rollback-only, letting the backend raise its own failure.
    fn should_commit_on_global_rollback_only(&self) -> bool {
        false
    }

    /// The adapter's savepoint capability, if it has one.
    fn savepoints(
        &self,
    ) -> Option<&dyn SavepointManager<Resource = Self::Resource, Savepoint = Self::Savepoint>> {
        None
    }
}

/// Savepoint operations on a live backend transaction.
///
/// Exposed as an optional capability through [`ResourceAdapter::savepoints`]
/// so backends without savepoint support do not carry dead methods.
pub trait SavepointManager {
    /// Backend view of the calling scope's transactional state.
    type Resource;

    /// Savepoint handle.
    type Savepoint;

    /// Creates a savepoint at the current point in the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the savepoint.
    fn create_savepoint(&self, resource: &mut Self::Resource) -> AdapterResult<Self::Savepoint>;

    /// Rolls the transaction back to the given savepoint, keeping it valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the savepoint is unknown or the rollback fails.
    fn rollback_to_savepoint(
        &self,
        resource: &mut Self::Resource,
        savepoint: &Self::Savepoint,
    ) -> AdapterResult<()>;

    /// Releases the given savepoint without rolling back.
    ///
    /// # Errors
    ///
    /// Returns an error if the savepoint is unknown or the release fails.
    fn release_savepoint(
        &self,
        resource: &mut Self::Resource,
        savepoint: Self::Savepoint,
    ) -> AdapterResult<()>;
}
