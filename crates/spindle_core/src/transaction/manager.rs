//! The propagation engine.

use crate::config::{EngineConfig, SynchronizationPolicy};
use crate::context;
use crate::error::{TxError, TxResult};
use crate::synchronization::{self, CompletionStatus, TransactionSynchronization};
use crate::transaction::status::TransactionStatus;
use crate::transaction::suspended::SuspendedResources;
use spindle_adapter::{
    AdapterError, Isolation, Propagation, ResourceAdapter, SavepointManager,
    TransactionDefinition, DEFAULT_TIMEOUT,
};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, trace, warn};

/// Coordinates transactional scopes over a pluggable resource backend.
///
/// The manager implements the propagation state machine: a newly requested
/// scope joins, suspends, nests within or refuses an already-active scope
/// depending on its definition's propagation behavior. It drives the full
/// commit/rollback lifecycle - synchronization callbacks, savepoints,
/// rollback-only marks, suspension and resumption of outer scopes - and
/// delegates every backend effect to its [`ResourceAdapter`].
///
/// The manager is single-threaded per logical scope: ambient state is bound
/// to the calling thread, and a scope must complete on the thread that began
/// it. Independent scopes on different threads do not interact.
pub struct TransactionManager<A: ResourceAdapter> {
    adapter: A,
    config: EngineConfig,
}

impl<A: ResourceAdapter> TransactionManager<A> {
    /// Creates a manager with default policy flags.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            config: EngineConfig::default(),
        }
    }

    /// Creates a manager with the given policy flags.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidTimeout` if the configured default timeout is below
    /// the DEFAULT sentinel.
    pub fn with_config(adapter: A, config: EngineConfig) -> TxResult<Self> {
        if config.default_timeout < DEFAULT_TIMEOUT {
            return Err(TxError::InvalidTimeout {
                seconds: config.default_timeout,
            });
        }
        Ok(Self { adapter, config })
    }

    /// Returns the resource adapter.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the policy flags.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens a transactional scope according to the definition's propagation
    /// behavior.
    ///
    /// The returned status must be terminated by exactly one call to
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback).
    ///
    /// # Errors
    ///
    /// - `IllegalState` for MANDATORY with no existing transaction, NEVER
    ///   with one, or a failed participation validation
    /// - `InvalidTimeout` for a timeout below the DEFAULT sentinel
    /// - `NestedNotSupported` when NESTED is requested but disabled or the
    ///   adapter cannot savepoint
    /// - `Adapter` for backend acquire/suspend/begin failures
    pub fn begin(&self, definition: &TransactionDefinition) -> TxResult<TransactionStatus<A>> {
        let mut resource = self.adapter.acquire()?;

        if self.adapter.is_existing(&resource) {
            return self.begin_existing(definition, resource);
        }

        if definition.timeout_secs < DEFAULT_TIMEOUT {
            return Err(TxError::InvalidTimeout {
                seconds: definition.timeout_secs,
            });
        }

        match definition.propagation {
            Propagation::Mandatory => Err(TxError::illegal_state(
                "no existing transaction found for propagation 'mandatory'",
            )),
            Propagation::Required | Propagation::RequiresNew | Propagation::Nested => {
                // No outer transaction exists, so only active synchronizations
                // can need parking.
                let suspended = self.suspend(None)?;
                debug!(name = definition.name.as_deref(), "creating new transaction");
                let new_synchronization =
                    self.config.synchronization != SynchronizationPolicy::Never;
                match self.adapter.begin(&mut resource, &self.resolved(definition)) {
                    Ok(()) => self.prepare_status(
                        definition,
                        Some(resource),
                        true,
                        new_synchronization,
                        suspended,
                    ),
                    Err(begin_err) => {
                        self.resume_after_begin_error(suspended, &begin_err)?;
                        Err(begin_err.into())
                    }
                }
            }
            Propagation::Supports | Propagation::NotSupported | Propagation::Never => {
                // "Empty" scope: no backend transaction, but potentially
                // synchronization.
                if definition.isolation != Isolation::Default {
                    warn!(
                        isolation = definition.isolation.as_str(),
                        "custom isolation level specified but no actual transaction initiated; \
                         the isolation level will be ignored"
                    );
                }
                let new_synchronization =
                    self.config.synchronization == SynchronizationPolicy::Always;
                self.prepare_status(definition, None, true, new_synchronization, None)
            }
        }
    }

    /// Builds a status for a scope requested while a transaction is active.
    fn begin_existing(
        &self,
        definition: &TransactionDefinition,
        mut resource: A::Resource,
    ) -> TxResult<TransactionStatus<A>> {
        match definition.propagation {
            Propagation::Never => Err(TxError::illegal_state(
                "existing transaction found for propagation 'never'",
            )),
            Propagation::NotSupported => {
                debug!("suspending current transaction");
                let suspended = self.suspend(Some(&mut resource))?;
                let new_synchronization =
                    self.config.synchronization == SynchronizationPolicy::Always;
                self.prepare_status(definition, None, false, new_synchronization, suspended)
            }
            Propagation::RequiresNew => {
                debug!(
                    name = definition.name.as_deref(),
                    "suspending current transaction, creating new transaction"
                );
                let suspended = self.suspend(Some(&mut resource))?;
                let new_synchronization =
                    self.config.synchronization != SynchronizationPolicy::Never;
                match self.adapter.begin(&mut resource, &self.resolved(definition)) {
                    Ok(()) => self.prepare_status(
                        definition,
                        Some(resource),
                        true,
                        new_synchronization,
                        suspended,
                    ),
                    Err(begin_err) => {
                        self.resume_after_begin_error(suspended, &begin_err)?;
                        Err(begin_err.into())
                    }
                }
            }
            Propagation::Nested => {
                if !self.config.nested_transaction_allowed {
                    return Err(TxError::nested_not_supported(
                        "nested transactions are disabled - enable 'nested_transaction_allowed' \
                         to use propagation 'nested'",
                    ));
                }
                debug!(name = definition.name.as_deref(), "creating nested transaction");
                if self.adapter.use_savepoint_for_nested() {
                    // Savepoint within the existing transaction. Never
                    // activates new synchronization.
                    let mut status =
                        self.prepare_status(definition, Some(resource), false, false, None)?;
                    let savepoint = self.create_savepoint(&mut status)?;
                    status.set_savepoint(savepoint);
                    Ok(status)
                } else {
                    // Nested begin and commit/rollback handled by the backend
                    // itself.
                    self.adapter.begin(&mut resource, &self.resolved(definition))?;
                    let new_synchronization =
                        self.config.synchronization != SynchronizationPolicy::Never;
                    self.prepare_status(
                        definition,
                        Some(resource),
                        true,
                        new_synchronization,
                        None,
                    )
                }
            }
            // Participate in the existing transaction.
            Propagation::Required | Propagation::Supports | Propagation::Mandatory => {
                debug!("participating in existing transaction");
                if self.config.validate_existing_transaction {
                    self.validate_participation(definition)?;
                }
                let new_synchronization =
                    self.config.synchronization != SynchronizationPolicy::Never;
                self.prepare_status(definition, Some(resource), false, new_synchronization, None)
            }
        }
    }

    fn validate_participation(&self, definition: &TransactionDefinition) -> TxResult<()> {
        if definition.isolation != Isolation::Default {
            let current = context::current_isolation();
            if current != Some(definition.isolation) {
                return Err(TxError::illegal_state(format!(
                    "participating transaction specifies isolation '{}' which is incompatible \
                     with the existing transaction ('{}')",
                    definition.isolation.as_str(),
                    current.map_or("unknown", |isolation| isolation.as_str()),
                )));
            }
        }
        // Read-only is checked one way only: a read-only definition may join
        // a read-write scope.
        if !definition.read_only && context::is_current_transaction_read_only() {
            return Err(TxError::illegal_state(
                "participating transaction is not marked read-only but the existing \
                 transaction is",
            ));
        }
        Ok(())
    }

    /// Substitutes the configured default timeout for the DEFAULT sentinel.
    fn resolved(&self, definition: &TransactionDefinition) -> TransactionDefinition {
        let mut resolved = definition.clone();
        if resolved.timeout_secs == DEFAULT_TIMEOUT {
            resolved.timeout_secs = self.config.default_timeout;
        }
        resolved
    }

    fn prepare_status(
        &self,
        definition: &TransactionDefinition,
        resource: Option<A::Resource>,
        new_transaction: bool,
        new_synchronization: bool,
        suspended: Option<SuspendedResources<A>>,
    ) -> TxResult<TransactionStatus<A>> {
        let actual_new_synchronization =
            new_synchronization && !context::is_synchronization_active();
        let status = TransactionStatus::new(
            resource,
            new_transaction,
            actual_new_synchronization,
            definition.read_only,
            suspended,
        );
        self.prepare_synchronization(&status, definition)?;
        Ok(status)
    }

    fn prepare_synchronization(
        &self,
        status: &TransactionStatus<A>,
        definition: &TransactionDefinition,
    ) -> TxResult<()> {
        if status.is_new_synchronization() {
            context::set_actual_transaction_active(status.has_resource());
            context::set_current_isolation(
                (definition.isolation != Isolation::Default).then_some(definition.isolation),
            );
            context::set_current_transaction_read_only(definition.read_only);
            context::set_current_transaction_name(definition.name.clone());
            context::init_synchronization()?;
        }
        Ok(())
    }

    /// Suspends the given resource, if any, together with any active
    /// synchronization and the ambient scalar slots.
    fn suspend(
        &self,
        resource: Option<&mut A::Resource>,
    ) -> TxResult<Option<SuspendedResources<A>>> {
        if context::is_synchronization_active() {
            let synchronizations = self.suspend_synchronizations()?;
            let suspended_resource = match resource {
                Some(resource) => match self.adapter.suspend(resource) {
                    Ok(suspended) => Some(suspended),
                    Err(suspend_err) => {
                        // The outer transaction is still active; restore its
                        // callbacks before surfacing the error.
                        if let Err(restore_err) = self.resume_synchronizations(synchronizations) {
                            error!(%restore_err, "failed to restore synchronizations after suspend error");
                        }
                        return Err(suspend_err.into());
                    }
                },
                None => None,
            };
            let name = context::current_transaction_name();
            context::set_current_transaction_name(None);
            let read_only = context::is_current_transaction_read_only();
            context::set_current_transaction_read_only(false);
            let isolation = context::current_isolation();
            context::set_current_isolation(None);
            let was_active = context::is_actual_transaction_active();
            context::set_actual_transaction_active(false);
            Ok(Some(SuspendedResources::full(
                suspended_resource,
                synchronizations,
                name,
                read_only,
                isolation,
                was_active,
            )))
        } else if let Some(resource) = resource {
            // Transaction active but no synchronization to park.
            let suspended = self.adapter.suspend(resource)?;
            Ok(Some(SuspendedResources::from_resource(suspended)))
        } else {
            Ok(None)
        }
    }

    /// Restores a suspended scope: backend binding first, then scalars and
    /// synchronization callbacks.
    fn resume(&self, holder: Option<SuspendedResources<A>>) -> TxResult<()> {
        let Some(holder) = holder else {
            return Ok(());
        };
        if let Some(suspended) = holder.resource {
            self.adapter.resume(suspended)?;
        }
        if let Some(synchronizations) = holder.synchronizations {
            context::set_actual_transaction_active(holder.was_active);
            context::set_current_isolation(holder.isolation);
            context::set_current_transaction_read_only(holder.read_only);
            context::set_current_transaction_name(holder.name);
            self.resume_synchronizations(synchronizations)?;
        }
        Ok(())
    }

    fn resume_after_begin_error(
        &self,
        suspended: Option<SuspendedResources<A>>,
        begin_err: &AdapterError,
    ) -> TxResult<()> {
        if let Err(resume_err) = self.resume(suspended) {
            error!(%begin_err, "transaction begin error overridden by outer scope resume error");
            return Err(resume_err);
        }
        Ok(())
    }

    fn suspend_synchronizations(&self) -> TxResult<Vec<Rc<dyn TransactionSynchronization>>> {
        let synchronizations = context::synchronizations()?;
        for synchronization in &synchronizations {
            synchronization.suspend();
        }
        context::clear_synchronization();
        Ok(synchronizations)
    }

    fn resume_synchronizations(
        &self,
        synchronizations: Vec<Rc<dyn TransactionSynchronization>>,
    ) -> TxResult<()> {
        context::init_synchronization()?;
        for synchronization in synchronizations {
            synchronization.resume();
            context::register_synchronization(synchronization)?;
        }
        Ok(())
    }

    /// Completes the scope, normally by committing.
    ///
    /// A scope marked rollback-only - locally through the status, or globally
    /// through the backend - is rolled back instead; the global case
    /// additionally surfaces `UnexpectedRollback` to the caller.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if the scope is already completed
    /// - `UnexpectedRollback` when a global rollback-only mark forced a
    ///   rollback although commit was requested
    /// - `Adapter` for backend commit/rollback failures
    pub fn commit(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        if status.is_completed() {
            return Err(TxError::illegal_state(
                "transaction is already completed - do not call commit or rollback more than \
                 once per transaction",
            ));
        }

        if status.is_local_rollback_only() {
            debug!("transactional code has requested rollback");
            return self.process_rollback(status, false);
        }

        if !self.adapter.should_commit_on_global_rollback_only()
            && self.is_global_rollback_only(status)
        {
            debug!("global transaction is marked as rollback-only but commit was requested");
            return self.process_rollback(status, true);
        }

        self.process_commit(status)
    }

    /// Completes the scope by rolling back.
    ///
    /// For a participating scope this marks the outer transaction
    /// rollback-only (subject to policy) rather than rolling back the shared
    /// backend transaction itself.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if the scope is already completed
    /// - `Adapter` for backend rollback failures
    pub fn rollback(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        if status.is_completed() {
            return Err(TxError::illegal_state(
                "transaction is already completed - do not call commit or rollback more than \
                 once per transaction",
            ));
        }
        self.process_rollback(status, false)
    }

    /// Whether the scope is marked rollback-only, locally or by the backend.
    #[must_use]
    pub fn is_rollback_only(&self, status: &TransactionStatus<A>) -> bool {
        status.is_local_rollback_only() || self.is_global_rollback_only(status)
    }

    fn is_global_rollback_only(&self, status: &TransactionStatus<A>) -> bool {
        status
            .resource()
            .is_some_and(|resource| self.adapter.is_rollback_only(resource))
    }

    fn process_commit(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let result = self.apply_commit(status);
        self.finish(status, result)
    }

    fn apply_commit(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let mut before_completion_invoked = false;

        if let Err(err) = self.commit_pre_phase(status, &mut before_completion_invoked) {
            if !before_completion_invoked {
                self.trigger_before_completion_quietly(status);
            }
            self.rollback_on_commit_error(status, &err)?;
            return Err(err);
        }

        let mut unexpected = false;
        if status.has_savepoint() {
            debug!("releasing transaction savepoint");
            unexpected = self.is_global_rollback_only(status);
            if let Err(err) = self.release_held_savepoint(status) {
                return self.handle_commit_error(status, err);
            }
        } else if status.is_new_transaction() {
            debug!("initiating transaction commit");
            unexpected = self.is_global_rollback_only(status);
            if let Err(err) = self.commit_resource(status) {
                return self.handle_commit_error(status, err);
            }
        } else if self.config.fail_early_on_global_rollback_only {
            unexpected = self.is_global_rollback_only(status);
        }

        // A global rollback-only marker without a matching failure from the
        // backend commit still has to surface as a rollback to the caller.
        if unexpected {
            self.trigger_after_completion(status, CompletionStatus::RolledBack);
            return Err(TxError::unexpected_rollback(
                "transaction silently rolled back because it has been marked as rollback-only",
            ));
        }

        // An after_commit error reaches the caller, but only once
        // after_completion has run; the transaction is still committed.
        let after_commit = self.trigger_after_commit(status);
        self.trigger_after_completion(status, CompletionStatus::Committed);
        after_commit
    }

    fn commit_pre_phase(
        &self,
        status: &mut TransactionStatus<A>,
        before_completion_invoked: &mut bool,
    ) -> TxResult<()> {
        if let Some(resource) = status.resource_mut() {
            self.adapter.prepare_for_commit(resource)?;
        }
        self.trigger_before_commit(status)?;
        self.trigger_before_completion(status)?;
        *before_completion_invoked = true;
        Ok(())
    }

    fn handle_commit_error(
        &self,
        status: &mut TransactionStatus<A>,
        err: TxError,
    ) -> TxResult<()> {
        if self.config.rollback_on_commit_failure {
            self.rollback_on_commit_error(status, &err)?;
        } else {
            self.trigger_after_completion(status, CompletionStatus::Unknown);
        }
        Err(err)
    }

    /// Rolls back (or marks rollback-only) after a failed commit attempt.
    ///
    /// The rollback error overrides the original commit error only when the
    /// rollback itself fails; otherwise the original is surfaced.
    fn rollback_on_commit_error(
        &self,
        status: &mut TransactionStatus<A>,
        cause: &TxError,
    ) -> TxResult<()> {
        let result = if status.is_new_transaction() {
            debug!("initiating transaction rollback after commit error");
            self.rollback_resource(status)
        } else if status.has_resource() && self.config.global_rollback_on_participation_failure {
            debug!("marking existing transaction as rollback-only after commit error");
            self.set_resource_rollback_only(status)
        } else {
            Ok(())
        };
        match result {
            Ok(()) => {
                self.trigger_after_completion(status, CompletionStatus::RolledBack);
                Ok(())
            }
            Err(rollback_err) => {
                error!(%cause, "commit error overridden by rollback error");
                self.trigger_after_completion(status, CompletionStatus::Unknown);
                Err(rollback_err)
            }
        }
    }

    fn process_rollback(&self, status: &mut TransactionStatus<A>, unexpected: bool) -> TxResult<()> {
        let result = self.apply_rollback(status, unexpected);
        self.finish(status, result)
    }

    fn apply_rollback(&self, status: &mut TransactionStatus<A>, unexpected: bool) -> TxResult<()> {
        let mut unexpected_rollback = unexpected;

        if let Err(err) = self.rollback_phase(status, &mut unexpected_rollback) {
            self.trigger_after_completion(status, CompletionStatus::Unknown);
            return Err(err);
        }

        self.trigger_after_completion(status, CompletionStatus::RolledBack);
        if unexpected_rollback {
            return Err(TxError::unexpected_rollback(
                "transaction rolled back because it has been marked as rollback-only",
            ));
        }
        Ok(())
    }

    fn rollback_phase(
        &self,
        status: &mut TransactionStatus<A>,
        unexpected_rollback: &mut bool,
    ) -> TxResult<()> {
        self.trigger_before_completion(status)?;

        if status.has_savepoint() {
            debug!("rolling back transaction to savepoint");
            self.rollback_to_held_savepoint(status)?;
        } else if status.is_new_transaction() {
            debug!("initiating transaction rollback");
            self.rollback_resource(status)?;
        } else {
            if status.has_resource() {
                if status.is_local_rollback_only()
                    || self.config.global_rollback_on_participation_failure
                {
                    debug!(
                        "participating transaction failed - marking existing transaction as \
                         rollback-only"
                    );
                    self.set_resource_rollback_only(status)?;
                } else {
                    debug!(
                        "participating transaction failed - letting the transaction originator \
                         decide on rollback"
                    );
                }
            } else {
                debug!("should roll back transaction but cannot - no backend resource attached");
            }
            // A participating rollback is silent by default; the outermost
            // boundary surfaces the outcome.
            if !self.config.fail_early_on_global_rollback_only {
                *unexpected_rollback = false;
            }
        }
        Ok(())
    }

    /// Creates a savepoint on the scope's backend resource.
    ///
    /// # Errors
    ///
    /// Fails with `NestedNotSupported` if the adapter exposes no savepoint
    /// capability, and with `IllegalState` if the scope has no resource.
    pub fn create_savepoint(&self, status: &mut TransactionStatus<A>) -> TxResult<A::Savepoint> {
        let savepoints = self.savepoint_manager()?;
        match status.resource_mut() {
            Some(resource) => Ok(savepoints.create_savepoint(resource)?),
            None => Err(TxError::illegal_state(
                "cannot create a savepoint without a backend resource",
            )),
        }
    }

    /// Rolls the scope back to a previously created savepoint, keeping the
    /// savepoint valid.
    ///
    /// # Errors
    ///
    /// Fails like [`create_savepoint`](Self::create_savepoint), or with the
    /// adapter's error if the savepoint is unknown.
    pub fn rollback_to_savepoint(
        &self,
        status: &mut TransactionStatus<A>,
        savepoint: &A::Savepoint,
    ) -> TxResult<()> {
        let savepoints = self.savepoint_manager()?;
        match status.resource_mut() {
            Some(resource) => Ok(savepoints.rollback_to_savepoint(resource, savepoint)?),
            None => Err(TxError::illegal_state(
                "cannot roll back to a savepoint without a backend resource",
            )),
        }
    }

    /// Releases a previously created savepoint without rolling back.
    ///
    /// # Errors
    ///
    /// Fails like [`create_savepoint`](Self::create_savepoint), or with the
    /// adapter's error if the savepoint is unknown.
    pub fn release_savepoint(
        &self,
        status: &mut TransactionStatus<A>,
        savepoint: A::Savepoint,
    ) -> TxResult<()> {
        let savepoints = self.savepoint_manager()?;
        match status.resource_mut() {
            Some(resource) => Ok(savepoints.release_savepoint(resource, savepoint)?),
            None => Err(TxError::illegal_state(
                "cannot release a savepoint without a backend resource",
            )),
        }
    }

    fn savepoint_manager(
        &self,
    ) -> TxResult<&dyn SavepointManager<Resource = A::Resource, Savepoint = A::Savepoint>> {
        self.adapter.savepoints().ok_or_else(|| {
            TxError::nested_not_supported("resource adapter does not expose savepoint support")
        })
    }

    fn release_held_savepoint(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let Some(savepoint) = status.take_savepoint() else {
            return Err(TxError::illegal_state(
                "no savepoint held by this transaction scope",
            ));
        };
        self.release_savepoint(status, savepoint)
    }

    fn rollback_to_held_savepoint(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        let Some(savepoint) = status.take_savepoint() else {
            return Err(TxError::illegal_state(
                "no savepoint held by this transaction scope",
            ));
        };
        self.rollback_to_savepoint(status, &savepoint)?;
        self.release_savepoint(status, savepoint)
    }

    fn commit_resource(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        match status.resource_mut() {
            Some(resource) => Ok(self.adapter.commit(resource)?),
            None => Err(TxError::illegal_state(
                "commit requested but no backend resource is attached",
            )),
        }
    }

    fn rollback_resource(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        match status.resource_mut() {
            Some(resource) => Ok(self.adapter.rollback(resource)?),
            None => Err(TxError::illegal_state(
                "rollback requested but no backend resource is attached",
            )),
        }
    }

    fn set_resource_rollback_only(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        match status.resource_mut() {
            Some(resource) => Ok(self.adapter.set_rollback_only(resource)?),
            None => Err(TxError::illegal_state(
                "rollback-only requested but no backend resource is attached",
            )),
        }
    }

    fn trigger_before_commit(&self, status: &TransactionStatus<A>) -> TxResult<()> {
        if status.is_new_synchronization() {
            trace!("triggering before_commit synchronization");
            synchronization::invoke_before_commit(
                &context::synchronizations()?,
                status.is_read_only(),
            )?;
        }
        Ok(())
    }

    fn trigger_before_completion(&self, status: &TransactionStatus<A>) -> TxResult<()> {
        if status.is_new_synchronization() {
            trace!("triggering before_completion synchronization");
            synchronization::invoke_before_completion(&context::synchronizations()?)?;
        }
        Ok(())
    }

    fn trigger_before_completion_quietly(&self, status: &TransactionStatus<A>) {
        if let Err(err) = self.trigger_before_completion(status) {
            error!(%err, "before_completion synchronization failed during commit error handling");
        }
    }

    fn trigger_after_commit(&self, status: &TransactionStatus<A>) -> TxResult<()> {
        if status.is_new_synchronization() {
            trace!("triggering after_commit synchronization");
            synchronization::invoke_after_commit(&context::synchronizations()?)?;
        }
        Ok(())
    }

    fn trigger_after_completion(
        &self,
        status: &TransactionStatus<A>,
        completion: CompletionStatus,
    ) {
        if status.is_new_synchronization() {
            let synchronizations = context::take_synchronizations();
            if !status.has_resource() || status.is_new_transaction() {
                trace!("triggering after_completion synchronization");
                synchronization::invoke_after_completion(&synchronizations, completion);
            } else if !synchronizations.is_empty() {
                // Participating in an externally managed transaction whose
                // outcome is not observable at this boundary.
                debug!(
                    "invoking after_completion callbacks with outcome 'unknown' for externally \
                     managed transaction"
                );
                synchronization::invoke_after_completion(
                    &synchronizations,
                    CompletionStatus::Unknown,
                );
            }
        }
    }

    /// Marks the status completed, clears ambient state this scope owns,
    /// releases the backend resource for scopes that began one, and resumes
    /// any suspended outer scope.
    fn cleanup_after_completion(&self, status: &mut TransactionStatus<A>) -> TxResult<()> {
        status.mark_completed();
        if status.is_new_synchronization() {
            context::clear();
        }
        if status.is_new_transaction() {
            if let Some(resource) = status.resource_mut() {
                self.adapter.cleanup(resource);
            }
        }
        if let Some(suspended) = status.take_suspended() {
            debug!("resuming suspended transaction after completion of inner transaction");
            self.resume(Some(suspended))?;
        }
        Ok(())
    }

    /// Runs cleanup and folds its outcome into the operation result; a
    /// cleanup error never masks the primary error.
    fn finish(&self, status: &mut TransactionStatus<A>, result: TxResult<()>) -> TxResult<()> {
        let cleanup = self.cleanup_after_completion(status);
        match (result, cleanup) {
            (Ok(()), cleanup) => cleanup,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                error!(%cleanup_err, "cleanup failed after transaction error");
                Err(err)
            }
        }
    }
}

impl<A: ResourceAdapter> fmt::Debug for TransactionManager<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
