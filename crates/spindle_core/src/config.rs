//! Engine configuration.

use spindle_adapter::DEFAULT_TIMEOUT;

/// When the engine activates synchronization for a new scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynchronizationPolicy {
    /// Activate synchronization for every scope, including "empty" scopes
    /// that carry no actual backend transaction.
    #[default]
    Always,
    /// Activate synchronization only for scopes with an actual transaction.
    OnActualTransaction,
    /// Never activate synchronization.
    Never,
}

/// Policy flags for a [`TransactionManager`](crate::TransactionManager).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When to activate synchronization for new scopes.
    pub synchronization: SynchronizationPolicy,

    /// Timeout substituted when a definition carries the DEFAULT sentinel.
    pub default_timeout: i32,

    /// Whether NESTED propagation is allowed at all.
    pub nested_transaction_allowed: bool,

    /// Whether isolation and read-only compatibility is enforced when
    /// participating in an existing transaction.
    pub validate_existing_transaction: bool,

    /// Whether a participating rollback marks the outer transaction
    /// rollback-only.
    pub global_rollback_on_participation_failure: bool,

    /// Whether a global rollback-only marker surfaces as `UnexpectedRollback`
    /// at the inner boundary instead of only at the outermost one.
    pub fail_early_on_global_rollback_only: bool,

    /// Whether a failed backend commit is followed by a rollback attempt.
    pub rollback_on_commit_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            synchronization: SynchronizationPolicy::Always,
            default_timeout: DEFAULT_TIMEOUT,
            nested_transaction_allowed: false,
            validate_existing_transaction: false,
            global_rollback_on_participation_failure: true,
            fail_early_on_global_rollback_only: false,
            rollback_on_commit_failure: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the synchronization activation policy.
    #[must_use]
    pub const fn synchronization(mut self, policy: SynchronizationPolicy) -> Self {
        self.synchronization = policy;
        self
    }

    /// Sets the default timeout in seconds.
    #[must_use]
    pub const fn default_timeout(mut self, seconds: i32) -> Self {
        self.default_timeout = seconds;
        self
    }

    /// Sets whether nested transactions are allowed.
    #[must_use]
    pub const fn nested_transaction_allowed(mut self, value: bool) -> Self {
        self.nested_transaction_allowed = value;
        self
    }

    /// Sets whether existing transactions are validated before participation.
    #[must_use]
    pub const fn validate_existing_transaction(mut self, value: bool) -> Self {
        self.validate_existing_transaction = value;
        self
    }

    /// Sets whether a participating rollback marks the outer transaction
    /// rollback-only.
    #[must_use]
    pub const fn global_rollback_on_participation_failure(mut self, value: bool) -> Self {
        self.global_rollback_on_participation_failure = value;
        self
    }

    /// Sets whether global rollback-only markers fail at inner boundaries.
    #[must_use]
    pub const fn fail_early_on_global_rollback_only(mut self, value: bool) -> Self {
        self.fail_early_on_global_rollback_only = value;
        self
    }

    /// Sets whether a failed commit is followed by a rollback attempt.
    #[must_use]
    pub const fn rollback_on_commit_failure(mut self, value: bool) -> Self {
        self.rollback_on_commit_failure = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.synchronization, SynchronizationPolicy::Always);
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        assert!(!config.nested_transaction_allowed);
        assert!(!config.validate_existing_transaction);
        assert!(config.global_rollback_on_participation_failure);
        assert!(!config.fail_early_on_global_rollback_only);
        assert!(!config.rollback_on_commit_failure);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .synchronization(SynchronizationPolicy::Never)
            .nested_transaction_allowed(true)
            .default_timeout(30);

        assert_eq!(config.synchronization, SynchronizationPolicy::Never);
        assert!(config.nested_transaction_allowed);
        assert_eq!(config.default_timeout, 30);
    }
}
