//! Transaction definitions.

/// Sentinel timeout meaning "use the underlying infrastructure's default".
pub const DEFAULT_TIMEOUT: i32 = -1;

/// How a transactional scope composes with an already-active scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// Join the active transaction, or start a new one if none exists.
    #[default]
    Required,
    /// Join the active transaction if present, otherwise run without one.
    Supports,
    /// Join the active transaction; fail if none exists.
    Mandatory,
    /// Always start a new transaction, suspending any active one.
    RequiresNew,
    /// Run without a transaction, suspending any active one.
    NotSupported,
    /// Run without a transaction; fail if one is active.
    Never,
    /// Run nested within the active transaction, typically via a savepoint.
    Nested,
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Isolation {
    /// Use the backend's default isolation level.
    #[default]
    Default,
    /// Dirty reads, non-repeatable reads and phantom reads can occur.
    ReadUncommitted,
    /// Dirty reads are prevented.
    ReadCommitted,
    /// Dirty reads and non-repeatable reads are prevented.
    RepeatableRead,
    /// Dirty reads, non-repeatable reads and phantom reads are prevented.
    Serializable,
}

impl Isolation {
    /// Returns the conventional name of the isolation level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Caller-supplied characteristics of a transactional scope.
///
/// A definition is immutable once handed to the engine. The default value is
/// a read-write REQUIRED scope with default isolation and no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDefinition {
    /// How this scope composes with an already-active scope.
    pub propagation: Propagation,

    /// Requested isolation level.
    pub isolation: Isolation,

    /// Timeout in seconds, or [`DEFAULT_TIMEOUT`] for the backend default.
    pub timeout_secs: i32,

    /// Whether the scope only reads.
    pub read_only: bool,

    /// Optional human-readable label, carried into the ambient context.
    pub name: Option<String>,
}

impl Default for TransactionDefinition {
    fn default() -> Self {
        Self {
            propagation: Propagation::Required,
            isolation: Isolation::Default,
            timeout_secs: DEFAULT_TIMEOUT,
            read_only: false,
            name: None,
        }
    }
}

impl TransactionDefinition {
    /// Creates a definition with default characteristics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a definition with the given propagation behavior.
    #[must_use]
    pub fn with_propagation(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Self::default()
        }
    }

    /// Sets the propagation behavior.
    #[must_use]
    pub const fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Sets the isolation level.
    #[must_use]
    pub const fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout_secs: i32) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the read-only flag.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the scope name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_definition() {
        let definition = TransactionDefinition::default();
        assert_eq!(definition.propagation, Propagation::Required);
        assert_eq!(definition.isolation, Isolation::Default);
        assert_eq!(definition.timeout_secs, DEFAULT_TIMEOUT);
        assert!(!definition.read_only);
        assert!(definition.name.is_none());
    }

    #[test]
    fn builder_pattern() {
        let definition = TransactionDefinition::new()
            .propagation(Propagation::RequiresNew)
            .isolation(Isolation::Serializable)
            .timeout_secs(30)
            .read_only(true)
            .name("audit-export");

        assert_eq!(definition.propagation, Propagation::RequiresNew);
        assert_eq!(definition.isolation, Isolation::Serializable);
        assert_eq!(definition.timeout_secs, 30);
        assert!(definition.read_only);
        assert_eq!(definition.name.as_deref(), Some("audit-export"));
    }

    #[test]
    fn with_propagation_keeps_defaults() {
        let definition = TransactionDefinition::with_propagation(Propagation::Mandatory);
        assert_eq!(definition.propagation, Propagation::Mandatory);
        assert_eq!(definition.timeout_secs, DEFAULT_TIMEOUT);
    }

    #[test]
    fn isolation_names() {
        assert_eq!(Isolation::Serializable.as_str(), "SERIALIZABLE");
        assert_eq!(Isolation::Default.as_str(), "DEFAULT");
    }
}
