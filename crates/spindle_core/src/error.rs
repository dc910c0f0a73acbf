//! Error types for the transaction engine.

use crate::context::ResourceKey;
use spindle_adapter::AdapterError;
use thiserror::Error;

/// Result type for transaction engine operations.
pub type TxResult<T> = Result<T, TxError>;

/// Errors that can occur in the transaction engine.
#[derive(Debug, Error)]
pub enum TxError {
    /// The requested operation is not legal in the current transaction state.
    ///
    /// Raised for MANDATORY propagation with no existing transaction, NEVER
    /// propagation with one, operations on a completed status, and misuse of
    /// the ambient context binder.
    #[error("illegal transaction state: {message}")]
    IllegalState {
        /// Description of the violation.
        message: String,
    },

    /// A transaction timeout below the DEFAULT sentinel was specified.
    #[error("invalid transaction timeout: {seconds}")]
    InvalidTimeout {
        /// The rejected timeout value.
        seconds: i32,
    },

    /// NESTED propagation was requested but is not available.
    #[error("nested transaction not supported: {message}")]
    NestedNotSupported {
        /// Description of the missing capability.
        message: String,
    },

    /// The transaction was rolled back although commit was requested.
    #[error("unexpected rollback: {message}")]
    UnexpectedRollback {
        /// Description of why the rollback happened.
        message: String,
    },

    /// A resource is already bound under the given key.
    #[error("a resource is already bound for {key}")]
    DuplicateResourceBinding {
        /// The contested binder key.
        key: ResourceKey,
    },

    /// No resource is bound under the given key.
    #[error("no resource bound for {key}")]
    MissingResourceBinding {
        /// The unbound binder key.
        key: ResourceKey,
    },

    /// A resource adapter operation failed.
    #[error("resource adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

impl TxError {
    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a nested-not-supported error.
    pub fn nested_not_supported(message: impl Into<String>) -> Self {
        Self::NestedNotSupported {
            message: message.into(),
        }
    }

    /// Creates an unexpected-rollback error.
    pub fn unexpected_rollback(message: impl Into<String>) -> Self {
        Self::UnexpectedRollback {
            message: message.into(),
        }
    }
}
