//! Error types for resource adapter operations.

use thiserror::Error;

/// Result type for resource adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur in a resource adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter does not support suspending or resuming transactions.
    #[error("resource adapter does not support transaction suspension")]
    SuspensionNotSupported,

    /// The adapter does not support savepoints.
    #[error("resource adapter does not support savepoints")]
    SavepointNotSupported,

    /// The adapter does not support participating in existing transactions.
    #[error("resource adapter does not support participating in an existing transaction")]
    ParticipationNotSupported,

    /// Acquiring the backend's view of the current resource failed.
    #[error("resource acquisition failed: {message}")]
    Acquire {
        /// Description of the failure.
        message: String,
    },

    /// Opening the backend transaction failed.
    #[error("transaction begin failed: {message}")]
    Begin {
        /// Description of the failure.
        message: String,
    },

    /// The backend commit failed.
    #[error("transaction commit failed: {message}")]
    Commit {
        /// Description of the failure.
        message: String,
    },

    /// The backend rollback failed.
    #[error("transaction rollback failed: {message}")]
    Rollback {
        /// Description of the failure.
        message: String,
    },

    /// A savepoint operation failed.
    #[error("savepoint operation failed: {message}")]
    Savepoint {
        /// Description of the failure.
        message: String,
    },

    /// A backend resource is missing, detached or otherwise unusable.
    #[error("resource error: {message}")]
    Resource {
        /// Description of the failure.
        message: String,
    },
}

impl AdapterError {
    /// Creates an acquisition error.
    pub fn acquire(message: impl Into<String>) -> Self {
        Self::Acquire {
            message: message.into(),
        }
    }

    /// Creates a begin error.
    pub fn begin(message: impl Into<String>) -> Self {
        Self::Begin {
            message: message.into(),
        }
    }

    /// Creates a commit error.
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    /// Creates a rollback error.
    pub fn rollback(message: impl Into<String>) -> Self {
        Self::Rollback {
            message: message.into(),
        }
    }

    /// Creates a savepoint error.
    pub fn savepoint(message: impl Into<String>) -> Self {
        Self::Savepoint {
            message: message.into(),
        }
    }

    /// Creates a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }
}
