//! # Spindle Core
//!
//! The Spindle transaction engine.
//!
//! This crate provides:
//! - The propagation engine ([`TransactionManager`]): how a newly requested
//!   transactional scope joins, suspends, nests within or refuses an
//!   already-active scope
//! - The commit/rollback lifecycle with savepoint-based nested transactions
//!   and rollback-only handling
//! - The ambient [`context`] binder: per-logical-thread resource bindings,
//!   scope characteristics and synchronization callbacks
//! - [`synchronization`] callbacks dispatched at scope boundaries
//!
//! The engine never touches a backend directly; all backend effects flow
//! through a [`ResourceAdapter`] implementation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spindle_core::{Propagation, TransactionDefinition, TransactionManager};
//!
//! let manager = TransactionManager::new(adapter);
//!
//! let mut status = manager.begin(&TransactionDefinition::default())?;
//! // ... work against the backend resource ...
//! manager.commit(&mut status)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod synchronization;

mod config;
mod error;
mod transaction;

pub use config::{EngineConfig, SynchronizationPolicy};
pub use context::ResourceKey;
pub use error::{TxError, TxResult};
pub use synchronization::{CompletionStatus, TransactionSynchronization};
pub use transaction::{TransactionManager, TransactionStatus};

pub use spindle_adapter::{
    AdapterError, AdapterResult, Isolation, Propagation, ResourceAdapter, SavepointManager,
    TransactionDefinition, DEFAULT_TIMEOUT,
};
