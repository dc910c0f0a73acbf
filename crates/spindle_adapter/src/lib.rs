//! # Spindle Adapter
//!
//! Resource adapter contract for the Spindle transaction manager.
//!
//! This crate is the lowest layer of the Spindle workspace. It defines the
//! vocabulary shared between the engine and concrete backends:
//!
//! - [`TransactionDefinition`] - caller-supplied characteristics of a
//!   transactional scope (propagation, isolation, timeout, read-only, name)
//! - [`ResourceAdapter`] - the backend-specific plug-in the engine drives for
//!   begin/commit/rollback/suspend/resume
//! - [`SavepointManager`] - the optional savepoint sub-capability
//!
//! ## Design Principles
//!
//! - The engine never touches a backend directly; every backend effect flows
//!   through a [`ResourceAdapter`]
//! - Optional operations carry defaults that refuse cleanly, so minimal
//!   backends stay minimal
//! - Savepoints are a narrow, separate capability rather than part of a fat
//!   adapter interface
//!
//! ## Example
//!
//! ```rust,ignore
//! use spindle_adapter::{AdapterResult, ResourceAdapter, TransactionDefinition};
//!
//! struct ConnectionAdapter { /* pool handle, binder key, ... */ }
//!
//! impl ResourceAdapter for ConnectionAdapter {
//!     type Resource = ConnectionView;
//!     type Suspended = DetachedConnection;
//!     type Savepoint = SavepointName;
//!
//!     fn acquire(&self) -> AdapterResult<ConnectionView> { /* ... */ }
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod definition;
mod error;

pub use adapter::{ResourceAdapter, SavepointManager};
pub use definition::{Isolation, Propagation, TransactionDefinition, DEFAULT_TIMEOUT};
pub use error::{AdapterError, AdapterResult};
