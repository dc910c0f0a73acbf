//! # Spindle Testkit
//!
//! Test utilities for the Spindle transaction manager.
//!
//! This crate provides:
//! - [`RecordingAdapter`] - an in-memory resource adapter that records every
//!   engine-visible call in order, for asserting adapter traces
//! - [`SyncRecorder`] and [`TrackingSynchronization`] - synchronization
//!   callbacks that log the lifecycle events they observe
//! - Definition and manager fixtures
//!
//! The end-to-end scenario tests for the engine live in this crate's
//! `tests/` directory, since they exercise the engine through the mock.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use spindle_testkit::prelude::*;
//!
//! #[test]
//! fn commit_reaches_the_backend() {
//!     let (manager, adapter) = recording_manager();
//!     let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
//!     manager.commit(&mut status).unwrap();
//!     assert_eq!(
//!         adapter.calls(),
//!         vec![
//!             AdapterCall::Acquire,
//!             AdapterCall::Begin,
//!             AdapterCall::Commit,
//!             AdapterCall::Cleanup,
//!         ]
//!     );
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod fixtures;
pub mod sync;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adapter::*;
    pub use crate::fixtures::*;
    pub use crate::sync::*;
}

pub use adapter::{AdapterCall, ConnectionHandle, MockConnection, MockResource, MockSavepoint,
    RecordingAdapter, SuspendedConnection};
pub use fixtures::{definition, recording_manager, recording_manager_with};
pub use sync::{SyncEvent, SyncRecorder, TrackingSynchronization};
