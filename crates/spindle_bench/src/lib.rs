//! # Spindle Bench
//!
//! Benchmark helpers for the Spindle transaction manager.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;

pub use utils::{bench_manager, required};
