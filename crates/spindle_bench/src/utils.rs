//! Shared benchmark helpers.

use spindle_core::{Propagation, TransactionDefinition, TransactionManager};
use spindle_testkit::RecordingAdapter;

/// Creates a manager over a throwaway recording adapter.
#[must_use]
pub fn bench_manager() -> TransactionManager<RecordingAdapter> {
    TransactionManager::new(RecordingAdapter::new())
}

/// A REQUIRED definition with default characteristics.
#[must_use]
pub fn required() -> TransactionDefinition {
    TransactionDefinition::with_propagation(Propagation::Required)
}
