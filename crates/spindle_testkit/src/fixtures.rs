//! Definition and manager fixtures.

use crate::adapter::RecordingAdapter;
use spindle_core::{
    EngineConfig, Propagation, TransactionDefinition, TransactionManager, TxResult,
};

/// Creates a manager over a fresh [`RecordingAdapter`], returning the test's
/// handle to the adapter alongside it.
#[must_use]
pub fn recording_manager() -> (TransactionManager<RecordingAdapter>, RecordingAdapter) {
    let adapter = RecordingAdapter::new();
    (TransactionManager::new(adapter.clone()), adapter)
}

/// Creates a manager with explicit policy flags over a fresh adapter.
///
/// # Errors
///
/// Fails if the configuration is rejected by the manager.
pub fn recording_manager_with(
    config: EngineConfig,
) -> TxResult<(TransactionManager<RecordingAdapter>, RecordingAdapter)> {
    let adapter = RecordingAdapter::new();
    Ok((
        TransactionManager::with_config(adapter.clone(), config)?,
        adapter,
    ))
}

/// A definition with the given propagation and default characteristics
/// otherwise.
#[must_use]
pub fn definition(propagation: Propagation) -> TransactionDefinition {
    TransactionDefinition::with_propagation(propagation)
}
