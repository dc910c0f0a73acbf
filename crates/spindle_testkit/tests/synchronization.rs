//! Synchronization callback dispatch across the commit/rollback lifecycle.

use spindle_core::{
    context, AdapterError, CompletionStatus, EngineConfig, Propagation, SynchronizationPolicy,
    TransactionDefinition, TxError,
};
use spindle_testkit::prelude::*;

#[test]
fn commit_dispatches_full_callback_sequence() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    context::register_synchronization(recorder.callback("a")).unwrap();
    context::register_synchronization(recorder.callback("b")).unwrap();

    manager.commit(&mut status).unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            ("a".to_string(), SyncEvent::BeforeCommit(false)),
            ("b".to_string(), SyncEvent::BeforeCommit(false)),
            ("a".to_string(), SyncEvent::BeforeCompletion),
            ("b".to_string(), SyncEvent::BeforeCompletion),
            ("a".to_string(), SyncEvent::AfterCommit),
            ("b".to_string(), SyncEvent::AfterCommit),
            ("a".to_string(), SyncEvent::AfterCompletion(CompletionStatus::Committed)),
            ("b".to_string(), SyncEvent::AfterCompletion(CompletionStatus::Committed)),
        ]
    );
}

#[test]
fn rollback_dispatches_only_completion_callbacks() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    context::register_synchronization(recorder.callback("a")).unwrap();

    manager.rollback(&mut status).unwrap();

    assert_eq!(
        recorder.kinds(),
        vec![
            SyncEvent::BeforeCompletion,
            SyncEvent::AfterCompletion(CompletionStatus::RolledBack),
        ]
    );
}

#[test]
fn after_completion_fires_exactly_once_per_callback() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    context::register_synchronization(recorder.callback("a")).unwrap();
    manager.commit(&mut status).unwrap();

    let completions = recorder
        .kinds()
        .into_iter()
        .filter(|event| matches!(event, SyncEvent::AfterCompletion(_)))
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn before_commit_read_only_flag_matches_scope() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager
        .begin(&TransactionDefinition::new().read_only(true))
        .unwrap();
    context::register_synchronization(recorder.callback("a")).unwrap();
    manager.commit(&mut status).unwrap();

    assert_eq!(recorder.kinds()[0], SyncEvent::BeforeCommit(true));
}

#[test]
fn before_commit_failure_aborts_commit() {
    let (manager, adapter) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    let callback = recorder.callback("a");
    callback.fail_before_commit();
    context::register_synchronization(callback).unwrap();

    let result = manager.commit(&mut status);
    assert!(matches!(result, Err(TxError::IllegalState { .. })));

    // The backend saw a rollback, never a commit.
    assert_eq!(
        adapter.calls(),
        vec![
            AdapterCall::Acquire,
            AdapterCall::Begin,
            AdapterCall::Rollback,
            AdapterCall::Cleanup,
        ]
    );
    assert_eq!(
        recorder.kinds(),
        vec![
            SyncEvent::BeforeCommit(false),
            SyncEvent::BeforeCompletion,
            SyncEvent::AfterCompletion(CompletionStatus::RolledBack),
        ]
    );
}

#[test]
fn before_completion_failure_aborts_commit() {
    let (manager, adapter) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    let callback = recorder.callback("a");
    callback.fail_before_completion();
    context::register_synchronization(callback).unwrap();

    let result = manager.commit(&mut status);
    assert!(matches!(result, Err(TxError::IllegalState { .. })));
    assert!(adapter.calls().contains(&AdapterCall::Rollback));
    assert!(!adapter.calls().contains(&AdapterCall::Commit));

    // before_completion is re-attempted while unwinding, then the outcome is
    // reported as a rollback.
    assert_eq!(
        recorder.kinds(),
        vec![
            SyncEvent::BeforeCommit(false),
            SyncEvent::BeforeCompletion,
            SyncEvent::BeforeCompletion,
            SyncEvent::AfterCompletion(CompletionStatus::RolledBack),
        ]
    );
}

#[test]
fn after_commit_failure_propagates_after_completion_runs() {
    let (manager, adapter) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    let callback = recorder.callback("a");
    callback.fail_after_commit();
    context::register_synchronization(callback).unwrap();

    let result = manager.commit(&mut status);
    assert!(result.is_err());

    // The transaction is committed regardless, and the outcome callback ran.
    assert!(adapter.calls().contains(&AdapterCall::Commit));
    assert_eq!(
        recorder.kinds(),
        vec![
            SyncEvent::BeforeCommit(false),
            SyncEvent::BeforeCompletion,
            SyncEvent::AfterCommit,
            SyncEvent::AfterCompletion(CompletionStatus::Committed),
        ]
    );
}

#[test]
fn after_completion_failure_is_swallowed() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    let callback = recorder.callback("a");
    callback.fail_after_completion();
    context::register_synchronization(callback).unwrap();

    manager.commit(&mut status).unwrap();
    assert_eq!(
        recorder.kinds().last(),
        Some(&SyncEvent::AfterCompletion(CompletionStatus::Committed))
    );
}

#[test]
fn commit_failure_reports_unknown_outcome() {
    let (manager, adapter) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    context::register_synchronization(recorder.callback("a")).unwrap();
    adapter.fail_next_commit();

    let result = manager.commit(&mut status);
    assert!(matches!(result, Err(TxError::Adapter(AdapterError::Commit { .. }))));
    assert_eq!(
        recorder.kinds().last(),
        Some(&SyncEvent::AfterCompletion(CompletionStatus::Unknown))
    );
}

#[test]
fn requires_new_suspends_and_resumes_outer_callbacks() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut outer = manager.begin(&definition(Propagation::Required)).unwrap();
    context::register_synchronization(recorder.callback("outer")).unwrap();

    let mut inner = manager.begin(&definition(Propagation::RequiresNew)).unwrap();
    assert_eq!(recorder.kinds(), vec![SyncEvent::Suspend]);

    manager.commit(&mut inner).unwrap();
    assert_eq!(recorder.kinds(), vec![SyncEvent::Suspend, SyncEvent::Resume]);

    manager.commit(&mut outer).unwrap();
    assert_eq!(
        recorder.kinds(),
        vec![
            SyncEvent::Suspend,
            SyncEvent::Resume,
            SyncEvent::BeforeCommit(false),
            SyncEvent::BeforeCompletion,
            SyncEvent::AfterCommit,
            SyncEvent::AfterCompletion(CompletionStatus::Committed),
        ]
    );
}

#[test]
fn empty_scope_callbacks_are_parked_by_new_transaction() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    // An empty SUPPORTS scope still activates synchronization.
    let mut outer = manager.begin(&definition(Propagation::Supports)).unwrap();
    context::register_synchronization(recorder.callback("outer")).unwrap();

    // Starting a real transaction parks those callbacks even though there is
    // no outer backend transaction to suspend.
    let mut inner = manager.begin(&definition(Propagation::Required)).unwrap();
    assert_eq!(recorder.kinds(), vec![SyncEvent::Suspend]);

    manager.commit(&mut inner).unwrap();
    assert_eq!(recorder.kinds(), vec![SyncEvent::Suspend, SyncEvent::Resume]);

    manager.commit(&mut outer).unwrap();
}

#[test]
fn policy_never_deactivates_synchronization() {
    let (manager, _) = recording_manager_with(
        EngineConfig::new().synchronization(SynchronizationPolicy::Never),
    )
    .unwrap();

    let mut status = manager.begin(&definition(Propagation::Required)).unwrap();
    assert!(!status.is_new_synchronization());
    assert!(!context::is_synchronization_active());

    manager.commit(&mut status).unwrap();
}

#[test]
fn policy_on_actual_transaction_skips_empty_scopes() {
    let (manager, _) = recording_manager_with(
        EngineConfig::new().synchronization(SynchronizationPolicy::OnActualTransaction),
    )
    .unwrap();

    let mut empty = manager.begin(&definition(Propagation::Supports)).unwrap();
    assert!(!context::is_synchronization_active());
    manager.commit(&mut empty).unwrap();

    let mut real = manager.begin(&definition(Propagation::Required)).unwrap();
    assert!(context::is_synchronization_active());
    manager.commit(&mut real).unwrap();
}

#[test]
fn ambient_scalars_track_the_current_scope() {
    let (manager, _) = recording_manager();

    let mut status = manager
        .begin(
            &TransactionDefinition::new()
                .isolation(spindle_core::Isolation::Serializable)
                .read_only(true)
                .name("nightly-batch"),
        )
        .unwrap();

    assert!(context::is_actual_transaction_active());
    assert!(context::is_current_transaction_read_only());
    assert_eq!(
        context::current_isolation(),
        Some(spindle_core::Isolation::Serializable)
    );
    assert_eq!(
        context::current_transaction_name().as_deref(),
        Some("nightly-batch")
    );

    manager.commit(&mut status).unwrap();

    assert!(!context::is_actual_transaction_active());
    assert!(context::current_transaction_name().is_none());
}

#[test]
fn participating_scope_reuses_outer_synchronization() {
    let (manager, _) = recording_manager();
    let recorder = SyncRecorder::new();

    let mut outer = manager.begin(&definition(Propagation::Required)).unwrap();
    let mut inner = manager.begin(&definition(Propagation::Required)).unwrap();
    assert!(!inner.is_new_synchronization());

    // A callback registered inside the inner scope fires at the outer
    // boundary, not the inner one.
    context::register_synchronization(recorder.callback("a")).unwrap();
    manager.commit(&mut inner).unwrap();
    assert!(recorder.kinds().is_empty());

    manager.commit(&mut outer).unwrap();
    assert_eq!(
        recorder.kinds().last(),
        Some(&SyncEvent::AfterCompletion(CompletionStatus::Committed))
    );
}
