//! Soft and milestone dependency behaviour

use super::adapters::{BringDownOutcome, RecordingListener};
use super::test_support::*;
use super::ServiceSet;
use schema::{ServiceState, TargetState};
use std::rc::Rc;

// Stopping a waits-for dependency leaves the dependent running.
#[test]
fn test_waits_for_dependent_survives_dependency_stop() {
    let mut set = ServiceSet::new();

    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", REG)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-2", WAITS)]);

    set.start_service(s3);
    set.stop_service(s1);

    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(set.active_count(), 1);
}

// Once a milestone dependency has started, the link degrades to soft:
// stopping the dependency does not stop the dependent.
#[test]
fn test_milestone_degrades_after_start() {
    let mut set = ServiceSet::new();

    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", MS)]);

    set.start_service(s2);

    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s1), ServiceState::Started);

    set.stop_service(s1);

    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(set.active_count(), 1);
}

// A milestone dependency failing before it starts fails the dependent.
#[test]
fn test_milestone_failure_before_start_fails_dependent() {
    let mut set = ServiceSet::new();

    let (s1, _h1) = add_mock(&mut set, "svc-1", &[]);
    let (s2, _h2) = add_mock(&mut set, "svc-2", &[("svc-1", MS)]);

    set.start_service(s2);

    assert_eq!(state(&set, s1), ServiceState::Starting);
    assert_eq!(state(&set, s2), ServiceState::Starting);

    set.failed_to_start(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert!(set.service(s2).start_failed());
    assert_eq!(set.active_count(), 0);
}

// A pending milestone behaves as a hard dependency: cancelling its start
// brings the dependent down too.
#[test]
fn test_pending_milestone_stop_cancels_dependent() {
    let mut set = ServiceSet::new();

    let (s1, h1) = add_mock(&mut set, "svc-1", &[]);
    let (s2, _h2) = add_mock(&mut set, "svc-2", &[("svc-1", MS)]);
    h1.interruptible_start.set(true);

    set.start_service(s2);

    assert_eq!(state(&set, s1), ServiceState::Starting);
    assert_eq!(state(&set, s2), ServiceState::Starting);

    set.stop(s1, true);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(set.active_count(), 0);
}

// A soft dependent re-acquires its hold when the dependency comes back:
// a later deactivation without bring-down leaves the dependency running.
#[test]
fn test_soft_dependent_reattaches_on_restart() {
    let mut set = ServiceSet::new();

    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", WAITS)]);

    set.start_service(s2);
    set.stop_service(s1);

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Started);

    set.start_service(s1);

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(set.service(s1).required_by(), 2);

    // Deactivate without bring-down: the reattached hold from s2 keeps it.
    set.stop(s1, false);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(set.active_count(), 2);
}

// Already-started soft dependencies are attached when a new dependent
// starts; the dependency survives until the last soft hold is gone.
#[test]
fn test_shared_soft_holds_release_one_by_one() {
    let mut set = ServiceSet::new();

    let s1 = add_internal(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", WAITS)]);
    let s3 = add_internal(&mut set, "svc-3", &[("svc-1", WAITS)]);

    set.start_service(s2);
    set.start_service(s3);

    set.stop_service(s2);

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s3), ServiceState::Started);

    set.stop_service(s3);

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_eq!(set.active_count(), 0);
}

// An auto-restart service under a soft dependent keeps the soft hold
// across the bounce and comes back up.
#[test]
fn test_auto_restart_under_soft_dependent() {
    let mut set = ServiceSet::new();

    let (s1, h1) = add_mock(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", WAITS)]);
    set.set_auto_restart(s1, true);
    h1.bring_down_outcome.set(BringDownOutcome::InProgress);

    set.start_service(s2);

    assert_eq!(set.service(s1).target_state(), TargetState::Started);
    set.started(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);

    // Unexpected stop: the soft hold is retained, so the target remains
    // started and the service restarts once down.
    set.forced_stop(s1);
    set.process_queues();

    assert_eq!(set.service(s1).target_state(), TargetState::Started);

    set.stopped(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Starting);

    set.started(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(set.active_count(), 2);
}

// Without auto-restart the soft hold is broken and the service stays
// down, while the dependent keeps running.
#[test]
fn test_no_restart_without_auto_restart() {
    let mut set = ServiceSet::new();

    let (s1, h1) = add_mock(&mut set, "svc-1", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[("svc-1", WAITS)]);
    h1.bring_down_outcome.set(BringDownOutcome::InProgress);

    set.start_service(s2);

    set.started(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(set.active_count(), 2);

    set.forced_stop(s1);
    set.process_queues();

    assert_eq!(set.service(s1).target_state(), TargetState::Stopped);

    set.stopped(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(set.active_count(), 1);
}

// A failing waits-for dependency does not fail its dependent; the
// dependent proceeds to start without it.
#[test]
fn test_waits_for_failure_does_not_fail_dependent() {
    let mut set = ServiceSet::new();

    let (s1, _h1) = add_mock(&mut set, "svc-1", &[]);
    let (s2, _h2) = add_mock(&mut set, "svc-2", &[("svc-1", WAITS)]);

    let listener = Rc::new(RecordingListener::default());
    set.add_listener(s2, listener.clone());

    set.start_service(s2);
    assert_eq!(state(&set, s2), ServiceState::Starting);

    set.failed_to_start(s1);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Starting);
    assert!(!listener.failed_start.get());

    set.started(s2);
    set.process_queues();
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(set.active_count(), 1);
}

// Mixed dependency kinds all release cleanly and the active count returns
// to zero.
#[test]
fn test_mixed_dependency_kinds_release() {
    let mut set = ServiceSet::new();

    let s4 = add_internal(&mut set, "svc-4", &[]);
    let s3 = add_internal(&mut set, "svc-3", &[]);
    let s2 = add_internal(&mut set, "svc-2", &[]);
    let s1 = add_internal(
        &mut set,
        "svc-1",
        &[("svc-2", WAITS), ("svc-3", REG), ("svc-4", MS)],
    );

    set.start_service(s1);

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_eq!(state(&set, s4), ServiceState::Started);

    set.stop_service(s1);

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_eq!(state(&set, s4), ServiceState::Stopped);
    assert_eq!(set.active_count(), 0);
}
