//! Integration tests for the work-order flow: status changes, the
//! installation timer and the day's route.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settle, work_item, TrackingHarness, TECHNICIAN_ID};
use domain::models::{CompleteRequest, InstallationStatus, PaymentMethod, PaymentStatus};
use fieldtech_agent::backend::{BackendCall, MockBackend};
use fieldtech_agent::error::AgentError;
use fieldtech_agent::navigation::build_navigation_url;
use fieldtech_agent::timer::InstallationTimer;
use fieldtech_agent::workflow::WorkOrderFlow;
use tokio_test::{assert_err, assert_ok};

fn flow_with(backend: &Arc<MockBackend>) -> WorkOrderFlow {
    let timer = Arc::new(InstallationTimer::new(backend.clone()));
    WorkOrderFlow::new(TECHNICIAN_ID, backend.clone(), timer, None)
}

// ============================================================================
// Installation timer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_ticks_while_running_and_freezes_on_stop() {
    let backend = Arc::new(MockBackend::new());
    let timer = InstallationTimer::new(backend.clone());
    let mut elapsed = timer.subscribe_elapsed();

    let started = assert_ok!(timer.start(11).await);
    assert_eq!(timer.state().started_at, Some(started.started_at));
    assert!(timer.is_running());

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert!((5..=6).contains(&timer.elapsed_seconds()));
    assert!(elapsed.has_changed().unwrap());
    let _ = *elapsed.borrow_and_update();

    let stopped = assert_ok!(timer.stop(11).await);
    assert!(stopped.ended_at >= stopped.started_at);
    assert!(!timer.is_running());
    assert!(timer.state().is_stopped());

    let frozen = timer.elapsed_seconds();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(timer.elapsed_seconds(), frozen);
}

#[tokio::test(start_paused = true)]
async fn test_failed_timer_start_leaves_timer_idle() {
    let backend = Arc::new(MockBackend::new());
    backend.set_fail_timers(true);
    let timer = InstallationTimer::new(backend.clone());

    let err = assert_err!(timer.start(11).await);
    assert!(err.is_transient());
    assert!(!timer.is_running());
    assert_eq!(timer.state().installation_id, None);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(timer.elapsed_seconds(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stopping_unstarted_timer_is_rejected() {
    let backend = Arc::new(MockBackend::new());
    let timer = InstallationTimer::new(backend.clone());

    let err = assert_err!(timer.stop(11).await);
    assert!(matches!(err, AgentError::Validation(_)));
    assert!(!timer.is_running());
}

// ============================================================================
// Status flow
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_visit() {
    let h = TrackingHarness::new();
    h.start().await;
    settle().await;

    let timer = Arc::new(InstallationTimer::new(h.backend.clone()));
    let flow = WorkOrderFlow::new(
        TECHNICIAN_ID,
        h.backend.clone(),
        Arc::clone(&timer),
        Some(h.tracker.clone()),
    );

    // On the way: the next report carries the installation
    assert_ok!(flow.update_status(21, InstallationStatus::OnTheWay).await);
    settle().await;
    assert_eq!(h.tracker.current_installation(), Some(21));
    assert_eq!(h.backend.reports().last().unwrap().installation_id, Some(21));

    // In progress: the timer starts after the status is saved
    assert_ok!(flow.update_status(21, InstallationStatus::InProgress).await);
    assert!(timer.is_running());
    let mut elapsed = timer.subscribe_elapsed();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert!(elapsed.has_changed().unwrap());
    assert!(timer.elapsed_seconds() >= 3);

    // Completion stops the timer first, then completes
    let request = CompleteRequest {
        technician_notes: Some("Cerradura instalada y probada".to_string()),
        photo_proof_url: None,
    };
    assert_ok!(flow.complete(21, request).await);
    assert!(!timer.is_running());
    assert_eq!(h.tracker.current_installation(), None);

    let calls: Vec<BackendCall> = h
        .backend
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, BackendCall::SubmitLocation(_)))
        .collect();
    assert_eq!(
        calls,
        vec![
            BackendCall::UpdateStatus(21, InstallationStatus::OnTheWay),
            BackendCall::UpdateStatus(21, InstallationStatus::InProgress),
            BackendCall::StartTimer(21),
            BackendCall::StopTimer(21),
            BackendCall::Complete(21),
        ]
    );

    h.tracker.stop_tracking();
}

#[tokio::test(start_paused = true)]
async fn test_completed_status_stops_timer_first() {
    let backend = Arc::new(MockBackend::new());
    let flow = flow_with(&backend);

    assert_ok!(flow.update_status(5, InstallationStatus::InProgress).await);
    assert_ok!(flow.update_status(5, InstallationStatus::Completed).await);

    assert!(!flow.timer().is_running());
    let calls = backend.calls();
    assert_eq!(
        &calls[2..],
        &[
            BackendCall::StopTimer(5),
            BackendCall::UpdateStatus(5, InstallationStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_timer_stop_blocks_completion() {
    let backend = Arc::new(MockBackend::new());
    let flow = flow_with(&backend);
    assert_ok!(flow.update_status(5, InstallationStatus::InProgress).await);

    backend.set_fail_timers(true);
    assert_err!(flow.complete(5, CompleteRequest::default()).await);

    assert!(flow.timer().is_running());
    assert!(!backend.calls().contains(&BackendCall::Complete(5)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_update_does_not_start_timer() {
    let backend = Arc::new(MockBackend::new());
    backend.set_fail_status_updates(true);
    let flow = flow_with(&backend);

    assert_err!(flow.update_status(5, InstallationStatus::InProgress).await);
    assert!(!flow.timer().is_running());
    assert!(backend.calls().is_empty());
}

// ============================================================================
// Payments, availability, agenda
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_partial_then_full_payment() {
    let backend = Arc::new(MockBackend::with_installations(vec![work_item(
        3,
        Some("Bogota"),
        Some("09:00"),
        InstallationStatus::InProgress,
    )]));
    let flow = flow_with(&backend);

    let partial = assert_ok!(flow.confirm_payment(3, 200_000.0, PaymentMethod::Nequi).await);
    assert_eq!(partial.payment_status, PaymentStatus::Partial);

    let paid = assert_ok!(flow.confirm_payment(3, 250_000.0, PaymentMethod::Cash).await);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.amount_paid, paid.total_price);
}

#[tokio::test(start_paused = true)]
async fn test_payment_for_unknown_installation() {
    let backend = Arc::new(MockBackend::new());
    let flow = flow_with(&backend);

    let err = assert_err!(flow.confirm_payment(99, 10_000.0, PaymentMethod::Card).await);
    assert!(matches!(err, AgentError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_set_availability_and_profile() {
    let backend = Arc::new(MockBackend::new());
    let flow = flow_with(&backend);

    let response = assert_ok!(flow.set_availability(false).await);
    assert!(!response.is_available);
    let profile = assert_ok!(flow.profile().await);
    assert_eq!(profile.id, TECHNICIAN_ID);

    assert_eq!(
        backend.calls(),
        vec![
            BackendCall::UpdateAvailability(false),
            BackendCall::Profile(TECHNICIAN_ID),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_agenda_is_grouped_and_numbered() {
    let backend = Arc::new(MockBackend::with_installations(vec![
        work_item(1, Some("Cali"), Some("10:00"), InstallationStatus::Scheduled),
        work_item(2, Some("Bogota"), Some("14:00"), InstallationStatus::Scheduled),
        work_item(3, Some("bogota "), Some("08:30"), InstallationStatus::Pending),
        work_item(4, Some("Cali"), None, InstallationStatus::Completed),
        work_item(5, None, Some("07:00"), InstallationStatus::Scheduled),
    ]));
    let flow = flow_with(&backend);

    let stops = assert_ok!(flow.agenda(None).await);
    let order: Vec<(usize, i64)> = stops.iter().map(|s| (s.stop_number, s.item.id)).collect();
    assert_eq!(order, vec![(1, 3), (2, 2), (3, 1), (4, 5)]);

    let items: Vec<_> = stops.into_iter().map(|s| s.item).collect();
    let url = build_navigation_url(&items);
    assert!(url.contains("origin=Calle+3"));
    assert!(url.contains("destination=Calle+5"));
}
