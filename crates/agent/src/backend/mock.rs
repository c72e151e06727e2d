//! In-memory backend for development and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use domain::models::{
    AvailabilityResponse, CompleteRequest, CompleteResponse, InstallationId, InstallationStatus,
    LocationReport, PaymentConfirmRequest, PaymentConfirmResponse, PaymentStatus,
    StatusUpdateResponse, TechnicianId, TechnicianProfile, TimerStartedBy, TimerStatus, WorkItem,
};

use super::Backend;
use crate::error::AgentError;
use crate::sync::lock;

/// One recorded call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SubmitLocation(LocationReport),
    StartTimer(InstallationId),
    StopTimer(InstallationId),
    TimerStatus(InstallationId),
    MyInstallations(TechnicianId),
    UpdateStatus(InstallationId, InstallationStatus),
    ConfirmPayment(InstallationId, f64),
    Complete(InstallationId),
    UpdateAvailability(bool),
    Profile(TechnicianId),
}

/// Mock backend that keeps installations and timers in memory.
///
/// Simulates server-side timer bookkeeping (authoritative timestamps,
/// already-stopped checks) and records every call.
#[derive(Debug, Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    installations: Mutex<Vec<WorkItem>>,
    timers: Mutex<HashMap<InstallationId, TimerStatus>>,
    fail_locations: AtomicBool,
    fail_timers: AtomicBool,
    fail_status_updates: AtomicBool,
    location_delay: Mutex<Option<Duration>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the agenda returned by `my_installations`.
    pub fn with_installations(items: Vec<WorkItem>) -> Self {
        let backend = Self::default();
        *lock(&backend.installations) = items;
        backend
    }

    pub fn set_fail_locations(&self, fail: bool) {
        self.fail_locations.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_timers(&self, fail: bool) {
        self.fail_timers.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    /// Delay each location submission, to observe sends in flight.
    pub fn set_location_delay(&self, delay: Option<Duration>) {
        *lock(&self.location_delay) = delay;
    }

    /// Overwrite the server-side timer of an installation.
    pub fn seed_timer(&self, status: TimerStatus) {
        lock(&self.timers).insert(status.installation_id, status);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.calls).clone()
    }

    /// Location reports received so far.
    pub fn reports(&self) -> Vec<LocationReport> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                BackendCall::SubmitLocation(report) => Some(report.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        lock(&self.calls).push(call);
    }

    fn unavailable() -> AgentError {
        AgentError::Backend {
            status: 503,
            message: "Simulated failure".to_string(),
        }
    }

    fn find_item(&self, installation_id: InstallationId) -> Result<WorkItem, AgentError> {
        lock(&self.installations)
            .iter()
            .find(|item| item.id == installation_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound("Instalacion no encontrada".to_string()))
    }

    fn update_item(&self, installation_id: InstallationId, f: impl FnOnce(&mut WorkItem)) {
        if let Some(item) = lock(&self.installations)
            .iter_mut()
            .find(|item| item.id == installation_id)
        {
            f(item);
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn submit_location(&self, report: &LocationReport) -> Result<(), AgentError> {
        let delay = *lock(&self.location_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_locations.load(Ordering::SeqCst) {
            tracing::warn!(
                technician_id = report.technician_id,
                "Mock backend simulating location failure"
            );
            return Err(Self::unavailable());
        }

        self.record(BackendCall::SubmitLocation(report.clone()));
        Ok(())
    }

    async fn start_timer(
        &self,
        installation_id: InstallationId,
        started_by: TimerStartedBy,
    ) -> Result<TimerStatus, AgentError> {
        if self.fail_timers.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.record(BackendCall::StartTimer(installation_id));

        let mut timers = lock(&self.timers);
        let status = timers
            .entry(installation_id)
            .or_insert_with(|| TimerStatus {
                installation_id,
                timer_started_at: None,
                timer_ended_at: None,
                timer_started_by: None,
                installation_duration_minutes: None,
                is_running: false,
                elapsed_minutes: None,
            });

        // A running timer is returned as is
        if !status.is_running {
            status.timer_started_at = Some(Utc::now());
            status.timer_ended_at = None;
            status.timer_started_by = Some(started_by);
            status.installation_duration_minutes = None;
            status.is_running = true;
            status.elapsed_minutes = Some(0);
        }

        Ok(status.clone())
    }

    async fn stop_timer(&self, installation_id: InstallationId) -> Result<TimerStatus, AgentError> {
        if self.fail_timers.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.record(BackendCall::StopTimer(installation_id));

        let mut timers = lock(&self.timers);
        let status = timers
            .get_mut(&installation_id)
            .ok_or_else(|| AgentError::Validation("Timer has not been started".to_string()))?;
        let started_at = status
            .timer_started_at
            .ok_or_else(|| AgentError::Validation("Timer has not been started".to_string()))?;
        if status.timer_ended_at.is_some() {
            return Err(AgentError::Validation(
                "Timer has already been stopped".to_string(),
            ));
        }

        let ended_at = Utc::now().max(started_at);
        let minutes = (ended_at - started_at).num_minutes();
        status.timer_ended_at = Some(ended_at);
        status.installation_duration_minutes = Some(minutes);
        status.is_running = false;
        status.elapsed_minutes = Some(minutes);

        Ok(status.clone())
    }

    async fn timer_status(
        &self,
        installation_id: InstallationId,
    ) -> Result<TimerStatus, AgentError> {
        self.record(BackendCall::TimerStatus(installation_id));
        Ok(lock(&self.timers)
            .get(&installation_id)
            .cloned()
            .unwrap_or(TimerStatus {
                installation_id,
                timer_started_at: None,
                timer_ended_at: None,
                timer_started_by: None,
                installation_duration_minutes: None,
                is_running: false,
                elapsed_minutes: None,
            }))
    }

    async fn my_installations(
        &self,
        technician_id: TechnicianId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<WorkItem>, AgentError> {
        self.record(BackendCall::MyInstallations(technician_id));
        Ok(lock(&self.installations)
            .iter()
            .filter(|item| match date {
                Some(date) => item.scheduled_date == Some(date),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        _technician_id: TechnicianId,
        installation_id: InstallationId,
        status: InstallationStatus,
    ) -> Result<StatusUpdateResponse, AgentError> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.record(BackendCall::UpdateStatus(installation_id, status));
        self.update_item(installation_id, |item| item.status = status);

        Ok(StatusUpdateResponse {
            message: "Estado actualizado".to_string(),
            status,
        })
    }

    async fn confirm_payment(
        &self,
        _technician_id: TechnicianId,
        installation_id: InstallationId,
        request: &PaymentConfirmRequest,
    ) -> Result<PaymentConfirmResponse, AgentError> {
        self.record(BackendCall::ConfirmPayment(installation_id, request.amount));
        self.find_item(installation_id)?;

        self.update_item(installation_id, |item| {
            item.amount_paid += request.amount;
            item.payment_status = if item.amount_paid >= item.total_price {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Partial
            };
        });
        let item = self.find_item(installation_id)?;

        Ok(PaymentConfirmResponse {
            message: "Pago registrado".to_string(),
            amount_paid: item.amount_paid,
            total_price: item.total_price,
            payment_status: item.payment_status,
        })
    }

    async fn complete_installation(
        &self,
        _technician_id: TechnicianId,
        installation_id: InstallationId,
        _request: &CompleteRequest,
    ) -> Result<CompleteResponse, AgentError> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.record(BackendCall::Complete(installation_id));
        self.update_item(installation_id, |item| {
            item.status = InstallationStatus::Completed
        });

        Ok(CompleteResponse {
            message: "Instalacion completada".to_string(),
            id: installation_id,
        })
    }

    async fn update_availability(
        &self,
        _technician_id: TechnicianId,
        is_available: bool,
    ) -> Result<AvailabilityResponse, AgentError> {
        self.record(BackendCall::UpdateAvailability(is_available));
        Ok(AvailabilityResponse {
            message: "Disponibilidad actualizada".to_string(),
            is_available,
        })
    }

    async fn profile(&self, technician_id: TechnicianId) -> Result<TechnicianProfile, AgentError> {
        self.record(BackendCall::Profile(technician_id));
        Ok(TechnicianProfile {
            id: technician_id,
            full_name: "Tecnico de Prueba".to_string(),
            phone: "3000000000".to_string(),
            email: None,
            zone: None,
            is_available: true,
            is_active: true,
        })
    }
}
