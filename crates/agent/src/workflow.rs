//! Work-order flow: status changes with their timer and tracking side effects.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use validator::Validate;

use domain::models::{
    AvailabilityResponse, CompleteRequest, CompleteResponse, InstallationId, InstallationStatus,
    PaymentConfirmRequest, PaymentConfirmResponse, PaymentMethod, StatusUpdateResponse,
    TechnicianId, TechnicianProfile,
};
use domain::services::{plan_route, RouteStop};

use crate::backend::Backend;
use crate::error::AgentError;
use crate::timer::InstallationTimer;
use crate::tracking::LocationTrackingService;

/// Technician actions on their installations.
///
/// - `en_camino` tags the tracking session with the installation.
/// - `en_progreso` starts the installation timer once the status is saved.
/// - `completada` stops a running timer before the status is saved; if the
///   stop fails the installation is not completed.
pub struct WorkOrderFlow {
    technician_id: TechnicianId,
    backend: Arc<dyn Backend>,
    timer: Arc<InstallationTimer>,
    tracker: Option<LocationTrackingService>,
}

impl WorkOrderFlow {
    pub fn new(
        technician_id: TechnicianId,
        backend: Arc<dyn Backend>,
        timer: Arc<InstallationTimer>,
        tracker: Option<LocationTrackingService>,
    ) -> Self {
        Self {
            technician_id,
            backend,
            timer,
            tracker,
        }
    }

    pub fn timer(&self) -> &Arc<InstallationTimer> {
        &self.timer
    }

    /// Today's (or `date`'s) installations in visiting order.
    pub async fn agenda(&self, date: Option<NaiveDate>) -> Result<Vec<RouteStop>, AgentError> {
        let items = self.backend.my_installations(self.technician_id, date).await?;
        Ok(plan_route(&items))
    }

    pub async fn update_status(
        &self,
        installation_id: InstallationId,
        status: InstallationStatus,
    ) -> Result<StatusUpdateResponse, AgentError> {
        if !status.is_technician_target() {
            return Err(AgentError::Validation(format!(
                "Technicians cannot set status '{}'",
                status
            )));
        }

        if status == InstallationStatus::Completed {
            self.stop_timer_if_running(installation_id).await?;
        }

        let response = self
            .backend
            .update_status(self.technician_id, installation_id, status)
            .await?;
        info!(
            technician_id = self.technician_id,
            installation_id,
            status = %status,
            "Installation status updated"
        );

        match status {
            InstallationStatus::OnTheWay => self.tag_tracking(Some(installation_id)),
            InstallationStatus::InProgress => {
                // The status is already saved; a timer failure is surfaced in the logs only
                if let Err(e) = self.timer.start(installation_id).await {
                    warn!(installation_id, error = %e, "Could not start installation timer");
                }
            }
            InstallationStatus::Completed => self.tag_tracking(None),
            _ => {}
        }

        Ok(response)
    }

    /// Complete an installation with optional notes and photo proof.
    pub async fn complete(
        &self,
        installation_id: InstallationId,
        request: CompleteRequest,
    ) -> Result<CompleteResponse, AgentError> {
        self.stop_timer_if_running(installation_id).await?;

        let response = self
            .backend
            .complete_installation(self.technician_id, installation_id, &request)
            .await?;
        self.tag_tracking(None);

        info!(
            technician_id = self.technician_id,
            installation_id, "Installation completed"
        );
        Ok(response)
    }

    pub async fn confirm_payment(
        &self,
        installation_id: InstallationId,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<PaymentConfirmResponse, AgentError> {
        let request = PaymentConfirmRequest { amount, method };
        request.validate()?;

        let response = self
            .backend
            .confirm_payment(self.technician_id, installation_id, &request)
            .await?;
        info!(
            installation_id,
            amount,
            payment_status = ?response.payment_status,
            "Payment confirmed"
        );
        Ok(response)
    }

    pub async fn set_availability(&self, is_available: bool) -> Result<AvailabilityResponse, AgentError> {
        self.backend
            .update_availability(self.technician_id, is_available)
            .await
    }

    pub async fn profile(&self) -> Result<TechnicianProfile, AgentError> {
        self.backend.profile(self.technician_id).await
    }

    async fn stop_timer_if_running(&self, installation_id: InstallationId) -> Result<(), AgentError> {
        let state = self.timer.state();
        if state.is_running() && state.installation_id == Some(installation_id) {
            self.timer.stop(installation_id).await?;
        }
        Ok(())
    }

    fn tag_tracking(&self, installation_id: Option<InstallationId>) {
        if let Some(tracker) = &self.tracker {
            tracker.set_current_installation(installation_id);
        }
    }
}
