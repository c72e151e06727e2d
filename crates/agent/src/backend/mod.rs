//! Backend collaborator.
//!
//! Everything the technician agent persists goes through this trait: location
//! pings, timer start/stop, status and payment updates. The HTTP client talks
//! to the real API; the mock records calls for tests and local runs.

mod http;
mod mock;

use async_trait::async_trait;
use chrono::NaiveDate;

use domain::models::{
    AvailabilityResponse, CompleteRequest, CompleteResponse, InstallationId, InstallationStatus,
    LocationReport, PaymentConfirmRequest, PaymentConfirmResponse, StatusUpdateResponse,
    TechnicianId, TechnicianProfile, TimerStartedBy, TimerStatus, WorkItem,
};

use crate::error::AgentError;

pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit one location ping.
    async fn submit_location(&self, report: &LocationReport) -> Result<(), AgentError>;

    /// Start the installation timer. Returns the server-side timer status.
    async fn start_timer(
        &self,
        installation_id: InstallationId,
        started_by: TimerStartedBy,
    ) -> Result<TimerStatus, AgentError>;

    /// Stop the installation timer. The response carries the computed duration.
    async fn stop_timer(&self, installation_id: InstallationId) -> Result<TimerStatus, AgentError>;

    async fn timer_status(&self, installation_id: InstallationId)
        -> Result<TimerStatus, AgentError>;

    /// Installations assigned to the technician for `date` (today when `None`).
    async fn my_installations(
        &self,
        technician_id: TechnicianId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<WorkItem>, AgentError>;

    async fn update_status(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        status: InstallationStatus,
    ) -> Result<StatusUpdateResponse, AgentError>;

    async fn confirm_payment(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        request: &PaymentConfirmRequest,
    ) -> Result<PaymentConfirmResponse, AgentError>;

    async fn complete_installation(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        request: &CompleteRequest,
    ) -> Result<CompleteResponse, AgentError>;

    async fn update_availability(
        &self,
        technician_id: TechnicianId,
        is_available: bool,
    ) -> Result<AvailabilityResponse, AgentError>;

    async fn profile(&self, technician_id: TechnicianId) -> Result<TechnicianProfile, AgentError>;
}
