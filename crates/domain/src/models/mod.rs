//! Domain models for the technician agent.

pub mod installation;
pub mod location;
pub mod technician;
pub mod timer;

use thiserror::Error;

/// Backend identifier of a technician.
pub type TechnicianId = i64;

/// Backend identifier of an installation (work item).
pub type InstallationId = i64;

pub use installation::{
    CompleteRequest, CompleteResponse, InstallationStatus, PaymentConfirmRequest,
    PaymentConfirmResponse, PaymentMethod, PaymentStatus, StatusUpdateRequest,
    StatusUpdateResponse, WorkItem,
};
pub use location::{LocationReport, LocationSample, LocationUpdate, PositionError, TrackingStatus};
pub use technician::{AvailabilityRequest, AvailabilityResponse, TechnicianProfile};
pub use timer::{format_elapsed, TimerStartRequest, TimerStartedBy, TimerState, TimerStatus};

/// Errors raised while interpreting backend data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Unknown installation status: {0}")]
    UnknownStatus(String),

    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("Timer for installation {installation_id} ends before it starts")]
    InvalidTimerRange { installation_id: InstallationId },
}
