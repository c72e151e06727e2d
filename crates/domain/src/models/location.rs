//! Location domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use super::{InstallationId, TechnicianId};

/// One GPS reading captured on the device.
///
/// Samples are immutable once captured; the tracking service replaces its
/// last known sample instead of mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Ground speed in m/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Direction of travel in degrees from true north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Altitude in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    /// Creates a sample with only coordinates, captured now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            speed: None,
            heading: None,
            altitude: None,
            captured_at: Utc::now(),
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_motion(mut self, speed: f64, heading: f64) -> Self {
        self.speed = Some(speed);
        self.heading = Some(heading);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// Payload submitted to the backend for one location ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LocationReport {
    pub technician_id: TechnicianId,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    pub accuracy: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Battery percentage, omitted when the device cannot report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "shared::validation::validate_battery_level"))]
    pub battery_level: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<InstallationId>,

    pub captured_at: DateTime<Utc>,
}

impl LocationReport {
    /// Packages a sample with the session context for submission.
    pub fn from_sample(
        technician_id: TechnicianId,
        sample: &LocationSample,
        battery_level: Option<i32>,
        installation_id: Option<InstallationId>,
    ) -> Self {
        Self {
            technician_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            speed: sample.speed,
            heading: sample.heading,
            altitude: sample.altitude,
            battery_level,
            installation_id,
            captured_at: sample.captured_at,
        }
    }
}

/// Snapshot of the tracking session as seen by the UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackingStatus {
    pub is_tracking: bool,
    pub last_location: Option<LocationSample>,
}

/// Classified failure of the device positioning capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Geolocation is not supported on this device")]
    Unsupported,

    #[error("Location permission denied. Enable location access to share your position")]
    PermissionDenied,

    #[error("Location information is unavailable")]
    PositionUnavailable,

    #[error("Timed out while getting location")]
    Timeout,

    #[error("Unknown error while getting location: {0}")]
    Unknown(String),
}

impl PositionError {
    /// Terminal errors end the session; the technician has to act before
    /// tracking can work at all. The others may clear on a later fix.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionError::Unsupported | PositionError::PermissionDenied)
    }
}

/// What subscribers receive: either a fresh sample or a classified error.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    Position(LocationSample),
    Error(PositionError),
}

impl LocationUpdate {
    pub fn sample(&self) -> Option<&LocationSample> {
        match self {
            LocationUpdate::Position(sample) => Some(sample),
            LocationUpdate::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PositionError> {
        match self {
            LocationUpdate::Position(_) => None,
            LocationUpdate::Error(err) => Some(err),
        }
    }
}
