//! Installation timer model.
//!
//! The backend owns the authoritative start and end timestamps; the device
//! only mirrors them so every screen shows the same elapsed time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, InstallationId};

/// Who started a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStartedBy {
    Admin,
    Technician,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerStartRequest {
    pub started_by: TimerStartedBy,
}

/// Timer status as returned by the start, stop and read endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub installation_id: InstallationId,
    #[serde(default)]
    pub timer_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timer_ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timer_started_by: Option<TimerStartedBy>,
    #[serde(default)]
    pub installation_duration_minutes: Option<i64>,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub elapsed_minutes: Option<i64>,
}

/// Local mirror of one work item's timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerState {
    pub installation_id: Option<InstallationId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

impl TimerState {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Builds local state from a backend status, rejecting inverted ranges.
    pub fn from_status(status: &TimerStatus) -> Result<Self, DomainError> {
        if let (Some(start), Some(end)) = (status.timer_started_at, status.timer_ended_at) {
            if end < start {
                return Err(DomainError::InvalidTimerRange {
                    installation_id: status.installation_id,
                });
            }
        }

        let duration_minutes = match (status.timer_started_at, status.timer_ended_at) {
            (Some(start), Some(end)) => Some(
                status
                    .installation_duration_minutes
                    .unwrap_or_else(|| (end - start).num_minutes()),
            ),
            _ => None,
        };

        Ok(Self {
            installation_id: Some(status.installation_id),
            started_at: status.timer_started_at,
            ended_at: status.timer_ended_at,
            duration_minutes,
        })
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    pub fn is_stopped(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_some()
    }

    /// Seconds elapsed at `now`. Frozen once stopped, zero before start.
    /// A device clock behind the server never yields a negative value.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            (Some(start), None) => (now - start).num_seconds().max(0),
            _ => 0,
        }
    }
}

/// Formats seconds as `HH:MM:SS` for the stopwatch display.
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    fn status(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> TimerStatus {
        TimerStatus {
            installation_id: 12,
            timer_started_at: start,
            timer_ended_at: end,
            timer_started_by: Some(TimerStartedBy::Technician),
            installation_duration_minutes: None,
            is_running: start.is_some() && end.is_none(),
            elapsed_minutes: None,
        }
    }

    #[test]
    fn test_idle_state() {
        let state = TimerState::idle();
        assert!(!state.is_running());
        assert!(!state.is_stopped());
        assert_eq!(state.elapsed_seconds(at(10, 0, 0)), 0);
    }

    #[test]
    fn test_running_state_elapsed() {
        let state = TimerState::from_status(&status(Some(at(9, 0, 0)), None)).unwrap();
        assert!(state.is_running());
        assert_eq!(state.elapsed_seconds(at(9, 1, 30)), 90);
        // Device clock behind the server
        assert_eq!(state.elapsed_seconds(at(8, 59, 0)), 0);
    }

    #[test]
    fn test_stopped_state_freezes_elapsed() {
        let state =
            TimerState::from_status(&status(Some(at(9, 0, 0)), Some(at(10, 15, 0)))).unwrap();
        assert!(state.is_stopped());
        assert_eq!(state.duration_minutes, Some(75));
        assert_eq!(state.elapsed_seconds(at(18, 0, 0)), 75 * 60);
    }

    #[test]
    fn test_server_duration_is_preferred() {
        let mut s = status(Some(at(9, 0, 0)), Some(at(10, 15, 0)));
        s.installation_duration_minutes = Some(76);
        let state = TimerState::from_status(&s).unwrap();
        assert_eq!(state.duration_minutes, Some(76));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = TimerState::from_status(&status(Some(at(10, 0, 0)), Some(at(9, 0, 0))));
        assert!(matches!(
            result,
            Err(DomainError::InvalidTimerRange { installation_id: 12 })
        ));
    }

    #[test]
    fn test_timer_status_deserializes_with_offset() {
        let json = r#"{
            "installation_id": 5,
            "timer_started_at": "2024-03-01T09:00:00-05:00",
            "timer_ended_at": null,
            "timer_started_by": "admin",
            "is_running": true,
            "elapsed_minutes": 3
        }"#;
        let status: TimerStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.timer_started_at, Some(at(14, 0, 0)));
        assert_eq!(status.timer_started_by, Some(TimerStartedBy::Admin));
        assert_eq!(status.installation_duration_minutes, None);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(3_725), "01:02:05");
        assert_eq!(format_elapsed(-4), "00:00:00");
    }
}
