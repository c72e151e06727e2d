//! Periodic location report job.

use crate::error::AgentError;
use crate::tracking::WeakTracker;

use super::scheduler::{Job, JobFrequency};

/// Sends the tracker's last known position on every tick.
///
/// Runs once as soon as tracking starts so the backend sees the technician
/// without waiting a full period.
pub struct LocationReportJob {
    tracker: WeakTracker,
    interval_secs: u64,
}

impl LocationReportJob {
    /// `interval_secs` is raised to at least one second.
    pub(crate) fn new(tracker: WeakTracker, interval_secs: u64) -> Self {
        Self {
            tracker,
            interval_secs: interval_secs.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Job for LocationReportJob {
    fn name(&self) -> &'static str {
        "location_report"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), AgentError> {
        self.tracker.report().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::MockBackend;
    use crate::config::TrackingConfig;
    use crate::positioning::ManualPositionProvider;
    use crate::tracking::LocationTrackingService;

    fn tracker() -> LocationTrackingService {
        LocationTrackingService::new(
            Arc::new(ManualPositionProvider::new()),
            Arc::new(MockBackend::new()),
            None,
            TrackingConfig::default(),
        )
    }

    #[test]
    fn test_zero_interval_is_raised_to_one_second() {
        let tracker = tracker();
        let job = LocationReportJob::new(tracker.downgrade(), 0);
        assert_eq!(job.frequency(), JobFrequency::Seconds(1));
        assert!(job.run_on_start());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_config_tracks_without_panicking() {
        let provider = Arc::new(ManualPositionProvider::new());
        let backend = Arc::new(MockBackend::new());
        provider.queue_fix(Ok(domain::models::LocationSample::new(4.65, -74.05)));
        let tracker = LocationTrackingService::new(
            provider.clone(),
            backend.clone(),
            None,
            TrackingConfig {
                report_interval_secs: 0,
                ..TrackingConfig::default()
            },
        );

        assert!(tracker.start_tracking(7).await);
        tokio::time::sleep(std::time::Duration::from_millis(2_500)).await;
        assert_eq!(backend.reports().len(), 3);
        tracker.stop_tracking();
    }
}
