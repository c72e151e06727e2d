use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use validator::Validate;

use domain::models::{
    InstallationId, LocationReport, LocationSample, LocationUpdate, PositionError, TechnicianId,
    TrackingStatus,
};
use shared::validation::validate_captured_at;

use super::subscribers::{invoke, LocationCallback, SubscriberRegistry, Subscription};
use crate::backend::Backend;
use crate::config::TrackingConfig;
use crate::error::AgentError;
use crate::jobs::{JobScheduler, LocationReportJob, TaskGuard};
use crate::positioning::{BatteryProbe, PositionOptions, PositionProvider, PositionResult};
use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Starting,
    Tracking,
}

#[derive(Default)]
struct Session {
    phase: Phase,
    /// Bumped on every stop so late results from an older session are dropped.
    generation: u64,
    technician_id: Option<TechnicianId>,
    installation_id: Option<InstallationId>,
    last_sample: Option<LocationSample>,
    watch_task: Option<JoinHandle<()>>,
    scheduler: Option<JobScheduler>,
}

struct Inner {
    provider: Arc<dyn PositionProvider>,
    backend: Arc<dyn Backend>,
    battery: Option<Arc<dyn BatteryProbe>>,
    config: TrackingConfig,
    subscribers: Arc<SubscriberRegistry>,
    session: Mutex<Session>,
    /// Held while delivering a position so a replay to a new listener
    /// never interleaves with a newer fix.
    delivery: Mutex<()>,
    /// Serializes `start_tracking` so only one fix request is in flight.
    start_lock: tokio::sync::Mutex<()>,
    live_tasks: Arc<AtomicUsize>,
}

/// Tracks the technician's position and reports it to the backend.
///
/// Cheap to clone; all clones share one session. Background work (the
/// position watch and the periodic report job) lives only between a
/// successful [`start_tracking`](Self::start_tracking) and
/// [`stop_tracking`](Self::stop_tracking).
#[derive(Clone)]
pub struct LocationTrackingService {
    inner: Arc<Inner>,
}

impl LocationTrackingService {
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        backend: Arc<dyn Backend>,
        battery: Option<Arc<dyn BatteryProbe>>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                backend,
                battery,
                config,
                subscribers: Arc::new(SubscriberRegistry::default()),
                session: Mutex::new(Session::default()),
                delivery: Mutex::new(()),
                start_lock: tokio::sync::Mutex::new(()),
                live_tasks: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Begin a tracking session for `technician_id`.
    ///
    /// Returns `true` once tracking is active (immediately if it already
    /// was). Returns `false` when positioning is unsupported, the initial
    /// fix fails, or the session was stopped while the fix was pending;
    /// subscribers receive the classified error in the first two cases.
    pub async fn start_tracking(&self, technician_id: TechnicianId) -> bool {
        let _starting = self.inner.start_lock.lock().await;

        let generation = {
            let mut session = lock(&self.inner.session);
            if session.phase == Phase::Tracking {
                debug!(technician_id, "Tracking already active");
                return true;
            }
            session.phase = Phase::Starting;
            session.technician_id = Some(technician_id);
            session.generation
        };

        if !self.inner.provider.is_supported() {
            return self.abandon_start(generation, PositionError::Unsupported);
        }

        let options = PositionOptions::initial_fix(self.inner.config.initial_fix_timeout());
        let fix = tokio::time::timeout(
            options.timeout,
            self.inner.provider.current_position(options),
        )
        .await
        .unwrap_or(Err(PositionError::Timeout));

        let sample = match fix {
            Ok(sample) => sample,
            Err(err) => return self.abandon_start(generation, err),
        };

        // Listeners see the first fix before the watch or the report job run
        {
            let _delivery = lock(&self.inner.delivery);
            {
                let mut session = lock(&self.inner.session);
                if session.generation != generation || session.phase != Phase::Starting {
                    debug!(technician_id, "Tracking stopped before the first fix arrived");
                    return false;
                }
                session.last_sample = Some(sample.clone());
                session.phase = Phase::Tracking;
            }
            self.inner
                .subscribers
                .notify(&LocationUpdate::Position(sample));
        }

        {
            let mut session = lock(&self.inner.session);
            if session.generation != generation {
                debug!(technician_id, "Tracking stopped while the first fix was delivered");
                return false;
            }
            session.watch_task = Some(self.spawn_watch(generation));

            let mut scheduler = JobScheduler::with_task_counter(Arc::clone(&self.inner.live_tasks));
            scheduler.register(LocationReportJob::new(
                self.downgrade(),
                self.inner.config.report_interval_secs,
            ));
            scheduler.start();
            session.scheduler = Some(scheduler);
        }

        info!(technician_id, "Location tracking started");
        true
    }

    /// End the session. Safe to call when not tracking.
    ///
    /// Clears the technician, installation tag and last sample. A report
    /// already being sent is allowed to finish; nothing is sent after it.
    pub fn stop_tracking(&self) {
        if let Some(scheduler) = self.teardown() {
            scheduler.shutdown();
        }
    }

    /// Stop tracking and wait up to `timeout` for the report job to wind down.
    pub async fn shutdown(&self, timeout: Duration) {
        if let Some(scheduler) = self.teardown() {
            scheduler.shutdown();
            scheduler.wait_for_shutdown(timeout).await;
        }
    }

    fn teardown(&self) -> Option<JobScheduler> {
        let (watch_task, scheduler, technician_id) = {
            let mut session = lock(&self.inner.session);
            let generation = session.generation.wrapping_add(1);
            let previous = std::mem::take(&mut *session);
            session.generation = generation;

            if previous.phase == Phase::Idle {
                return None;
            }
            (previous.watch_task, previous.scheduler, previous.technician_id)
        };

        if let Some(task) = watch_task {
            task.abort();
        }
        info!(technician_id = ?technician_id, "Location tracking stopped");
        scheduler
    }

    /// Tag subsequent reports with the installation being worked on.
    ///
    /// When a sample is already known a report is sent right away so the
    /// backend sees the change without waiting for the next tick.
    pub fn set_current_installation(&self, installation_id: Option<InstallationId>) {
        let report_now = {
            let mut session = lock(&self.inner.session);
            session.installation_id = installation_id;
            session.phase == Phase::Tracking && session.last_sample.is_some()
        };

        if !report_now {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let tracker = self.clone();
                let guard = TaskGuard::enter(&self.inner.live_tasks);
                handle.spawn(async move {
                    let _guard = guard;
                    tracker.send_now().await;
                });
            }
            Err(_) => debug!("No async runtime; installation change reported on next tick"),
        }
    }

    pub fn current_installation(&self) -> Option<InstallationId> {
        lock(&self.inner.session).installation_id
    }

    pub fn technician_id(&self) -> Option<TechnicianId> {
        lock(&self.inner.session).technician_id
    }

    /// Listen for fixes and positioning errors.
    ///
    /// If a sample is already known the callback receives it immediately.
    /// Callbacks must not subscribe further listeners from inside a callback.
    pub fn on_location_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LocationUpdate) + Send + Sync + 'static,
    {
        let callback: LocationCallback = Arc::new(callback);
        let _delivery = lock(&self.inner.delivery);
        let subscription = self.inner.subscribers.subscribe(Arc::clone(&callback));

        let known = lock(&self.inner.session).last_sample.clone();
        if let Some(sample) = known {
            invoke(
                subscription.id(),
                &callback,
                &LocationUpdate::Position(sample),
            );
        }
        subscription
    }

    pub fn get_status(&self) -> TrackingStatus {
        let session = lock(&self.inner.session);
        TrackingStatus {
            is_tracking: session.phase == Phase::Tracking,
            last_location: session.last_sample.clone(),
        }
    }

    /// Report the last known position right away. Failures are logged.
    pub async fn send_now(&self) {
        if let Err(e) = self.inner.send_report().await {
            warn!(error = %e, "Failed to send location");
        }
    }

    /// Background tasks currently alive: the position watch, the report
    /// job and any out-of-band report still in flight.
    pub fn live_tasks(&self) -> usize {
        self.inner.live_tasks.load(Ordering::SeqCst)
    }

    pub(crate) fn downgrade(&self) -> WeakTracker {
        WeakTracker(Arc::downgrade(&self.inner))
    }

    fn abandon_start(&self, generation: u64, err: PositionError) -> bool {
        {
            let mut session = lock(&self.inner.session);
            if session.generation == generation {
                session.phase = Phase::Idle;
                session.technician_id = None;
            }
        }

        warn!(error = %err, terminal = err.is_terminal(), "Could not start location tracking");
        let _delivery = lock(&self.inner.delivery);
        self.inner.subscribers.notify(&LocationUpdate::Error(err));
        false
    }

    fn spawn_watch(&self, generation: u64) -> JoinHandle<()> {
        let config = &self.inner.config;
        let options = PositionOptions::watch(config.watch_timeout(), config.watch_maximum_age());
        let mut watch = self.inner.provider.watch_position(options);
        let weak = Arc::downgrade(&self.inner);
        let guard = TaskGuard::enter(&self.inner.live_tasks);

        tokio::spawn(async move {
            let _guard = guard;
            while let Some(result) = watch.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.on_watch_result(generation, result);
            }
            debug!("Position watch ended");
        })
    }
}

impl Inner {
    fn on_watch_result(&self, generation: u64, result: PositionResult) {
        let _delivery = lock(&self.delivery);
        let update = {
            let mut session = lock(&self.session);
            if session.generation != generation || session.phase != Phase::Tracking {
                return;
            }
            match result {
                Ok(sample) => {
                    session.last_sample = Some(sample.clone());
                    LocationUpdate::Position(sample)
                }
                Err(err) => {
                    warn!(error = %err, "Position watch error");
                    LocationUpdate::Error(err)
                }
            }
        };

        self.subscribers.notify(&update);
    }

    /// Sends the last sample if tracking. Returns whether a report went out.
    async fn send_report(&self) -> Result<bool, AgentError> {
        let snapshot = {
            let session = lock(&self.session);
            match (session.phase, session.technician_id, &session.last_sample) {
                (Phase::Tracking, Some(technician_id), Some(sample)) => {
                    Some((technician_id, sample.clone(), session.installation_id))
                }
                _ => None,
            }
        };

        let Some((technician_id, sample, installation_id)) = snapshot else {
            debug!("No position to report");
            return Ok(false);
        };

        let battery_level = self.battery_level().await;
        let report =
            LocationReport::from_sample(technician_id, &sample, battery_level, installation_id);
        report.validate()?;
        validate_captured_at(report.captured_at, Utc::now()).map_err(|e| {
            AgentError::Validation(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })?;

        self.backend.submit_location(&report).await?;
        debug!(
            technician_id,
            installation_id = ?installation_id,
            battery_level = ?battery_level,
            "Location sent"
        );
        Ok(true)
    }

    async fn battery_level(&self) -> Option<i32> {
        let probe = self.battery.as_ref()?;
        match probe.battery_level().await {
            Ok(level) if (0..=100).contains(&level) => Some(level),
            Ok(level) => {
                debug!(level, "Battery level out of range; omitted");
                None
            }
            Err(e) => {
                debug!(error = %e, "Battery level unavailable");
                None
            }
        }
    }
}

/// Non-owning handle used by background jobs so they never keep a
/// dropped service alive.
#[derive(Clone)]
pub(crate) struct WeakTracker(Weak<Inner>);

impl WeakTracker {
    pub(crate) async fn report(&self) -> Result<bool, AgentError> {
        match self.0.upgrade() {
            Some(inner) => inner.send_report().await,
            None => Ok(false),
        }
    }
}
