//! Installation stopwatch mirrored from the backend timer.
//!
//! The backend's timestamps are authoritative: local state only changes
//! after the server confirms a start or stop, so every device and the
//! admin dashboard agree on the elapsed time. The once-per-second display
//! tick is presentation only.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use domain::models::{InstallationId, TimerStartedBy, TimerState};

use crate::backend::Backend;
use crate::error::AgentError;
use crate::sync::lock;

const DISPLAY_TICK: Duration = Duration::from_secs(1);

/// Confirmation of a started timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStarted {
    pub installation_id: InstallationId,
    pub started_at: DateTime<Utc>,
}

/// Confirmation of a stopped timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStopped {
    pub installation_id: InstallationId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

pub struct InstallationTimer {
    backend: Arc<dyn Backend>,
    state: Mutex<TimerState>,
    elapsed_tx: Arc<watch::Sender<i64>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    /// Serializes backend round-trips so start and stop cannot interleave.
    op_lock: tokio::sync::Mutex<()>,
}

impl InstallationTimer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (elapsed_tx, _) = watch::channel(0);
        Self {
            backend,
            state: Mutex::new(TimerState::idle()),
            elapsed_tx: Arc::new(elapsed_tx),
            ticker: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Start the timer for an installation.
    ///
    /// Starting the item that is already running returns its current start
    /// time without a backend call. Starting a different item while one is
    /// running is a conflict. On any failure the previous state is kept.
    pub async fn start(&self, installation_id: InstallationId) -> Result<TimerStarted, AgentError> {
        let _op = self.op_lock.lock().await;

        {
            let state = lock(&self.state);
            if let (true, Some(running), Some(started_at)) =
                (state.is_running(), state.installation_id, state.started_at)
            {
                if running == installation_id {
                    debug!(installation_id, "Timer already running");
                    return Ok(TimerStarted {
                        installation_id,
                        started_at,
                    });
                }
                return Err(AgentError::Conflict(format!(
                    "Timer already running for installation {}",
                    running
                )));
            }
        }

        let status = self
            .backend
            .start_timer(installation_id, TimerStartedBy::Technician)
            .await?;
        let next = TimerState::from_status(&status)?;
        let started_at = next.started_at.ok_or_else(|| {
            AgentError::InvalidResponse(format!(
                "timer start for installation {} returned no start time",
                installation_id
            ))
        })?;

        self.apply(next);
        info!(installation_id, %started_at, "Installation timer started");
        Ok(TimerStarted {
            installation_id,
            started_at,
        })
    }

    /// Stop the timer for an installation and freeze the display.
    ///
    /// If the backend rejects the stop the timer keeps running locally.
    pub async fn stop(&self, installation_id: InstallationId) -> Result<TimerStopped, AgentError> {
        let _op = self.op_lock.lock().await;

        let status = self.backend.stop_timer(installation_id).await?;
        let next = TimerState::from_status(&status)?;
        let (Some(started_at), Some(ended_at)) = (next.started_at, next.ended_at) else {
            return Err(AgentError::InvalidResponse(format!(
                "timer stop for installation {} returned an open range",
                installation_id
            )));
        };
        let duration_minutes = next
            .duration_minutes
            .unwrap_or_else(|| (ended_at - started_at).num_minutes());

        self.apply(next);
        info!(installation_id, duration_minutes, "Installation timer stopped");
        Ok(TimerStopped {
            installation_id,
            started_at,
            ended_at,
            duration_minutes,
        })
    }

    /// Re-read the backend timer and mirror it, e.g. after the admin
    /// dashboard started it.
    pub async fn refresh(&self, installation_id: InstallationId) -> Result<TimerState, AgentError> {
        let _op = self.op_lock.lock().await;

        let status = self.backend.timer_status(installation_id).await?;
        let next = TimerState::from_status(&status)?;
        if !self.apply(next.clone()) {
            debug!(installation_id, "Another installation's timer is running; not mirrored");
        }
        Ok(next)
    }

    pub fn state(&self) -> TimerState {
        lock(&self.state).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).is_running()
    }

    /// The value currently shown on the stopwatch.
    pub fn elapsed_seconds(&self) -> i64 {
        *self.elapsed_tx.borrow()
    }

    /// Stopwatch updates, once per second while running.
    pub fn subscribe_elapsed(&self) -> watch::Receiver<i64> {
        self.elapsed_tx.subscribe()
    }

    /// Mirror `next` unless a different installation's timer is running.
    fn apply(&self, next: TimerState) -> bool {
        let elapsed = {
            let mut state = lock(&self.state);
            if state.is_running() && state.installation_id != next.installation_id {
                return false;
            }
            let elapsed = next.elapsed_seconds(Utc::now());
            *state = next;
            if !state.is_running() {
                None
            } else {
                Some(elapsed)
            }
        };

        match elapsed {
            Some(base) => self.restart_ticker(base),
            None => {
                self.stop_ticker();
                let frozen = lock(&self.state).elapsed_seconds(Utc::now());
                self.elapsed_tx.send_replace(frozen);
            }
        }
        true
    }

    fn restart_ticker(&self, base_secs: i64) {
        self.elapsed_tx.send_replace(base_secs);

        let elapsed_tx = Arc::clone(&self.elapsed_tx);
        let anchor = Instant::now();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(DISPLAY_TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                interval.tick().await;
                elapsed_tx.send_replace(base_secs + anchor.elapsed().as_secs() as i64);
            }
        });

        if let Some(previous) = lock(&self.ticker).replace(handle) {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.abort();
        }
    }
}

impl Drop for InstallationTimer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
