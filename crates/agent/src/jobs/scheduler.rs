//! Job scheduler infrastructure for background tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Job frequency for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    /// Run every N seconds.
    Seconds(u64),
    /// Run every N minutes.
    Minutes(u64),
}

impl JobFrequency {
    /// Get the duration between job executions.
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
        }
    }
}

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    /// The frequency at which this job should run.
    fn frequency(&self) -> JobFrequency;

    /// Run once as soon as the scheduler starts instead of after the first period.
    fn run_on_start(&self) -> bool {
        false
    }

    async fn execute(&self) -> Result<(), AgentError>;
}

/// Counts a live background task; decrements when the task ends or is aborted.
pub(crate) struct TaskGuard(Arc<AtomicUsize>);

impl TaskGuard {
    pub(crate) fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Background job scheduler.
///
/// Shutdown is cooperative: a job that is mid-execution finishes its run,
/// then no further ticks happen.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    live_tasks: Arc<AtomicUsize>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::with_task_counter(Arc::new(AtomicUsize::new(0)))
    }

    /// Create a scheduler whose tasks are counted in a shared counter.
    pub fn with_task_counter(live_tasks: Arc<AtomicUsize>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            handles: Vec::new(),
            live_tasks,
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        debug!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let guard = TaskGuard::enter(&self.live_tasks);

            let handle = tokio::spawn(async move {
                let _guard = guard;
                let name = job.name();
                let frequency = job.frequency();
                let mut interval = tokio::time::interval(frequency.duration());
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                if !job.run_on_start() {
                    // Skip the first immediate tick
                    interval.tick().await;
                }

                debug!(job = name, frequency = ?frequency, "Job scheduled");

                loop {
                    tokio::select! {
                        biased;

                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                debug!(job = name, "Job shutting down");
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            run_job(job.as_ref()).await;
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signal shutdown. Returns immediately.
    pub fn shutdown(&self) {
        debug!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => debug!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(job: &dyn Job) {
    let name = job.name();
    let start = tokio::time::Instant::now();

    match job.execute().await {
        Ok(()) => {
            debug!(
                job = name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Job completed"
            );
        }
        Err(e) => {
            warn!(
                job = name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Job failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestJob {
        run_count: Arc<AtomicUsize>,
        should_fail: bool,
        immediate: bool,
        work: Duration,
    }

    impl TestJob {
        fn new(run_count: &Arc<AtomicUsize>) -> Self {
            Self {
                run_count: Arc::clone(run_count),
                should_fail: false,
                immediate: false,
                work: Duration::ZERO,
            }
        }
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        fn name(&self) -> &'static str {
            "test_job"
        }

        fn frequency(&self) -> JobFrequency {
            JobFrequency::Seconds(10)
        }

        fn run_on_start(&self) -> bool {
            self.immediate
        }

        async fn execute(&self) -> Result<(), AgentError> {
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(AgentError::Validation("Test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_job_frequency_duration() {
        assert_eq!(JobFrequency::Seconds(30).duration(), Duration::from_secs(30));
        assert_eq!(JobFrequency::Minutes(2).duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_scheduler_register() {
        let mut scheduler = JobScheduler::default();
        assert!(scheduler.jobs.is_empty());
        scheduler.register(TestJob::new(&Arc::new(AtomicUsize::new(0))));
        assert_eq!(scheduler.jobs.len(), 1);
        assert!(scheduler.handles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_skipped_by_default() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler.register(TestJob::new(&runs));
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_start_then_every_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::new();
        scheduler.register(TestJob {
            immediate: true,
            should_fail: true,
            ..TestJob::new(&runs)
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_run_finish() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::with_task_counter(Arc::clone(&live));
        scheduler.register(TestJob {
            immediate: true,
            work: Duration::from_secs(3),
            ..TestJob::new(&runs)
        });
        scheduler.start();
        assert_eq!(live.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_scheduler_stops_jobs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let mut scheduler = JobScheduler::with_task_counter(Arc::clone(&live));
        scheduler.register(TestJob::new(&runs));
        scheduler.start();
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
