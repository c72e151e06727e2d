//! Replays a recorded GPS trace as if it came from the device.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use domain::models::{LocationSample, PositionError};

use super::{PositionOptions, PositionProvider, PositionResult, PositionWatch};

/// Provider that answers from a fixed list of samples.
///
/// The first sample answers the one-shot request; the rest are emitted by a
/// watch, one every `interval`, restamped with the current time.
pub struct ReplayPositionProvider {
    samples: Vec<LocationSample>,
    interval: Duration,
    finished_tx: watch::Sender<bool>,
}

impl ReplayPositionProvider {
    pub fn new(samples: Vec<LocationSample>, interval: Duration) -> Self {
        let (finished_tx, _) = watch::channel(false);
        Self {
            samples,
            interval,
            finished_tx,
        }
    }

    /// Load a trace stored as a JSON array of samples.
    pub fn from_file(path: &Path, interval: Duration) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading trace {}", path.display()))?;
        let samples: Vec<LocationSample> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing trace {}", path.display()))?;
        Ok(Self::new(samples, interval))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Resolves once a watch has emitted the whole trace.
    pub async fn wait_finished(&self) {
        let mut rx = self.finished_tx.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }

    fn restamp(sample: &LocationSample) -> LocationSample {
        LocationSample {
            captured_at: Utc::now(),
            ..sample.clone()
        }
    }
}

#[async_trait]
impl PositionProvider for ReplayPositionProvider {
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(&self, _options: PositionOptions) -> PositionResult {
        self.samples
            .first()
            .map(Self::restamp)
            .ok_or(PositionError::PositionUnavailable)
    }

    fn watch_position(&self, options: PositionOptions) -> PositionWatch {
        let (tx, position_watch) = PositionWatch::channel();
        let samples: Vec<LocationSample> = self.samples.iter().skip(1).cloned().collect();
        let interval = self.interval;
        let finished_tx = self.finished_tx.clone();

        tokio::spawn(async move {
            for sample in samples {
                // A gap longer than the watch timeout surfaces as a timeout first
                if interval > options.timeout {
                    tokio::time::sleep(options.timeout).await;
                    if tx.send(Err(PositionError::Timeout)).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(interval - options.timeout).await;
                } else {
                    tokio::time::sleep(interval).await;
                }

                if tx.send(Ok(Self::restamp(&sample))).await.is_err() {
                    debug!("Replay watch cancelled");
                    return;
                }
            }
            debug!("Replay trace exhausted");
            finished_tx.send_replace(true);
        });

        position_watch
    }
}
