//! Device positioning and battery capabilities.
//!
//! The tracking service only sees these traits. Platform integrations (a
//! GNSS receiver, a replayed trace, a manual test driver) implement them.

mod battery;
mod manual;
mod replay;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use domain::models::{LocationSample, PositionError};

pub use battery::{BatteryProbe, SysfsBattery};
pub use manual::ManualPositionProvider;
pub use replay::ReplayPositionProvider;

pub type PositionResult = Result<LocationSample, PositionError>;

/// Buffered fixes a watch may hold before the provider has to wait.
const WATCH_BUFFER: usize = 16;

/// Request options for a position fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Give up on a fix after this long.
    pub timeout: Duration,
    /// Accept a cached fix no older than this.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// One-shot, high-accuracy fix that must be fresh.
    pub fn initial_fix(timeout: Duration) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }

    /// Continuous background stream.
    pub fn watch(timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout,
            maximum_age,
        }
    }
}

/// Stream of fixes from a continuous watch.
///
/// Dropping the watch cancels it: the provider sees its sender closed.
#[derive(Debug)]
pub struct PositionWatch {
    rx: mpsc::Receiver<PositionResult>,
}

impl PositionWatch {
    /// Creates a linked sender/watch pair.
    pub fn channel() -> (mpsc::Sender<PositionResult>, Self) {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        (tx, Self { rx })
    }

    /// Next fix or error; `None` once the provider ends the watch.
    pub async fn recv(&mut self) -> Option<PositionResult> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Whether the device has a positioning capability at all.
    fn is_supported(&self) -> bool;

    /// Request a single fix. Also the point where the platform asks the
    /// user for permission.
    async fn current_position(&self, options: PositionOptions) -> PositionResult;

    /// Start a continuous watch.
    fn watch_position(&self, options: PositionOptions) -> PositionWatch;
}
