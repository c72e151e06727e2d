//! Position provider driven by hand, for tests and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use domain::models::PositionError;

use super::{PositionOptions, PositionProvider, PositionResult, PositionWatch};
use crate::sync::lock;

/// Provider whose fixes are pushed by the caller.
///
/// One-shot requests are answered from a queue (unavailable when empty);
/// watch fixes are broadcast with [`ManualPositionProvider::push`].
#[derive(Debug)]
pub struct ManualPositionProvider {
    supported: bool,
    queued_fixes: Mutex<VecDeque<PositionResult>>,
    fix_delay: Mutex<Option<Duration>>,
    fix_requests: AtomicUsize,
    watchers: Mutex<Vec<mpsc::Sender<PositionResult>>>,
}

impl ManualPositionProvider {
    pub fn new() -> Self {
        Self {
            supported: true,
            queued_fixes: Mutex::new(VecDeque::new()),
            fix_delay: Mutex::new(None),
            fix_requests: AtomicUsize::new(0),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// A device without positioning support.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Queue the answer to the next one-shot request.
    pub fn queue_fix(&self, result: PositionResult) {
        lock(&self.queued_fixes).push_back(result);
    }

    /// Delay one-shot answers, e.g. to exceed the caller's timeout.
    pub fn set_fix_delay(&self, delay: Option<Duration>) {
        *lock(&self.fix_delay) = delay;
    }

    /// Number of one-shot requests received.
    pub fn fix_requests(&self) -> usize {
        self.fix_requests.load(Ordering::SeqCst)
    }

    /// Deliver a fix to every open watch. Returns how many received it.
    pub fn push(&self, result: PositionResult) -> usize {
        let mut watchers = lock(&self.watchers);
        watchers.retain(|tx| !tx.is_closed());
        watchers
            .iter()
            .filter(|tx| tx.try_send(result.clone()).is_ok())
            .count()
    }

    /// Watches whose receiving side is still alive.
    pub fn active_watches(&self) -> usize {
        lock(&self.watchers)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

impl Default for ManualPositionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionProvider for ManualPositionProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn current_position(&self, _options: PositionOptions) -> PositionResult {
        self.fix_requests.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.fix_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.queued_fixes)
            .pop_front()
            .unwrap_or(Err(PositionError::PositionUnavailable))
    }

    fn watch_position(&self, _options: PositionOptions) -> PositionWatch {
        let (tx, watch) = PositionWatch::channel();
        lock(&self.watchers).push(tx);
        watch
    }
}
