//! In-memory sliding-window tracking of login attempts.
//!
//! Flow Overview:
//! 1) Every login attempt calls `check_and_record` with the caller's source id
//!    before the password is looked at.
//! 2) A source gets `max_attempts` attempts per `window`, counted from its first
//!    attempt. Further attempts are refused (and not counted) until the window
//!    expires; the next attempt after that starts a fresh window.
//! 3) A successful login calls `reset`, wiping the source's history.
//! 4) A background task sweeps expired records every `sweep_interval` so
//!    one-off sources do not pile up.
//!
//! All reads and writes go through one async mutex, so two concurrent attempts
//! from the same source can never both slip past the cap.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument};

use super::clock::Clock;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptPolicy {
    max_attempts: u32,
    window: Duration,
    sweep_interval: Duration,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl AttemptPolicy {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl AttemptDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Clone, Copy, Debug)]
struct AttemptRecord {
    count: u32,
    window_start: Duration,
}

pub struct AttemptTracker {
    policy: AttemptPolicy,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl std::fmt::Debug for AttemptTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptTracker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AttemptTracker {
    #[must_use]
    pub fn new(policy: AttemptPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    /// Count an attempt from `source_id` and decide whether it may proceed.
    #[instrument(skip(self))]
    pub async fn check_and_record(&self, source_id: &str) -> AttemptDecision {
        let now = self.clock.now();
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(source_id) else {
            records.insert(
                source_id.to_string(),
                AttemptRecord {
                    count: 1,
                    window_start: now,
                },
            );
            return AttemptDecision::Allowed;
        };

        let elapsed = now.saturating_sub(record.window_start);
        if elapsed > self.policy.window {
            record.count = 1;
            record.window_start = now;
            return AttemptDecision::Allowed;
        }

        if record.count < self.policy.max_attempts {
            record.count += 1;
            return AttemptDecision::Allowed;
        }

        AttemptDecision::Limited {
            retry_after: self.policy.window.saturating_sub(elapsed),
        }
    }

    /// Forget everything about `source_id`.
    pub async fn reset(&self, source_id: &str) {
        self.records.lock().await.remove(source_id);
    }

    /// Drop every record whose window has expired. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let window = self.policy.window;
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| now.saturating_sub(record.window_start) <= window);
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// Handle to the background sweep task. Dropping it stops the task.
#[derive(Debug)]
pub struct SweepTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweepTask {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Start sweeping `tracker` on its policy's interval.
///
/// The task only keeps a weak reference, so it also ends once the tracker is gone.
#[must_use]
pub fn spawn_sweeper(tracker: &Arc<AttemptTracker>) -> SweepTask {
    let period = tracker.policy.sweep_interval;
    let tracker: Weak<AttemptTracker> = Arc::downgrade(tracker);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("login attempt sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let Some(tracker) = tracker.upgrade() else {
                        return;
                    };
                    let removed = tracker.sweep().await;
                    if removed > 0 {
                        debug!("swept {} expired login attempt records", removed);
                    }
                }
            }
        }
    });

    SweepTask {
        shutdown_tx: Some(shutdown_tx),
        handle: Some(handle),
    }
}
