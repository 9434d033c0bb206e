//! Background poll scheduler for sessync.
//!
//! Decides *when* the background session check runs: a fixed interval,
//! random jitter on the first poll, pause/resume, and skip-ahead when the
//! process was asleep (a laptop lid, a suspended container) and several
//! polls were missed at once. It does not run the check itself.
//!
//! # Disabled mode
//!
//! When `interval` is zero, [`PollScheduler::wait_for_poll`] pends forever.
//! This lets a caller keep one `tokio::select!` loop whether polling is
//! configured or not. An interval too large to schedule (the deadline
//! would overflow [`Instant`]) behaves the same way.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* pause, resume, shutdown */ }
//!         info = scheduler.wait_for_poll() => {
//!             facade.check_session(false).await;
//!             scheduler.record_poll_end();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the poll scheduler.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between polls. Zero disables polling.
    pub interval: Duration,
    /// Upper bound of the random delay added to the *first* poll, so
    /// processes started together don't hit the backend in lockstep.
    pub initial_jitter: Duration,
    /// A poll whose work takes longer than this fraction of `interval`
    /// logs a warning (0.0–1.0). Default: 0.5.
    pub slow_poll_threshold: f64,
    /// Track average and maximum poll duration.
    pub metrics_enabled: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            initial_jitter: Duration::from_secs(2),
            slow_poll_threshold: 0.5,
            metrics_enabled: true,
        }
    }
}

impl PollConfig {
    /// A config polling every `interval`, other fields defaulted.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`PollScheduler::new`]. Rules:
    /// - `slow_poll_threshold` clamped to `0.0..=1.0`.
    /// - `initial_jitter` capped to `interval` when polling is on.
    pub fn validated(mut self) -> Self {
        self.slow_poll_threshold = self.slow_poll_threshold.clamp(0.0, 1.0);
        if !self.interval.is_zero() && self.initial_jitter > self.interval {
            warn!(
                jitter_ms = self.initial_jitter.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "initial jitter exceeds poll interval, clamping"
            );
            self.initial_jitter = self.interval;
        }
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Poll info
// ---------------------------------------------------------------------------

/// Returned by [`PollScheduler::wait_for_poll`] each time a poll is due.
#[derive(Debug, Clone)]
pub struct PollInfo {
    /// Monotonically increasing poll number (starts at 1).
    pub poll: u64,
    /// `true` if the scheduler woke up more than a tenth of an interval late.
    pub late: bool,
    /// Whole intervals that passed without a poll (0 normally).
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime counters. Durations cover the work reported through
/// [`PollScheduler::record_poll_end`].
#[derive(Debug, Clone, Default)]
pub struct PollMetrics {
    pub total_polls: u64,
    pub total_late: u64,
    pub total_missed: u64,
    /// Exponential moving average of poll duration (α = 0.1).
    pub avg_poll_time: Duration,
    pub max_poll_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// `from + after`, or `None` (never) when `Instant` can't represent it.
fn deadline_after(from: Instant, after: Duration) -> Option<Instant> {
    let deadline = from.checked_add(after);
    if deadline.is_none() {
        warn!(
            interval_secs = after.as_secs(),
            "poll interval too large to schedule, polling disabled"
        );
    }
    deadline
}

/// Fixed-interval poll scheduler. One per background check loop.
pub struct PollScheduler {
    config: PollConfig,
    poll_count: u64,
    /// When the next poll is due. `None` when disabled.
    next_poll: Option<Instant>,
    /// Start of the current poll's work, consumed by `record_poll_end`.
    poll_start: Option<Instant>,
    paused: bool,
    metrics: PollMetrics,
}

impl PollScheduler {
    /// Creates a scheduler. The first poll is due after one interval plus
    /// a random share of `initial_jitter`.
    pub fn new(config: PollConfig) -> Self {
        let config = config.validated();

        let next_poll = if config.is_disabled() {
            None
        } else {
            let jitter_ms = config.initial_jitter.as_millis() as u64;
            let jitter = if jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..jitter_ms))
            } else {
                Duration::ZERO
            };
            deadline_after(Instant::now(), config.interval.saturating_add(jitter))
        };

        if config.is_disabled() {
            debug!("poll scheduler created with polling disabled");
        } else {
            debug!(
                interval_secs = config.interval.as_secs_f64(),
                "poll scheduler created"
            );
        }

        Self {
            config,
            poll_count: 0,
            next_poll,
            poll_start: None,
            paused: false,
            metrics: PollMetrics::default(),
        }
    }

    /// A scheduler polling every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(PollConfig::every(interval))
    }

    /// Waits until the next poll is due.
    ///
    /// Pends forever when disabled or paused; `tokio::select!` still
    /// services its other branches.
    pub async fn wait_for_poll(&mut self) -> PollInfo {
        let next = match self.next_poll {
            Some(next) if !self.paused => next,
            _ => return std::future::pending().await,
        };
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.poll_count += 1;
        self.poll_start = Some(now);

        let late_by = now.saturating_duration_since(next);
        let late = late_by > interval / 10;
        let missed = if late {
            (late_by.as_nanos() / interval.as_nanos()) as u64
        } else {
            0
        };
        if missed > 0 {
            warn!(
                poll = self.poll_count,
                missed,
                late_secs = late_by.as_secs_f64(),
                "missed background polls, skipping ahead"
            );
        }

        // Always from now: missed polls are never replayed.
        self.next_poll = deadline_after(now, interval);

        if late {
            self.metrics.total_late += 1;
        }
        self.metrics.total_missed += missed;
        self.metrics.total_polls += 1;

        trace!(poll = self.poll_count, late, "poll due");

        PollInfo {
            poll: self.poll_count,
            late,
            missed,
        }
    }

    /// Records that the work for the current poll has finished.
    ///
    /// Without a preceding `wait_for_poll` this does nothing.
    pub fn record_poll_end(&mut self) {
        let Some(start) = self.poll_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        let budget = self.config.interval.as_secs_f64() * self.config.slow_poll_threshold;
        if budget > 0.0 && elapsed.as_secs_f64() >= budget {
            warn!(
                poll = self.poll_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                interval_ms = self.config.interval.as_secs_f64() * 1000.0,
                "background poll is slow relative to its interval"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_poll_time {
                self.metrics.max_poll_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_poll_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_poll_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Stops polls until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(poll = self.poll_count, "poll scheduler paused");
        }
    }

    /// Resumes after a pause. The next poll is one full interval from now,
    /// so time spent paused never produces a burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if !self.config.is_disabled() {
                self.next_poll = deadline_after(Instant::now(), self.config.interval);
            }
            debug!(poll = self.poll_count, "poll scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.config.is_disabled()
    }

    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    pub fn metrics(&self) -> &PollMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
