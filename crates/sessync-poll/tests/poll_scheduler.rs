//! Integration tests for the poll scheduler.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle (or when a test calls `advance`), which makes intervals of
//! minutes resolve instantly.

use std::time::Duration;

use sessync_poll::{PollConfig, PollScheduler};

// =========================================================================
// Helpers
// =========================================================================

const MINUTE: Duration = Duration::from_secs(60);

/// Paused-clock timers resolve on millisecond ticks.
fn assert_elapsed(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(1),
        "expected ~{expected:?}, got {actual:?}"
    );
}

fn every_minute() -> PollConfig {
    PollConfig {
        initial_jitter: Duration::ZERO,
        ..PollConfig::every(MINUTE)
    }
}

// =========================================================================
// PollConfig
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let cfg = PollConfig::default();
    assert!(cfg.is_disabled());
}

#[test]
fn test_validated_clamps_jitter_and_threshold() {
    let cfg = PollConfig {
        interval: Duration::from_secs(1),
        initial_jitter: Duration::from_secs(10),
        slow_poll_threshold: 3.0,
        ..PollConfig::default()
    }
    .validated();

    assert_eq!(cfg.initial_jitter, Duration::from_secs(1));
    assert_eq!(cfg.slow_poll_threshold, 1.0);
}

// =========================================================================
// Scheduler creation and accessors
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = PollScheduler::new(every_minute());
    assert_eq!(s.poll_count(), 0);
    assert_eq!(s.interval(), MINUTE);
    assert!(!s.is_disabled());
    assert!(!s.is_paused());
}

#[test]
fn test_every_constructor() {
    let s = PollScheduler::every(Duration::from_secs(300));
    assert_eq!(s.interval(), Duration::from_secs(300));
}

// =========================================================================
// Poll firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_poll_fires_after_one_interval() {
    let mut s = PollScheduler::new(every_minute());
    let start = tokio::time::Instant::now();

    let info = s.wait_for_poll().await;

    assert_eq!(info.poll, 1);
    assert!(!info.late);
    assert_eq!(info.missed, 0);
    assert_elapsed(start.elapsed(), MINUTE);
}

#[tokio::test(start_paused = true)]
async fn test_polls_increment_monotonically() {
    let mut s = PollScheduler::new(every_minute());

    for expected in 1..=4 {
        let info = s.wait_for_poll().await;
        assert_eq!(info.poll, expected);
    }
    assert_eq!(s.poll_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_jitter_stays_within_bound() {
    let mut s = PollScheduler::new(PollConfig {
        initial_jitter: Duration::from_secs(5),
        ..PollConfig::every(MINUTE)
    });
    let start = tokio::time::Instant::now();

    s.wait_for_poll().await;

    let elapsed = start.elapsed();
    assert!(elapsed >= MINUTE);
    assert!(elapsed < MINUTE + Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_never_fires() {
    let mut s = PollScheduler::new(PollConfig::default());

    let result = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_poll()).await;

    assert!(result.is_err(), "disabled scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_unschedulable_interval_never_fires() {
    let mut s = PollScheduler::new(PollConfig::every(Duration::from_secs(u64::MAX)));

    let result = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_poll()).await;
    assert!(result.is_err(), "an overflowing deadline should pend forever");

    s.pause();
    s.resume();
    let result = tokio::time::timeout(Duration::from_secs(3600), s.wait_for_poll()).await;
    assert!(result.is_err());
    assert_eq!(s.poll_count(), 0);
}

// =========================================================================
// Missed polls
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sleeping_through_polls_skips_ahead() {
    let mut s = PollScheduler::new(every_minute());

    // The process "sleeps" through three and a half intervals.
    tokio::time::advance(MINUTE * 4 + MINUTE / 2).await;
    let info = s.wait_for_poll().await;

    assert!(info.late);
    assert_eq!(info.missed, 3);
    assert_eq!(s.metrics().total_missed, 3);
    assert_eq!(s.metrics().total_late, 1);

    // The next poll is a full interval from the late one, not a burst.
    let before = tokio::time::Instant::now();
    let next = s.wait_for_poll().await;
    assert_eq!(next.poll, 2);
    assert!(!next.late);
    assert_elapsed(before.elapsed(), MINUTE);
}

// =========================================================================
// Pause / Resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_polls() {
    let mut s = PollScheduler::new(every_minute());
    s.wait_for_poll().await;

    s.pause();
    assert!(s.is_paused());

    let result = tokio::time::timeout(MINUTE * 10, s.wait_for_poll()).await;
    assert!(result.is_err(), "paused scheduler should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_restarts_a_full_interval() {
    let mut s = PollScheduler::new(every_minute());
    s.wait_for_poll().await;
    s.pause();
    tokio::time::advance(MINUTE * 10).await;

    s.resume();
    let before = tokio::time::Instant::now();
    let info = s.wait_for_poll().await;

    assert_eq!(info.poll, 2);
    assert!(!info.late, "time spent paused is not lateness");
    assert_elapsed(before.elapsed(), MINUTE);
}

#[tokio::test]
async fn test_pause_resume_idempotent() {
    let mut s = PollScheduler::new(every_minute());

    s.pause();
    s.pause();
    assert!(s.is_paused());

    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = PollScheduler::new(every_minute());
    let m = s.metrics();
    assert_eq!(m.total_polls, 0);
    assert_eq!(m.total_late, 0);
    assert_eq!(m.avg_poll_time, Duration::ZERO);
    assert_eq!(m.max_poll_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_poll_end_tracks_durations() {
    let mut s = PollScheduler::new(every_minute());

    s.wait_for_poll().await;
    tokio::time::advance(Duration::from_millis(200)).await;
    s.record_poll_end();

    assert_eq!(s.metrics().total_polls, 1);
    assert_elapsed(s.metrics().max_poll_time, Duration::from_millis(200));
    assert!(s.metrics().avg_poll_time > Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_poll_end_without_wait_is_noop() {
    let mut s = PollScheduler::new(every_minute());
    s.record_poll_end();
    assert_eq!(s.metrics().max_poll_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_duration_tracking() {
    let mut s = PollScheduler::new(PollConfig {
        metrics_enabled: false,
        ..every_minute()
    });

    s.wait_for_poll().await;
    tokio::time::advance(Duration::from_millis(10)).await;
    s.record_poll_end();

    assert_eq!(s.metrics().avg_poll_time, Duration::ZERO);
    assert_eq!(s.metrics().max_poll_time, Duration::ZERO);
    assert_eq!(s.metrics().total_polls, 1, "counters are always kept");
}

// =========================================================================
// Integration: select! loop pattern
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = PollScheduler::new(every_minute());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);

    tokio::spawn(async move {
        tokio::time::sleep(MINUTE * 3 + Duration::from_secs(30)).await;
        tx.send("stop").await.ok();
    });

    let mut polls = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.wait_for_poll() => {
                polls += 1;
                s.record_poll_end();
                assert_eq!(info.poll, polls);
            }
        }
    }

    assert_eq!(polls, 3);
}
