//! Scheduler timing under tokio's paused clock.
//!
//! With `start_paused = true`, tokio auto-advances time whenever every task
//! is idle, so `sleep_until` resolves instantly at the right virtual
//! instant.

use std::time::Duration;

use duetnet_tick::{IntervalTimer, TickConfig, TickScheduler};
use tokio::time::Instant;

#[test]
fn test_default_config_is_sixty_hz() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 60);
    assert_eq!(cfg.tick_duration(), Some(Duration::from_secs_f64(1.0 / 60.0)));
}

#[test]
fn test_rate_zero_is_event_driven() {
    let host = TickScheduler::with_rate(0);
    assert!(host.is_event_driven());
    assert_eq!(host.tick_duration(), None);
}

#[test]
fn test_rate_above_maximum_is_clamped() {
    let host = TickScheduler::with_rate(10_000);
    assert_eq!(
        host.tick_duration(),
        TickConfig::with_rate(TickConfig::MAX_TICK_RATE_HZ).tick_duration()
    );
}

#[tokio::test(start_paused = true)]
async fn test_ticks_fire_at_fixed_rate() {
    let mut host = TickScheduler::with_rate(20);
    let start = Instant::now();

    for expected in 1..=3 {
        let info = host.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert!(!info.overrun);
    }
    assert_eq!(start.elapsed(), Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn test_overrun_skips_instead_of_bursting() {
    let mut host = TickScheduler::with_rate(20);
    host.wait_for_tick().await;

    // Simulate a slow frame covering three steps.
    tokio::time::advance(Duration::from_millis(160)).await;

    let late = host.wait_for_tick().await;
    assert!(late.overrun);
    assert_eq!(late.ticks_skipped, 2);

    let before = Instant::now();
    let next = host.wait_for_tick().await;
    assert!(!next.overrun);
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_paused_scheduler_does_not_tick() {
    let mut host = TickScheduler::with_rate(20);
    host.pause();
    assert!(host.is_paused());

    let result = tokio::time::timeout(Duration::from_secs(1), host.wait_for_tick()).await;
    assert!(result.is_err(), "paused scheduler must pend");

    host.resume();
    let before = Instant::now();
    let info = host.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_event_driven_pends_forever() {
    let mut host = TickScheduler::with_rate(0);
    let result = tokio::time::timeout(Duration::from_secs(60), host.wait_for_tick()).await;
    assert!(result.is_err());
    assert_eq!(host.tick_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_interval_timer_driven_by_ticks() {
    // 10 Hz sync on a 20 Hz loop: fires on the first tick, then every other.
    let mut host = TickScheduler::with_rate(20);
    let mut sync = IntervalTimer::new(Duration::from_millis(100), true);

    let mut fired = Vec::new();
    for _ in 0..6 {
        let info = host.wait_for_tick().await;
        fired.push(sync.advance(info.dt));
    }
    assert_eq!(fired, vec![true, false, true, false, true, false]);
}
