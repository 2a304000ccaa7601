//! Accumulating interval timer, advanced by frame time.

use std::time::Duration;

/// Fires every `interval` of accumulated time.
///
/// Fires at most once per [`advance`](Self::advance). If a long frame
/// covers several intervals, the extra whole intervals are dropped and
/// only the remainder carries over.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    elapsed: Duration,
    fire_next: bool,
}

impl IntervalTimer {
    /// With `fire_immediately`, the first `advance` fires regardless of
    /// `dt` and the count starts from there. Otherwise the first fire comes
    /// one full interval in.
    pub fn new(interval: Duration, fire_immediately: bool) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            fire_next: fire_immediately,
        }
    }

    /// Adds `dt` and returns `true` if the timer fired.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.fire_next {
            self.fire_next = false;
            return true;
        }
        if self.interval.is_zero() {
            return true;
        }

        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }
        let remainder = self.elapsed.as_nanos() % self.interval.as_nanos();
        self.elapsed = Duration::from_nanos(remainder as u64);
        true
    }

    /// Clears accumulated time.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_40: Duration = Duration::from_millis(40);
    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn test_fire_immediately_fires_on_first_advance() {
        let mut timer = IntervalTimer::new(MS_100, true);
        assert!(timer.advance(Duration::ZERO));
        assert!(!timer.advance(MS_40));
        assert!(!timer.advance(MS_40));
        assert!(timer.advance(MS_40));
    }

    #[test]
    fn test_delayed_timer_waits_a_full_interval() {
        let mut timer = IntervalTimer::new(MS_100, false);
        assert!(!timer.advance(MS_40));
        assert!(!timer.advance(MS_40));
        assert!(timer.advance(MS_40));
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut timer = IntervalTimer::new(MS_100, false);
        assert!(timer.advance(Duration::from_millis(130)));
        // 30ms left over; 70 more reaches the next interval.
        assert!(!timer.advance(Duration::from_millis(60)));
        assert!(timer.advance(Duration::from_millis(10)));
    }

    #[test]
    fn test_long_frame_fires_once() {
        let mut timer = IntervalTimer::new(MS_100, false);
        assert!(timer.advance(Duration::from_millis(450)));
        // 50ms remainder, not a backlog of four.
        assert!(!timer.advance(Duration::ZERO));
        assert!(timer.advance(Duration::from_millis(50)));
    }

    #[test]
    fn test_zero_interval_fires_every_advance() {
        let mut timer = IntervalTimer::new(Duration::ZERO, false);
        assert!(timer.advance(Duration::ZERO));
        assert!(timer.advance(Duration::ZERO));
    }
}
