//! Fixed-rate host loop scheduler.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};

/// Host loop rate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickConfig {
    /// Frames per second. 0 means the loop never ticks on its own.
    pub tick_rate_hz: u32,
    /// Upper bound (µs) of a random delay before the first frame only.
    /// Spreads out processes launched by the same script.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::with_rate(60)
    }
}

impl TickConfig {
    /// Rates above this are clamped down to it.
    pub const MAX_TICK_RATE_HZ: u32 = 240;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            initial_jitter_us: 0,
        }
    }

    /// One frame at this rate; `None` when the rate is 0.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}

/// What [`TickScheduler::wait_for_tick`] hands back each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// 1 for the first frame.
    pub tick: u64,
    /// Always the nominal frame length, even after a late wake-up.
    pub dt: Duration,
    /// Woke up more than a tenth of a frame late.
    pub overrun: bool,
    /// Whole frames that were never run because of the late wake-up.
    pub ticks_skipped: u64,
}

/// Sorts a wake-up delay into on-time or overrun, and counts the whole
/// frames it swallowed.
fn lateness(late_by: Duration, step: Duration) -> (bool, u64) {
    if late_by <= step / 10 {
        return (false, 0);
    }
    let skipped = late_by.as_nanos() / step.as_nanos();
    (true, u64::try_from(skipped).unwrap_or(u64::MAX))
}

/// Paces the host loop.
///
/// After a late frame the next deadline is measured from the late wake-up,
/// so a stall costs frames instead of producing a burst of catch-up
/// frames.
#[derive(Debug)]
pub struct TickScheduler {
    step: Option<Duration>,
    deadline: Option<Instant>,
    frames: u64,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let mut rate = config.tick_rate_hz;
        if rate > TickConfig::MAX_TICK_RATE_HZ {
            tracing::warn!(
                requested = rate,
                max = TickConfig::MAX_TICK_RATE_HZ,
                "tick rate clamped"
            );
            rate = TickConfig::MAX_TICK_RATE_HZ;
        }
        let step = TickConfig::with_rate(rate).tick_duration();

        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };
        let deadline = step.map(|step| Instant::now() + step + jitter);

        tracing::debug!(rate_hz = rate, ?step, ?jitter, "tick scheduler ready");
        Self {
            step,
            deadline,
            frames: 0,
            paused: false,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next frame is due.
    ///
    /// Never resolves while paused or at rate 0, which keeps it usable as
    /// one branch of a `select!`.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (deadline, step) = match (self.deadline, self.step, self.paused) {
            (Some(deadline), Some(step), false) => (deadline, step),
            _ => std::future::pending().await,
        };
        time::sleep_until(deadline).await;

        let woke = Instant::now();
        let (overrun, ticks_skipped) = lateness(woke.saturating_duration_since(deadline), step);
        self.frames += 1;
        self.deadline = Some(woke + step);

        if ticks_skipped > 0 {
            tracing::warn!(tick = self.frames, skipped = ticks_skipped, "host loop fell behind");
        } else {
            tracing::trace!(tick = self.frames, overrun, "tick");
        }
        TickInfo {
            tick: self.frames,
            dt: step,
            overrun,
            ticks_skipped,
        }
    }

    pub fn pause(&mut self) {
        if !self.paused {
            tracing::debug!(tick = self.frames, "tick scheduler paused");
        }
        self.paused = true;
    }

    /// The first frame after a resume comes one full step later; paused
    /// time is not made up.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.deadline = self.step.map(|step| Instant::now() + step);
        tracing::debug!(tick = self.frames, "tick scheduler resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_event_driven(&self) -> bool {
        self.step.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.frames
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.step
    }
}
