//! Timing for duetnet.
//!
//! Two pieces, used at different levels:
//!
//! - [`TickScheduler`] drives the host loop at a fixed rate. Each
//!   resolved [`TickScheduler::wait_for_tick`] is one call to the network
//!   manager's update.
//! - [`IntervalTimer`] runs inside that update. It accumulates frame time
//!   and fires the lower-frequency activities (state sync, ping) without
//!   any extra task or coroutine.
//!
//! # Event-driven mode
//!
//! With `tick_rate_hz == 0` the scheduler pends forever, which lets a
//! `tokio::select!` loop run purely on other branches.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = tokio::signal::ctrl_c() => break,
//!         tick = scheduler.wait_for_tick() => manager.update(tick.dt),
//!     }
//! }
//! ```

mod interval;
mod scheduler;

pub use interval::IntervalTimer;
pub use scheduler::{TickConfig, TickInfo, TickScheduler};
