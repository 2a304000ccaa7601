//! Transport layer for duetnet.
//!
//! Provides the [`Driver`] trait, a non-blocking view of a datagram socket
//! that carries opaque payloads between connections, and two drivers:
//!
//! - [`UdpDriver`]: a tokio `UdpSocket` with connection handshake,
//!   heartbeats, timeouts, and the [`ReliableWindow`] on every link.
//! - [`MemoryServer`] / [`MemoryClient`]: in-process channels, used for
//!   deterministic tests and local play.
//!
//! Drivers never block. The owner calls [`Driver::update`] once per tick,
//! then drains [`Driver::accept`] and [`Driver::pop_event`].

mod error;
mod memory;
mod packet;
mod reliability;
mod udp;

pub use error::TransportError;
pub use memory::{MemoryClient, MemoryConnector, MemoryServer, memory_server};
pub use reliability::{ReliableWindow, sequence_greater_than, sequence_less_than};
pub use udp::UdpDriver;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

/// Opaque identifier for a connection.
///
/// Assigned by the driver; a reconnecting peer gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that happened on a link since the last drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// One payload, delivered in order.
    Data { conn: ConnectionId, payload: Vec<u8> },
    /// The remote side left, timed out, or stopped acknowledging. Not
    /// emitted for a local [`Driver::disconnect`].
    Disconnected(ConnectionId),
}

/// Link tuning shared by every connection of a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// Maximum unacknowledged payloads in flight per link.
    pub window: u16,
    pub resend_timeout: Duration,
    /// Silence after which a link is reported as disconnected.
    pub disconnect_timeout: Duration,
    /// Idle links send a heartbeat this often.
    pub heartbeat_interval: Duration,
    /// Largest datagram a link will put on the wire, packet header
    /// included. Bigger payloads are refused by [`Driver::send`].
    pub max_datagram: usize,
    /// Resends allowed per payload before the link is dropped.
    pub max_resends: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            window: 32,
            resend_timeout: Duration::from_millis(100),
            disconnect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(1),
            max_datagram: 8 * 1024,
            max_resends: ReliableWindow::DEFAULT_MAX_RESENDS,
        }
    }
}

/// A non-blocking datagram endpoint.
///
/// Object safe so a session can hold `Box<dyn Driver>` and not care
/// whether it talks UDP or memory.
pub trait Driver: Send + 'static {
    /// Reads everything currently available, runs resends, heartbeats and
    /// timeouts, and queues the results. Never waits.
    fn update(&mut self, now: Instant);

    /// Pops the next connection accepted since the last call. Always `None`
    /// for client drivers.
    fn accept(&mut self) -> Option<ConnectionId>;

    fn pop_event(&mut self) -> Option<DriverEvent>;

    /// Queues `payload` for in-order delivery on `conn`.
    ///
    /// A payload that cannot fit in one datagram fails with
    /// [`TransportError::PayloadTooLarge`] and is not queued.
    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> Result<(), TransportError>;

    /// Closes `conn`, telling the remote side on a best-effort basis.
    fn disconnect(&mut self, conn: ConnectionId);

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_link_config_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.window, 32);
        assert_eq!(config.resend_timeout, Duration::from_millis(100));
        assert_eq!(config.disconnect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_datagram, 8192);
        assert_eq!(config.max_resends, 50);
    }
}
