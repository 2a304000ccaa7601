use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The local socket could not be bound.
    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote host name did not resolve to any address.
    #[error("could not resolve {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    /// The server never accepted the connect request.
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// A send named a connection this driver does not track.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The other end of a link is gone.
    #[error("connection {0} closed")]
    Closed(ConnectionId),

    /// A payload would not fit in one datagram, even before any resend.
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// A datagram did not match the packet framing.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}
