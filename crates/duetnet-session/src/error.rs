//! Error types for the session layer.

use duetnet_protocol::PeerId;

/// Errors that can occur while tracking peers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The peer ID was never assigned by this roster.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    /// The peer's connection is gone; it can no longer enter the match.
    #[error("peer {0} is disconnected")]
    Disconnected(PeerId),
}
