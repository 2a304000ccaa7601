//! Per-peer record and state machine.

use tokio::time::Instant;

/// Where a peer is in its lifecycle, as seen by the server.
///
/// ```text
///   (unidentified) ──IdentityRequest──→ Identified ──EnterGame──→ InGame
///                                            │                      │
///                                            └──────(disconnect)────┴──→ Disconnected
/// ```
///
/// An unidentified connection has no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Identified,
    InGame,
    Disconnected,
}

/// What the roster knows about one peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub username: String,
    pub state: PeerState,
    /// Last time a ping arrived from this peer, if ever.
    pub last_ping: Option<Instant>,
}

impl PeerRecord {
    pub(crate) fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            state: PeerState::Identified,
            last_ping: None,
        }
    }

    /// `true` while the peer still has a live connection.
    pub fn is_connected(&self) -> bool {
        self.state != PeerState::Disconnected
    }
}
