//! The roster: every peer the server has identified, and who is in the match.
//!
//! Peer IDs are allocated from a counter starting at 1 (0 is reserved for
//! "unowned") and never reused within a session. A `BTreeMap` keeps the
//! roster in ID order so broadcasts list peers in the order they joined.
//!
//! # Concurrency note
//!
//! Like the rest of the network core, the roster is owned by the single
//! tick that pumps the transport. No locking.

use std::collections::{BTreeMap, HashMap};

use duetnet_protocol::PeerId;
use duetnet_transport::ConnectionId;
use tokio::time::Instant;

use crate::{PeerRecord, PeerState, SessionError};

/// Number of peers that make a full match. Reaching it starts the game.
pub const PLAYERS_PER_MATCH: usize = 2;

/// Result of [`Roster::identify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identified {
    /// A fresh peer ID was allocated.
    New(PeerId),
    /// This connection already had one; it is returned unchanged.
    Existing(PeerId),
}

impl Identified {
    pub fn peer(self) -> PeerId {
        match self {
            Self::New(peer) | Self::Existing(peer) => peer,
        }
    }
}

/// Result of [`Roster::enter_game`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// The peer joined as the `order`-th entrant (0-based). `match_ready`
    /// is `true` only for the entrant that brings the count to exactly
    /// [`PLAYERS_PER_MATCH`].
    Entered { order: usize, match_ready: bool },
    /// The peer was already in the match; nothing changed.
    AlreadyInGame,
}

/// Tracks identified peers and the connection each one arrived on.
#[derive(Debug, Default)]
pub struct Roster {
    /// Last peer ID handed out. The next one is this plus one.
    last_peer_id: u32,

    peers: BTreeMap<PeerId, PeerRecord>,

    /// Live connections only. Dropped on disconnect, while the peer record
    /// stays so chat from that peer still resolves to a name.
    connections: HashMap<ConnectionId, PeerId>,

    /// Peers in the match, in entry order. Entry order decides agent kind.
    in_game: Vec<PeerId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifies a connection (server side).
    ///
    /// Allocates the next peer ID and records `username`. A connection that
    /// already identified keeps its ID and the name it first gave.
    pub fn identify(&mut self, conn: ConnectionId, username: &str) -> Identified {
        if let Some(&peer) = self.connections.get(&conn) {
            tracing::debug!(%conn, %peer, "connection identified twice");
            return Identified::Existing(peer);
        }

        self.last_peer_id += 1;
        let peer = PeerId(self.last_peer_id);
        self.peers.insert(peer, PeerRecord::new(username));
        self.connections.insert(conn, peer);

        tracing::info!(%conn, %peer, username, "peer identified");
        Identified::New(peer)
    }

    /// Moves a peer into the match (server side).
    ///
    /// # Errors
    /// - [`SessionError::UnknownPeer`] if the ID was never assigned
    /// - [`SessionError::Disconnected`] if the peer already left
    pub fn enter_game(&mut self, peer: PeerId) -> Result<EnterOutcome, SessionError> {
        let record = self
            .peers
            .get_mut(&peer)
            .ok_or(SessionError::UnknownPeer(peer))?;

        match record.state {
            PeerState::InGame => Ok(EnterOutcome::AlreadyInGame),
            PeerState::Disconnected => Err(SessionError::Disconnected(peer)),
            PeerState::Identified => {
                record.state = PeerState::InGame;
                let order = self.in_game.len();
                self.in_game.push(peer);
                let match_ready = self.in_game.len() == PLAYERS_PER_MATCH;
                tracing::info!(%peer, order, match_ready, "peer entered the game");
                Ok(EnterOutcome::Entered { order, match_ready })
            }
        }
    }

    /// Forgets a connection and returns the peer it belonged to, if it had
    /// identified.
    ///
    /// The peer keeps its place in the match list: the match size counts
    /// entrants, not survivors.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<PeerId> {
        let peer = self.connections.remove(&conn)?;
        if let Some(record) = self.peers.get_mut(&peer) {
            record.state = PeerState::Disconnected;
        }
        tracing::info!(%conn, %peer, "peer disconnected");
        Some(peer)
    }

    /// Records a roster line received from the server (client side).
    ///
    /// Returns `true` if the peer was not known before.
    pub fn record_remote(&mut self, peer: PeerId, username: &str) -> bool {
        match self.peers.get_mut(&peer) {
            Some(record) => {
                record.username = username.to_string();
                false
            }
            None => {
                self.peers.insert(peer, PeerRecord::new(username));
                true
            }
        }
    }

    /// Notes that `peer` just pinged.
    pub fn touch(&mut self, peer: PeerId, now: Instant) {
        if let Some(record) = self.peers.get_mut(&peer) {
            record.last_ping = Some(now);
        }
    }

    pub fn peer_for(&self, conn: ConnectionId) -> Option<PeerId> {
        self.connections.get(&conn).copied()
    }

    pub fn get(&self, peer: PeerId) -> Option<&PeerRecord> {
        self.peers.get(&peer)
    }

    pub fn username(&self, peer: PeerId) -> Option<&str> {
        self.peers.get(&peer).map(|record| record.username.as_str())
    }

    /// Connected peers and their names, in ID order. This is what the
    /// server broadcasts after each identification.
    pub fn connected(&self) -> impl Iterator<Item = (PeerId, &str)> {
        self.peers
            .iter()
            .filter(|(_, record)| record.is_connected())
            .map(|(&peer, record)| (peer, record.username.as_str()))
    }

    /// Peers in the match, in entry order.
    pub fn in_game(&self) -> &[PeerId] {
        &self.in_game
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
