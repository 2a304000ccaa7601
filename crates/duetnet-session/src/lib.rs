//! Peer identity for duetnet.
//!
//! This crate handles the server-observed lifecycle of a client:
//!
//! 1. **Identification**: a connection sends a username and is assigned
//!    a [`PeerId`](duetnet_protocol::PeerId) ([`Roster::identify`])
//! 2. **Entering the match**: identified peers join in order, and the
//!    roster reports when the match is full ([`Roster::enter_game`])
//! 3. **Disconnect**: the transport connection is dropped but the name is
//!    kept so old chat lines still resolve ([`Roster::disconnect`])
//!
//! Clients keep a [`Roster`] too, filled from the server's roster
//! broadcasts with [`Roster::record_remote`].
//!
//! # How it fits in the stack
//!
//! ```text
//! NetManager (above)  ← maps connections to peers, resolves chat senders
//!     ↕
//! Session Layer (this crate)  ← peer IDs, names, per-peer state
//!     ↕
//! Protocol / Transport (below)  ← PeerId, ConnectionId
//! ```

mod error;
mod peer;
mod roster;

pub use error::SessionError;
pub use peer::{PeerRecord, PeerState};
pub use roster::{EnterOutcome, Identified, PLAYERS_PER_MATCH, Roster};
