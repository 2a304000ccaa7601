//! Wire protocol for duetnet.
//!
//! This crate defines what travels inside a datagram:
//!
//! - **Types** ([`PeerId`], [`AgentId`], [`Vec2`], [`AgentKind`], etc.):
//!   the plain values messages are made of.
//! - **Codec** ([`WireWriter`], [`WireReader`]): fixed-width little-endian
//!   encoding of those values.
//! - **Messages** ([`Message`] and one struct per kind): the closed set of
//!   fourteen tagged message kinds, plus the [`create`] registry lookup.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets, peers, or agents. It
//! turns a `&[u8]` into a [`Message`] and back.
//!
//! ```text
//! Transport (datagram bytes) → Protocol (Message) → Dispatch (handlers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{MAX_GROUP_DEPTH, MAX_TEXT_LEN, WireReader, WireWriter, string_size};
pub use error::ProtocolError;
pub use message::{
    CharacterSync, Chat, Delete, DrawingSync, EnterGame, GameState, Group, IdentityRequest,
    Message, Ping, PlatformSync, RosterEntry, ScoreSync, Spawn, TimeSync, WireFormat, create,
};
pub use types::{AgentId, AgentKind, GamePhase, PeerId, Quat, Role, Tag, Vec2, Vec3};
