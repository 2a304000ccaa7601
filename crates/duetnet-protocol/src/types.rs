//! Value types that travel on the wire.
//!
//! Everything here is plain data: identifiers, small float vectors, and the
//! two byte-sized enumerations (agent kind and game phase). The codec knows
//! how to write each of them; the message structs in [`crate::message`]
//! are built out of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned identifier of a connected player.
///
/// Peer IDs are handed out once per session by the server during the
/// identity handshake and never change for that session. They are a
/// separate namespace from transport connection IDs, which the transport
/// assigns and which do not survive a reconnect.
///
/// `PeerId(0)` is reserved: it owns environmental agents (moving
/// platforms) and is the server's own local ID.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The reserved "nobody" owner. Environmental agents use it, and it is
    /// the local ID of the server and of a client before its handshake.
    pub const UNOWNED: PeerId = PeerId(0);

    /// Returns `true` for [`PeerId::UNOWNED`].
    pub fn is_unowned(self) -> bool {
        self == Self::UNOWNED
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of a replicated agent, unique within one session.
///
/// Only the server allocates these. Clients use whatever ID arrives in a
/// Spawn message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

/// A 2-component float vector. Encoded as `x, y` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Widens to 3D with `z = 0`.
    pub const fn extend(self) -> Vec3 {
        Vec3::new(self.x, self.y, 0.0)
    }
}

/// A 3-component float vector. Encoded as `x, y, z` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Drops the z component. Sync messages only carry the plane.
    pub const fn truncate(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Linear interpolation toward `target`. `t` is clamped to `0.0..=1.0`
    /// so a long frame never overshoots.
    pub fn lerp(self, target: Vec3, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        Vec3::new(
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
            self.z + (target.z - self.z) * t,
        )
    }
}

/// A rotation quaternion. Encoded as `x, y, z, w` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// A rotation of `degrees` about the vertical (y) axis.
    pub fn from_yaw_degrees(degrees: f32) -> Self {
        let half = degrees.to_radians() * 0.5;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }

    /// Yaw in degrees, normalized to `0.0..360.0`. Exact for rotations
    /// about the y axis only, which is all agents ever do.
    pub fn yaw_degrees(self) -> f32 {
        (2.0 * self.y.atan2(self.w)).to_degrees().rem_euclid(360.0)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the single-server topology a process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

// ---------------------------------------------------------------------------
// Byte enumerations
// ---------------------------------------------------------------------------

/// What kind of simulated object an agent is. One byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AgentKind {
    /// The running/jumping player character.
    #[default]
    Character = 0,
    /// The free-hand line drawn by the second player.
    Drawing = 1,
    /// An environmental moving platform.
    Platform = 2,
}

impl AgentKind {
    /// Kind assigned to the n-th peer (0-based) to enter a match, if any.
    pub fn for_entry_order(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Character),
            1 => Some(Self::Drawing),
            _ => None,
        }
    }
}

impl TryFrom<u8> for AgentKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Character),
            1 => Ok(Self::Drawing),
            2 => Ok(Self::Platform),
            _ => Err(ProtocolError::InvalidEnum { kind: "agent kind", value }),
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character => write!(f, "Character"),
            Self::Drawing => write!(f, "Drawing"),
            Self::Platform => write!(f, "Platform"),
        }
    }
}

/// Phase of the shared match. One byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GamePhase {
    #[default]
    Connecting = 0,
    CountDown = 1,
    Running = 2,
    Win = 3,
    Lose = 4,
}

impl GamePhase {
    /// Returns `true` once the match has been decided.
    pub fn is_over(self) -> bool {
        matches!(self, Self::Win | Self::Lose)
    }
}

impl TryFrom<u8> for GamePhase {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Connecting),
            1 => Ok(Self::CountDown),
            2 => Ok(Self::Running),
            3 => Ok(Self::Win),
            4 => Ok(Self::Lose),
            _ => Err(ProtocolError::InvalidEnum { kind: "game phase", value }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// The numeric discriminator at the front of every encoded message.
///
/// Dense small integers starting at 1. The value is written as a `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Tag {
    Spawn = 1,
    IdentityRequest = 2,
    EnterGame = 3,
    CharacterSync = 4,
    DrawingSync = 5,
    PlatformSync = 6,
    Group = 7,
    Chat = 8,
    RosterEntry = 9,
    GameState = 10,
    TimeSync = 11,
    ScoreSync = 12,
    Delete = 13,
    Ping = 14,
}

impl Tag {
    /// Every tag, in wire order.
    pub const ALL: [Tag; 14] = [
        Tag::Spawn,
        Tag::IdentityRequest,
        Tag::EnterGame,
        Tag::CharacterSync,
        Tag::DrawingSync,
        Tag::PlatformSync,
        Tag::Group,
        Tag::Chat,
        Tag::RosterEntry,
        Tag::GameState,
        Tag::TimeSync,
        Tag::ScoreSync,
        Tag::Delete,
        Tag::Ping,
    ];

    /// Looks up a raw wire value. `None` for values no variant uses.
    pub fn from_u16(raw: u16) -> Option<Self> {
        Self::ALL.get(usize::from(raw).checked_sub(1)?).copied()
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.as_u16())
    }
}
