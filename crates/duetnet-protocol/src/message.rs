//! The closed set of message kinds and their wire layouts.
//!
//! Every message is `[u16 tag][payload]`. Each concrete kind is a plain
//! struct implementing [`WireFormat`], which knows the payload layout; the
//! [`Message`] enum is the tagged union the rest of duetnet passes around.
//!
//! # Example
//!
//! ```
//! use duetnet_protocol::{Chat, Message, PeerId};
//!
//! let msg = Message::from(Chat { sender: PeerId(3), text: "hi".into() });
//! let bytes = msg.encode().unwrap();
//! assert_eq!(bytes.len(), msg.size());
//! assert_eq!(Message::decode(&bytes).unwrap(), msg);
//! ```

use bytes::Bytes;

use crate::codec::{LEN_SIZE, QUAT_SIZE, TAG_SIZE, VEC2_SIZE, VEC3_SIZE, string_size};
use crate::{
    AgentId, AgentKind, GamePhase, PeerId, ProtocolError, Quat, Tag, Vec2, Vec3, WireReader,
    WireWriter,
};

// ---------------------------------------------------------------------------
// WireFormat trait
// ---------------------------------------------------------------------------

/// Wire layout of one concrete message kind.
///
/// Implementors provide the payload half; the provided methods add the tag
/// so every encoded message is self-describing.
pub trait WireFormat: Sized + Default {
    /// The tag written in front of the payload.
    const TAG: Tag;

    /// Encoded payload length in bytes, excluding the tag.
    fn payload_size(&self) -> usize;

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError>;

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;

    /// Full encoded length, tag included.
    fn size(&self) -> usize {
        TAG_SIZE + self.payload_size()
    }

    /// Writes the tag, then the payload.
    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u16(Self::TAG.as_u16());
        self.write_payload(w)
    }

    /// Reads the tag and fails with [`ProtocolError::TagMismatch`] unless it
    /// is this kind's tag, then reads the payload.
    fn read(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let found = r.read_u16()?;
        let expected = Self::TAG.as_u16();
        if found != expected {
            return Err(ProtocolError::TagMismatch { expected, found });
        }
        Self::read_payload(r)
    }

    fn serialize(&self) -> Result<Bytes, ProtocolError> {
        let mut w = WireWriter::with_capacity(self.size());
        self.write(&mut w)?;
        Ok(w.freeze())
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::read(&mut WireReader::new(bytes))
    }
}

// ---------------------------------------------------------------------------
// Concrete kinds
// ---------------------------------------------------------------------------

/// Creates an agent. Sent by the server; clients mirror it locally.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spawn {
    pub kind: AgentKind,
    pub owner: PeerId,
    pub agent_id: AgentId,
    pub position: Vec3,
    pub rotation: Quat,
}

impl WireFormat for Spawn {
    const TAG: Tag = Tag::Spawn;

    fn payload_size(&self) -> usize {
        1 + 4 + 4 + VEC3_SIZE + QUAT_SIZE
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u8(self.kind as u8);
        w.write_u32(self.owner.0);
        w.write_u32(self.agent_id.0);
        w.write_vec3(self.position);
        w.write_quat(self.rotation);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind: AgentKind::try_from(r.read_u8()?)?,
            owner: PeerId(r.read_u32()?),
            agent_id: AgentId(r.read_u32()?),
            position: r.read_vec3()?,
            rotation: r.read_quat()?,
        })
    }
}

/// Handshake. The client sends `owner = 0`; the server echoes it back with
/// the assigned peer ID filled in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentityRequest {
    pub owner: PeerId,
    pub username: String,
}

impl WireFormat for IdentityRequest {
    const TAG: Tag = Tag::IdentityRequest;

    fn payload_size(&self) -> usize {
        4 + string_size(&self.username)
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_str(&self.username)
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            username: r.read_string()?,
        })
    }
}

/// A peer asks to join the match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnterGame {
    pub owner: PeerId,
}

impl WireFormat for EnterGame {
    const TAG: Tag = Tag::EnterGame;

    fn payload_size(&self) -> usize {
        4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
        })
    }
}

/// Character pose. Only the x/y plane and the yaw travel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterSync {
    pub owner: PeerId,
    pub agent_id: AgentId,
    pub position: Vec2,
    pub rotation_y: f32,
}

impl WireFormat for CharacterSync {
    const TAG: Tag = Tag::CharacterSync;

    fn payload_size(&self) -> usize {
        4 + 4 + VEC2_SIZE + 4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_u32(self.agent_id.0);
        w.write_vec2(self.position);
        w.write_f32(self.rotation_y);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            agent_id: AgentId(r.read_u32()?),
            position: r.read_vec2()?,
            rotation_y: r.read_f32()?,
        })
    }
}

/// The current stroke of a drawing agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingSync {
    pub owner: PeerId,
    pub agent_id: AgentId,
    pub start: Vec2,
    pub end: Vec2,
}

impl WireFormat for DrawingSync {
    const TAG: Tag = Tag::DrawingSync;

    fn payload_size(&self) -> usize {
        4 + 4 + VEC2_SIZE * 2
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_u32(self.agent_id.0);
        w.write_vec2(self.start);
        w.write_vec2(self.end);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            agent_id: AgentId(r.read_u32()?),
            start: r.read_vec2()?,
            end: r.read_vec2()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlatformSync {
    pub owner: PeerId,
    pub agent_id: AgentId,
    pub position: Vec2,
}

impl WireFormat for PlatformSync {
    const TAG: Tag = Tag::PlatformSync;

    fn payload_size(&self) -> usize {
        4 + 4 + VEC2_SIZE
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_u32(self.agent_id.0);
        w.write_vec2(self.position);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            agent_id: AgentId(r.read_u32()?),
            position: r.read_vec2()?,
        })
    }
}

/// An ordered batch of other messages, groups included.
///
/// Payload is `[i32 count]` followed by `count` complete tag-prefixed
/// members. A member with an unknown tag fails the whole decode because
/// there is no way to know how many bytes to skip. Nesting past
/// [`MAX_GROUP_DEPTH`](crate::MAX_GROUP_DEPTH) fails with
/// [`ProtocolError::NestingTooDeep`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub messages: Vec<Message>,
}

impl Group {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, msg: impl Into<Message>) {
        self.messages.push(msg.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<Message> for Group {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl WireFormat for Group {
    const TAG: Tag = Tag::Group;

    fn payload_size(&self) -> usize {
        LEN_SIZE + self.messages.iter().map(Message::size).sum::<usize>()
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        let count = i32::try_from(self.messages.len())
            .map_err(|_| ProtocolError::TooLong(self.messages.len()))?;
        w.enter_group()?;
        w.write_i32(count);
        for msg in &self.messages {
            msg.write(w)?;
        }
        w.leave_group();
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        r.enter_group()?;
        let count = r.read_i32()?;
        let count = usize::try_from(count).map_err(|_| ProtocolError::NegativeCount(count))?;
        // Each member is at least a tag, so a bogus count can't force a
        // huge allocation.
        let mut messages = Vec::with_capacity(count.min(r.remaining() / TAG_SIZE));
        for _ in 0..count {
            messages.push(Message::read(r)?);
        }
        r.leave_group();
        Ok(Self { messages })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chat {
    pub sender: PeerId,
    pub text: String,
}

impl WireFormat for Chat {
    const TAG: Tag = Tag::Chat;

    fn payload_size(&self) -> usize {
        4 + string_size(&self.text)
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.sender.0);
        w.write_str(&self.text)
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            sender: PeerId(r.read_u32()?),
            text: r.read_string()?,
        })
    }
}

/// One line of the server's roster: a peer ID and its display name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RosterEntry {
    pub owner: PeerId,
    pub username: String,
}

impl WireFormat for RosterEntry {
    const TAG: Tag = Tag::RosterEntry;

    fn payload_size(&self) -> usize {
        4 + string_size(&self.username)
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_str(&self.username)
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            username: r.read_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub phase: GamePhase,
}

impl WireFormat for GameState {
    const TAG: Tag = Tag::GameState;

    fn payload_size(&self) -> usize {
        1
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u8(self.phase as u8);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            phase: GamePhase::try_from(r.read_u8()?)?,
        })
    }
}

/// Remaining match time. Whole seconds on the wire: the fraction is
/// truncated toward zero and out-of-range values saturate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSync {
    pub remaining_seconds: f32,
}

impl WireFormat for TimeSync {
    const TAG: Tag = Tag::TimeSync;

    fn payload_size(&self) -> usize {
        4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_i32(self.remaining_seconds as i32);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            remaining_seconds: r.read_i32()? as f32,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreSync {
    pub score: i32,
}

impl WireFormat for ScoreSync {
    const TAG: Tag = Tag::ScoreSync;

    fn payload_size(&self) -> usize {
        4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_i32(self.score);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            score: r.read_i32()?,
        })
    }
}

/// Removal notice for one agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delete {
    pub owner: PeerId,
    pub agent_id: AgentId,
}

impl WireFormat for Delete {
    const TAG: Tag = Tag::Delete;

    fn payload_size(&self) -> usize {
        4 + 4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        w.write_u32(self.agent_id.0);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
            agent_id: AgentId(r.read_u32()?),
        })
    }
}

/// Liveness heartbeat from a client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ping {
    pub owner: PeerId,
}

impl WireFormat for Ping {
    const TAG: Tag = Tag::Ping;

    fn payload_size(&self) -> usize {
        4
    }

    fn write_payload(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
        w.write_u32(self.owner.0);
        Ok(())
    }

    fn read_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            owner: PeerId(r.read_u32()?),
        })
    }
}

// ---------------------------------------------------------------------------
// Message enum and registry
// ---------------------------------------------------------------------------

// Each variant wraps the struct of the same name, and the same name is the
// `Tag` variant, so one list drives the enum, dispatch by tag, and the
// `From` conversions.
macro_rules! message_kinds {
    ($($kind:ident),* $(,)?) => {
        /// Any message, tagged by kind.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($kind($kind),)*
        }

        impl Message {
            pub fn tag(&self) -> Tag {
                match self {
                    $(Self::$kind(_) => <$kind as WireFormat>::TAG,)*
                }
            }

            /// Encoded length, tag included.
            pub fn size(&self) -> usize {
                match self {
                    $(Self::$kind(m) => m.size(),)*
                }
            }

            pub fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError> {
                match self {
                    $(Self::$kind(m) => m.write(w),)*
                }
            }

            /// A zero-valued instance of the kind named by `tag`.
            pub fn empty(tag: Tag) -> Self {
                match tag {
                    $(Tag::$kind => Self::$kind($kind::default()),)*
                }
            }

            fn read_kind(tag: Tag, r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
                match tag {
                    $(Tag::$kind => $kind::read(r).map(Self::$kind),)*
                }
            }
        }

        $(
            impl From<$kind> for Message {
                fn from(msg: $kind) -> Self {
                    Self::$kind(msg)
                }
            }
        )*
    };
}

message_kinds!(
    Spawn,
    IdentityRequest,
    EnterGame,
    CharacterSync,
    DrawingSync,
    PlatformSync,
    Group,
    Chat,
    RosterEntry,
    GameState,
    TimeSync,
    ScoreSync,
    Delete,
    Ping,
);

impl Message {
    /// Reads one message, choosing the kind from the tag in front of it.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownTag`] if the tag names no kind, or any
    /// framing error from the payload.
    pub fn read(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let raw = r.peek_u16()?;
        let tag = Tag::from_u16(raw).ok_or(ProtocolError::UnknownTag(raw))?;
        Self::read_kind(tag, r)
    }

    /// Decodes a whole datagram. Trailing bytes after the message are
    /// ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::read(&mut WireReader::new(bytes))
    }

    /// Encodes into a buffer preallocated to [`Message::size`].
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut w = WireWriter::with_capacity(self.size());
        self.write(&mut w)?;
        Ok(w.freeze())
    }

    /// `true` for the three per-agent sync kinds.
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            Self::CharacterSync(_) | Self::DrawingSync(_) | Self::PlatformSync(_)
        )
    }
}

/// Registry lookup: a zero-valued message for a raw wire tag, or `None` if
/// the tag names no kind. Callers decide whether that is fatal.
pub fn create(raw_tag: u16) -> Option<Message> {
    Tag::from_u16(raw_tag).map(Message::empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_returns_zero_valued_variant() {
        let msg = create(Tag::Chat.as_u16()).unwrap();
        assert_eq!(msg, Message::Chat(Chat::default()));
        assert_eq!(msg.tag(), Tag::Chat);
    }

    #[test]
    fn test_create_covers_every_tag() {
        for tag in Tag::ALL {
            assert_eq!(create(tag.as_u16()).map(|m| m.tag()), Some(tag));
        }
    }

    #[test]
    fn test_create_unknown_tag_is_none() {
        assert_eq!(create(0), None);
        assert_eq!(create(99), None);
    }

    #[test]
    fn test_serialize_writes_tag_first() {
        let bytes = Ping { owner: PeerId(5) }.serialize().unwrap();
        assert_eq!(&bytes[..], &[14, 0, 5, 0, 0, 0]);
    }

    #[test]
    fn test_deserialize_rejects_other_kinds_tag() {
        let bytes = EnterGame { owner: PeerId(1) }.serialize().unwrap();
        assert_eq!(
            Ping::deserialize(&bytes),
            Err(ProtocolError::TagMismatch { expected: 14, found: 3 })
        );
    }

    #[test]
    fn test_time_sync_truncates_fraction() {
        let bytes = TimeSync { remaining_seconds: 42.9 }.serialize().unwrap();
        let back = TimeSync::deserialize(&bytes).unwrap();
        assert_eq!(back.remaining_seconds, 42.0);

        let bytes = TimeSync { remaining_seconds: -3.7 }.serialize().unwrap();
        assert_eq!(TimeSync::deserialize(&bytes).unwrap().remaining_seconds, -3.0);
    }

    #[test]
    fn test_group_size_counts_header_and_members() {
        let mut group = Group::default();
        group.push(Ping { owner: PeerId(1) });
        group.push(EnterGame { owner: PeerId(2) });
        // tag + count + (tag + u32) * 2
        assert_eq!(group.size(), 2 + 4 + 6 + 6);
    }

    #[test]
    fn test_negative_group_count_is_rejected() {
        let mut w = WireWriter::new();
        w.write_u16(Tag::Group.as_u16());
        w.write_i32(-2);
        let bytes = w.freeze();
        assert_eq!(Message::decode(&bytes), Err(ProtocolError::NegativeCount(-2)));
    }

    #[test]
    fn test_invalid_agent_kind_byte_fails_spawn_decode() {
        let mut bytes = Spawn::default().serialize().unwrap().to_vec();
        bytes[2] = 7;
        assert!(matches!(
            Message::decode(&bytes),
            Err(ProtocolError::InvalidEnum { value: 7, .. })
        ));
    }

    #[test]
    fn test_is_sync() {
        assert!(Message::from(PlatformSync::default()).is_sync());
        assert!(!Message::from(Delete::default()).is_sync());
    }
}
