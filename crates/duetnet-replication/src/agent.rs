//! The [`Agent`] trait and the three concrete agent kinds.
//!
//! An agent has two halves:
//!
//! - **Authoritative state**: what its owner sets directly (the game
//!   layer moving a character, extending a stroke, sliding a platform).
//!   When it differs from what was last collected, the agent is dirty.
//! - **Ghost state**: on every peer that does not own it, the agent
//!   tracks a target received from the network and eases toward it in
//!   [`Agent::interpolate`]. Drawings skip the easing and apply directly.

use std::any::Any;
use std::fmt;

use duetnet_protocol::{
    AgentId, AgentKind, CharacterSync, DrawingSync, Message, PeerId, PlatformSync, Quat, Spawn,
    Vec2, Vec3,
};

// ---------------------------------------------------------------------------
// Identity and pose
// ---------------------------------------------------------------------------

/// Fields every agent carries, whatever its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentIdentity {
    pub kind: AgentKind,
    pub owner: PeerId,
    pub id: AgentId,
    /// Replicate this agent whenever it is dirty.
    pub force_sync: bool,
}

/// Position and rotation, as carried by a Spawn message.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Origin with no rotation.
    pub const fn origin() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

// ---------------------------------------------------------------------------
// Agent trait
// ---------------------------------------------------------------------------

/// A replicated object.
///
/// Implementors provide the kind-specific parts: the dirty predicate, the
/// sync message, and how to apply one. The provided methods add the
/// force-sync gate and the self-authority check.
pub trait Agent: Any + Send + fmt::Debug {
    fn identity(&self) -> &AgentIdentity;

    /// Current pose, used when announcing the agent in a Spawn.
    fn pose(&self) -> Pose;

    /// `true` if replicable state changed since the last collect.
    fn is_dirty(&self) -> bool;

    /// Builds this agent's sync message and marks the current state as
    /// sent.
    fn collect_sync(&mut self) -> Message;

    /// Applies a sync message from the network to the ghost state.
    /// Returns `false` if the message is the wrong kind for this agent.
    fn apply_remote(&mut self, msg: &Message) -> bool;

    /// Eases ghost state toward its target. `dt` is the frame time in
    /// seconds; `rate` scales it into a lerp factor.
    fn interpolate(&mut self, _dt: f32, _rate: f32) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn needs_sync(&self) -> bool {
        self.identity().force_sync && self.is_dirty()
    }

    fn collect_sync_if_dirty(&mut self) -> Option<Message> {
        self.needs_sync().then(|| self.collect_sync())
    }

    /// Applies `msg` unless `local` owns this agent. An owner never takes
    /// its own state back from the network.
    fn apply_sync(&mut self, msg: &Message, local: PeerId) -> bool {
        if self.identity().owner == local {
            return false;
        }
        self.apply_remote(msg)
    }

    fn spawn_message(&self) -> Spawn {
        let identity = self.identity();
        let pose = self.pose();
        Spawn {
            kind: identity.kind,
            owner: identity.owner,
            agent_id: identity.id,
            position: pose.position,
            rotation: pose.rotation,
        }
    }
}

/// Builds the concrete agent for `identity.kind`.
pub(crate) fn build(identity: AgentIdentity, pose: Pose) -> Box<dyn Agent> {
    match identity.kind {
        AgentKind::Character => Box::new(CharacterAgent::new(identity, pose)),
        AgentKind::Drawing => Box::new(DrawingAgent::new(identity, pose)),
        AgentKind::Platform => Box::new(PlatformAgent::new(identity, pose)),
    }
}

// ---------------------------------------------------------------------------
// CharacterAgent
// ---------------------------------------------------------------------------

/// The running, jumping player. Replicates its plane position and yaw.
#[derive(Debug, Clone)]
pub struct CharacterAgent {
    identity: AgentIdentity,
    position: Vec3,
    rotation_y: f32,
    target: Vec3,
    sent_position: Vec3,
    sent_rotation_y: f32,
}

impl CharacterAgent {
    pub fn new(identity: AgentIdentity, pose: Pose) -> Self {
        let rotation_y = pose.rotation.yaw_degrees();
        Self {
            identity,
            position: pose.position,
            rotation_y,
            target: pose.position,
            sent_position: pose.position,
            sent_rotation_y: rotation_y,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// Where the ghost is heading.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation_y(&mut self, degrees: f32) {
        self.rotation_y = degrees;
    }
}

impl Agent for CharacterAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }


    fn pose(&self) -> Pose {
        Pose::new(self.position, Quat::from_yaw_degrees(self.rotation_y))
    }

    fn is_dirty(&self) -> bool {
        self.position != self.sent_position || self.rotation_y != self.sent_rotation_y
    }

    fn collect_sync(&mut self) -> Message {
        self.sent_position = self.position;
        self.sent_rotation_y = self.rotation_y;
        CharacterSync {
            owner: self.identity.owner,
            agent_id: self.identity.id,
            position: self.position.truncate(),
            rotation_y: self.rotation_y,
        }
        .into()
    }

    fn apply_remote(&mut self, msg: &Message) -> bool {
        let Message::CharacterSync(sync) = msg else {
            return false;
        };
        self.target = sync.position.extend();
        // Facing flips between two values; easing it would look wrong.
        self.rotation_y = sync.rotation_y;
        true
    }

    fn interpolate(&mut self, dt: f32, rate: f32) {
        self.position = self.position.lerp(self.target, dt * rate);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// DrawingAgent
// ---------------------------------------------------------------------------

/// The second player's free-hand line. Replicates the current stroke's
/// endpoints, applied as received.
#[derive(Debug, Clone)]
pub struct DrawingAgent {
    identity: AgentIdentity,
    origin: Pose,
    start: Vec2,
    end: Vec2,
    sent: (Vec2, Vec2),
}

impl DrawingAgent {
    pub fn new(identity: AgentIdentity, origin: Pose) -> Self {
        Self {
            identity,
            origin,
            start: Vec2::ZERO,
            end: Vec2::ZERO,
            sent: (Vec2::ZERO, Vec2::ZERO),
        }
    }

    pub fn stroke(&self) -> (Vec2, Vec2) {
        (self.start, self.end)
    }

    pub fn set_stroke(&mut self, start: Vec2, end: Vec2) {
        self.start = start;
        self.end = end;
    }
}

impl Agent for DrawingAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }


    fn pose(&self) -> Pose {
        self.origin
    }

    fn is_dirty(&self) -> bool {
        (self.start, self.end) != self.sent
    }

    fn collect_sync(&mut self) -> Message {
        self.sent = (self.start, self.end);
        DrawingSync {
            owner: self.identity.owner,
            agent_id: self.identity.id,
            start: self.start,
            end: self.end,
        }
        .into()
    }

    fn apply_remote(&mut self, msg: &Message) -> bool {
        let Message::DrawingSync(sync) = msg else {
            return false;
        };
        self.start = sync.start;
        self.end = sync.end;
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// PlatformAgent
// ---------------------------------------------------------------------------

/// An environmental moving platform, owned by nobody and driven by the
/// server.
#[derive(Debug, Clone)]
pub struct PlatformAgent {
    identity: AgentIdentity,
    position: Vec3,
    rotation: Quat,
    target: Vec3,
    sent_position: Vec3,
}

impl PlatformAgent {
    pub fn new(identity: AgentIdentity, pose: Pose) -> Self {
        Self {
            identity,
            position: pose.position,
            rotation: pose.rotation,
            target: pose.position,
            sent_position: pose.position,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

impl Agent for PlatformAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }


    fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    fn is_dirty(&self) -> bool {
        self.position != self.sent_position
    }

    fn collect_sync(&mut self) -> Message {
        self.sent_position = self.position;
        PlatformSync {
            owner: self.identity.owner,
            agent_id: self.identity.id,
            position: self.position.truncate(),
        }
        .into()
    }

    fn apply_remote(&mut self, msg: &Message) -> bool {
        let Message::PlatformSync(sync) = msg else {
            return false;
        };
        self.target = sync.position.extend();
        true
    }

    fn interpolate(&mut self, dt: f32, rate: f32) {
        self.position = self.position.lerp(self.target, dt * rate);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(kind: AgentKind, owner: u32, force_sync: bool) -> AgentIdentity {
        AgentIdentity {
            kind,
            owner: PeerId(owner),
            id: AgentId(1),
            force_sync,
        }
    }

    #[test]
    fn test_character_is_clean_after_spawn_and_dirty_after_move() {
        let mut agent = CharacterAgent::new(identity(AgentKind::Character, 1, true), Pose::origin());
        assert!(!agent.needs_sync());

        agent.set_position(Vec3::new(1.0, 2.0, 0.0));
        assert!(agent.needs_sync());

        let msg = agent.collect_sync_if_dirty().unwrap();
        assert_eq!(
            msg,
            Message::CharacterSync(CharacterSync {
                owner: PeerId(1),
                agent_id: AgentId(1),
                position: Vec2::new(1.0, 2.0),
                rotation_y: 0.0,
            })
        );
        assert!(agent.collect_sync_if_dirty().is_none());
    }

    #[test]
    fn test_yaw_change_alone_marks_character_dirty() {
        let mut agent = CharacterAgent::new(identity(AgentKind::Character, 1, true), Pose::origin());
        agent.set_rotation_y(180.0);
        assert!(agent.is_dirty());
    }

    #[test]
    fn test_dirty_agent_without_force_sync_is_not_collected() {
        let mut agent = PlatformAgent::new(identity(AgentKind::Platform, 0, false), Pose::origin());
        agent.set_position(Vec3::new(5.0, 0.0, 0.0));
        assert!(agent.is_dirty());
        assert!(!agent.needs_sync());
        assert!(agent.collect_sync_if_dirty().is_none());
    }

    #[test]
    fn test_owner_ignores_sync_for_its_own_agent() {
        let mut agent = CharacterAgent::new(identity(AgentKind::Character, 2, true), Pose::origin());
        let msg = Message::CharacterSync(CharacterSync {
            owner: PeerId(2),
            agent_id: AgentId(1),
            position: Vec2::new(9.0, 9.0),
            rotation_y: 180.0,
        });
        assert!(!agent.apply_sync(&msg, PeerId(2)));
        assert_eq!(agent.target(), Vec3::ZERO);
        assert_eq!(agent.rotation_y(), 0.0);
    }

    #[test]
    fn test_ghost_character_eases_toward_target() {
        let mut agent = CharacterAgent::new(identity(AgentKind::Character, 2, false), Pose::origin());
        let msg = Message::CharacterSync(CharacterSync {
            owner: PeerId(2),
            agent_id: AgentId(1),
            position: Vec2::new(10.0, 0.0),
            rotation_y: 180.0,
        });
        assert!(agent.apply_sync(&msg, PeerId(1)));
        assert_eq!(agent.rotation_y(), 180.0, "yaw snaps");
        assert_eq!(agent.position(), Vec3::ZERO, "position waits for interpolation");

        agent.interpolate(0.25, 2.0);
        assert_eq!(agent.position(), Vec3::new(5.0, 0.0, 0.0));
        agent.interpolate(1.0, 2.0);
        assert_eq!(agent.position(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_drawing_applies_stroke_directly() {
        let mut agent = DrawingAgent::new(identity(AgentKind::Drawing, 2, false), Pose::origin());
        let msg = Message::DrawingSync(DrawingSync {
            owner: PeerId(2),
            agent_id: AgentId(1),
            start: Vec2::new(1.0, 1.0),
            end: Vec2::new(2.0, 3.0),
        });
        assert!(agent.apply_sync(&msg, PeerId(1)));
        assert_eq!(agent.stroke(), (Vec2::new(1.0, 1.0), Vec2::new(2.0, 3.0)));
    }

    #[test]
    fn test_wrong_sync_kind_is_rejected() {
        let mut agent = PlatformAgent::new(identity(AgentKind::Platform, 0, false), Pose::origin());
        let msg = Message::DrawingSync(DrawingSync::default());
        assert!(!agent.apply_sync(&msg, PeerId(1)));
    }

    #[test]
    fn test_spawn_message_carries_identity_and_pose() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        let agent = PlatformAgent::new(identity(AgentKind::Platform, 0, true), pose);
        let spawn = agent.spawn_message();
        assert_eq!(spawn.kind, AgentKind::Platform);
        assert_eq!(spawn.owner, PeerId::UNOWNED);
        assert_eq!(spawn.agent_id, AgentId(1));
        assert_eq!(spawn.position, pose.position);
    }
}
