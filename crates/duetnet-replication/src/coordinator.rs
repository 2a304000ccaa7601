//! Per-tick replication: what to send, and where inbound sync goes.

use duetnet_protocol::{AgentId, Group, Message};

use crate::AgentDirectory;

/// Outcome of [`ReplicationCoordinator::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The agent's ghost state was updated.
    Updated(AgentId),
    /// This process owns the agent; the message was ignored.
    OwnedLocally(AgentId),
    /// No agent with that ID (already deleted, or not spawned yet).
    UnknownAgent(AgentId),
    /// The message was not a sync message, or the wrong kind for the agent.
    Rejected,
}

/// Batches outgoing sync and routes incoming sync.
///
/// Holds no agent state itself; every call borrows the directory.
#[derive(Debug, Clone)]
pub struct ReplicationCoordinator {
    interpolation_rate: f32,
}

impl ReplicationCoordinator {
    pub fn new(interpolation_rate: f32) -> Self {
        Self { interpolation_rate }
    }

    pub fn interpolation_rate(&self) -> f32 {
        self.interpolation_rate
    }

    /// Collects a sync message from every force-synced, dirty agent, in ID
    /// order, and packs them into one Group. `None` when nothing changed,
    /// so idle ticks send nothing.
    pub fn collect(&self, directory: &mut AgentDirectory) -> Option<Group> {
        let group: Group = directory
            .agents_mut()
            .filter_map(|agent| agent.collect_sync_if_dirty())
            .collect();
        if group.is_empty() {
            return None;
        }
        tracing::trace!(count = group.len(), "collected sync batch");
        Some(group)
    }

    /// Routes one inbound sync message to the agent it names.
    pub fn apply(&self, directory: &mut AgentDirectory, msg: &Message) -> Applied {
        let agent_id = match msg {
            Message::CharacterSync(m) => m.agent_id,
            Message::DrawingSync(m) => m.agent_id,
            Message::PlatformSync(m) => m.agent_id,
            _ => return Applied::Rejected,
        };

        let local = directory.local_peer();
        let Some(agent) = directory.get_mut(agent_id) else {
            tracing::trace!(%agent_id, "sync for unknown agent");
            return Applied::UnknownAgent(agent_id);
        };
        if agent.identity().owner == local {
            return Applied::OwnedLocally(agent_id);
        }
        if agent.apply_sync(msg, local) {
            Applied::Updated(agent_id)
        } else {
            tracing::debug!(%agent_id, tag = %msg.tag(), "sync kind does not match agent");
            Applied::Rejected
        }
    }

    /// Eases every agent this process does not own toward its target.
    pub fn interpolate(&self, directory: &mut AgentDirectory, dt: f32) {
        let local = directory.local_peer();
        let rate = self.interpolation_rate;
        for agent in directory.agents_mut() {
            if agent.identity().owner != local {
                agent.interpolate(dt, rate);
            }
        }
    }
}

impl Default for ReplicationCoordinator {
    fn default() -> Self {
        Self::new(2.0)
    }
}
