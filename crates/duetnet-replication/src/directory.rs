//! The agent directory: sole owner of every agent in this process.
//!
//! Two maps are kept in lockstep, agent ID → agent and agent ID → owner.
//! Every insert and removal touches both, so they always have the same
//! keys. `BTreeMap` keeps iteration in agent-ID order, which makes sync
//! batches and spawn broadcasts deterministic.

use std::collections::BTreeMap;

use duetnet_protocol::{AgentId, AgentKind, Message, PeerId, Role};

use crate::agent::{self, Agent, AgentIdentity, Pose};
use crate::ReplicationError;

#[derive(Debug)]
pub struct AgentDirectory {
    role: Role,
    local_peer: PeerId,
    /// Last ID allocated. Server only; starts at 0 so the first agent is 1.
    last_agent_id: u32,
    agents: BTreeMap<AgentId, Box<dyn Agent>>,
    owners: BTreeMap<AgentId, PeerId>,
}

impl AgentDirectory {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            local_peer: PeerId::UNOWNED,
            last_agent_id: 0,
            agents: BTreeMap::new(),
            owners: BTreeMap::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The peer ID this process acts as. Always unowned on the server; set
    /// on a client once the handshake reply arrives.
    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn set_local_peer(&mut self, peer: PeerId) {
        self.local_peer = peer;
    }

    /// Creates an agent.
    ///
    /// - **Server**: `requested` is ignored. The next ID is allocated and
    ///   the agent is force-synced.
    /// - **Client**: `requested` is used as-is. If that ID already exists
    ///   nothing happens and `None` is returned (a replayed spawn). The
    ///   agent is force-synced only if this client owns it.
    pub fn spawn(
        &mut self,
        kind: AgentKind,
        owner: PeerId,
        requested: AgentId,
        pose: Pose,
    ) -> Option<AgentId> {
        match self.role {
            Role::Server => Some(self.insert_allocated(kind, owner, pose)),
            Role::Client => {
                if self.agents.contains_key(&requested) {
                    tracing::debug!(agent_id = %requested, "duplicate spawn ignored");
                    return None;
                }
                let force_sync = !owner.is_unowned() && owner == self.local_peer;
                self.insert(
                    AgentIdentity {
                        kind,
                        owner,
                        id: requested,
                        force_sync,
                    },
                    pose,
                );
                Some(requested)
            }
        }
    }

    /// Server-only spawn that allocates an ID.
    ///
    /// # Errors
    /// [`ReplicationError::RoleMisuse`] on a client: clients never
    /// allocate agent IDs.
    pub fn spawn_authoritative(
        &mut self,
        kind: AgentKind,
        owner: PeerId,
        pose: Pose,
    ) -> Result<AgentId, ReplicationError> {
        if self.role != Role::Server {
            tracing::error!(role = %self.role, "spawn_authoritative called off the server");
            return Err(ReplicationError::RoleMisuse {
                operation: "spawn_authoritative",
                role: self.role,
            });
        }
        Ok(self.insert_allocated(kind, owner, pose))
    }

    fn insert_allocated(&mut self, kind: AgentKind, owner: PeerId, pose: Pose) -> AgentId {
        self.last_agent_id += 1;
        let id = AgentId(self.last_agent_id);
        self.insert(
            AgentIdentity {
                kind,
                owner,
                id,
                force_sync: true,
            },
            pose,
        );
        id
    }

    fn insert(&mut self, identity: AgentIdentity, pose: Pose) {
        tracing::info!(
            agent_id = %identity.id,
            owner = %identity.owner,
            kind = %identity.kind,
            force_sync = identity.force_sync,
            "agent spawned"
        );
        self.owners.insert(identity.id, identity.owner);
        self.agents.insert(identity.id, agent::build(identity, pose));
    }

    /// Removes every agent owned by `owner` and returns their IDs in
    /// ascending order.
    pub fn delete_by_owner(&mut self, owner: PeerId) -> Vec<AgentId> {
        let removed: Vec<AgentId> = self
            .owners
            .iter()
            .filter(|&(_, &o)| o == owner)
            .map(|(&id, _)| id)
            .collect();
        for id in &removed {
            self.owners.remove(id);
            self.agents.remove(id);
        }
        if !removed.is_empty() {
            tracing::info!(%owner, count = removed.len(), "agents deleted by owner");
        }
        removed
    }

    /// Removes one agent by ID, from both maps. Returns `false` if it did
    /// not exist.
    pub fn delete(&mut self, id: AgentId) -> bool {
        let existed = self.agents.remove(&id).is_some();
        self.owners.remove(&id);
        if existed {
            tracing::debug!(agent_id = %id, "agent deleted");
        }
        existed
    }

    /// Snapshot of agents in ID order. With `only_dirty`, only those whose
    /// [`Agent::needs_sync`] is true.
    pub fn get_all(&self, only_dirty: bool) -> Vec<&dyn Agent> {
        self.agents
            .values()
            .map(|agent| agent.as_ref())
            .filter(|agent| !only_dirty || agent.needs_sync())
            .collect()
    }

    pub fn get(&self, id: AgentId) -> Option<&dyn Agent> {
        self.agents.get(&id).map(|agent| agent.as_ref())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut (dyn Agent + 'static)> {
        self.agents.get_mut(&id).map(|agent| agent.as_mut())
    }

    /// Looks up an agent as its concrete type, e.g. a [`CharacterAgent`]
    /// the game layer wants to move.
    ///
    /// [`CharacterAgent`]: crate::CharacterAgent
    pub fn get_as<T: Agent>(&self, id: AgentId) -> Option<&T> {
        self.agents.get(&id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: Agent>(&mut self, id: AgentId) -> Option<&mut T> {
        self.agents.get_mut(&id)?.as_any_mut().downcast_mut::<T>()
    }

    pub(crate) fn agents_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Agent>> {
        self.agents.values_mut()
    }

    /// The first agent owned by `owner`, if any.
    pub fn find_by_owner(&self, owner: PeerId) -> Option<AgentId> {
        self.owners
            .iter()
            .find(|&(_, &o)| o == owner)
            .map(|(&id, _)| id)
    }

    pub fn owner_of(&self, id: AgentId) -> Option<PeerId> {
        self.owners.get(&id).copied()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// A Spawn message for every agent, in ID order.
    pub fn spawn_messages(&self) -> Vec<Message> {
        self.agents
            .values()
            .map(|agent| agent.spawn_message().into())
            .collect()
    }

    /// `true` if both maps have exactly the same keys and each agent's
    /// owner matches the owner map.
    pub fn is_consistent(&self) -> bool {
        self.agents.len() == self.owners.len()
            && self
                .agents
                .iter()
                .all(|(id, agent)| self.owners.get(id) == Some(&agent.identity().owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CharacterAgent;

    #[test]
    fn test_server_spawn_ignores_requested_id_and_increments() {
        let mut dir = AgentDirectory::new(Role::Server);
        let a = dir
            .spawn(AgentKind::Character, PeerId(1), AgentId(500), Pose::origin())
            .unwrap();
        let b = dir
            .spawn(AgentKind::Drawing, PeerId(2), AgentId(500), Pose::origin())
            .unwrap();
        assert_eq!(a, AgentId(1));
        assert_eq!(b, AgentId(2));
        assert!(dir.get(a).unwrap().identity().force_sync);
        assert!(dir.get(b).unwrap().identity().force_sync);
    }

    #[test]
    fn test_client_spawn_uses_requested_id_and_drops_duplicates() {
        let mut dir = AgentDirectory::new(Role::Client);
        dir.set_local_peer(PeerId(2));
        assert_eq!(
            dir.spawn(AgentKind::Character, PeerId(1), AgentId(7), Pose::origin()),
            Some(AgentId(7))
        );
        assert_eq!(
            dir.spawn(AgentKind::Drawing, PeerId(2), AgentId(7), Pose::origin()),
            None
        );
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(AgentId(7)).unwrap().identity().kind, AgentKind::Character);
    }

    #[test]
    fn test_client_force_sync_only_for_own_agents() {
        let mut dir = AgentDirectory::new(Role::Client);
        dir.set_local_peer(PeerId(2));
        dir.spawn(AgentKind::Character, PeerId(1), AgentId(1), Pose::origin());
        dir.spawn(AgentKind::Drawing, PeerId(2), AgentId(2), Pose::origin());
        dir.spawn(AgentKind::Platform, PeerId::UNOWNED, AgentId(3), Pose::origin());

        let flags: Vec<bool> = dir
            .get_all(false)
            .iter()
            .map(|agent| agent.identity().force_sync)
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_delete_by_owner_removes_both_mappings() {
        let mut dir = AgentDirectory::new(Role::Server);
        let mine = dir
            .spawn(AgentKind::Character, PeerId(1), AgentId(0), Pose::origin())
            .unwrap();
        let theirs = dir
            .spawn(AgentKind::Drawing, PeerId(2), AgentId(0), Pose::origin())
            .unwrap();

        assert_eq!(dir.delete_by_owner(PeerId(1)), vec![mine]);
        assert!(!dir.contains(mine));
        assert_eq!(dir.owner_of(mine), None);
        assert!(dir.contains(theirs));
        assert!(dir.is_consistent());

        assert!(dir.delete_by_owner(PeerId(1)).is_empty());
    }

    #[test]
    fn test_delete_by_id_leaves_siblings_and_mappings_consistent() {
        let mut dir = AgentDirectory::new(Role::Server);
        let first = dir
            .spawn(AgentKind::Character, PeerId(1), AgentId(0), Pose::origin())
            .unwrap();
        let second = dir
            .spawn(AgentKind::Platform, PeerId::UNOWNED, AgentId(0), Pose::origin())
            .unwrap();

        assert!(dir.delete(first));
        assert!(!dir.delete(first));
        assert_eq!(dir.owner_of(first), None);
        assert_eq!(dir.owner_of(second), Some(PeerId::UNOWNED));
        assert_eq!(dir.len(), 1);
        assert!(dir.is_consistent());
    }

    #[test]
    fn test_spawn_authoritative_is_server_only() {
        let mut client = AgentDirectory::new(Role::Client);
        assert_eq!(
            client.spawn_authoritative(AgentKind::Platform, PeerId::UNOWNED, Pose::origin()),
            Err(ReplicationError::RoleMisuse {
                operation: "spawn_authoritative",
                role: Role::Client,
            })
        );
        assert!(client.is_empty());
    }

    #[test]
    fn test_get_all_only_dirty_filters() {
        let mut dir = AgentDirectory::new(Role::Server);
        let a = dir
            .spawn(AgentKind::Character, PeerId(1), AgentId(0), Pose::origin())
            .unwrap();
        dir.spawn(AgentKind::Character, PeerId(2), AgentId(0), Pose::origin());
        assert!(dir.get_all(true).is_empty());

        dir.get_as_mut::<CharacterAgent>(a)
            .unwrap()
            .set_position(duetnet_protocol::Vec3::new(1.0, 0.0, 0.0));
        let dirty = dir.get_all(true);
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].identity().id, a);
    }

    #[test]
    fn test_get_as_wrong_type_is_none() {
        let mut dir = AgentDirectory::new(Role::Server);
        let id = dir
            .spawn(AgentKind::Platform, PeerId::UNOWNED, AgentId(0), Pose::origin())
            .unwrap();
        assert!(dir.get_as::<CharacterAgent>(id).is_none());
    }
}
