//! Replicated agents for duetnet.
//!
//! - **Agents** ([`Agent`] trait, [`CharacterAgent`], [`DrawingAgent`],
//!   [`PlatformAgent`]): the simulated objects whose state is mirrored
//!   across peers. Each one knows how to build its sync message and how to
//!   apply one.
//! - **Directory** ([`AgentDirectory`]): owns every agent, maps agent IDs
//!   to owners, and allocates IDs on the server.
//! - **Coordinator** ([`ReplicationCoordinator`]): batches dirty agents
//!   into one Group per sync tick and routes inbound sync to the right
//!   agent.
//!
//! Nothing here touches the network. The caller sends what
//! [`ReplicationCoordinator::collect`] returns and feeds received sync
//! messages to [`ReplicationCoordinator::apply`].

mod agent;
mod coordinator;
mod directory;
mod error;

pub use agent::{Agent, AgentIdentity, CharacterAgent, DrawingAgent, PlatformAgent, Pose};
pub use coordinator::{Applied, ReplicationCoordinator};
pub use directory::AgentDirectory;
pub use error::ReplicationError;
