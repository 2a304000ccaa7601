//! # duetnet
//!
//! Client/server networking core for a two-player platformer.
//!
//! One process is the server, every other process is a client. Each owns a
//! single [`NetManager`] and calls [`NetManager::update`] once per frame.
//! The manager pumps the transport, dispatches every decoded message to the
//! handlers registered for its tag, and replicates changed agents on a
//! fixed interval.
//!
//! ## Layers
//!
//! ```text
//! NetManager (this crate)   ← dispatch table, role handlers, timers
//!     ↕
//! duetnet-replication       ← agent directory, sync batching, ghosts
//! duetnet-session           ← peer IDs, roster, match entry
//!     ↕
//! duetnet-protocol          ← binary codec, message kinds
//! duetnet-transport         ← UDP / memory drivers, reliability window
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use duetnet::NetManager;
//!
//! # async fn run() -> Result<(), duetnet::NetError> {
//! let mut server = NetManager::builder().port(9000).start_server().await?;
//! loop {
//!     server.update(Duration::from_millis(16));
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod handlers;
mod hooks;
mod manager;
mod node;

pub use config::NetConfig;
pub use dispatch::{DispatchTable, Handler, HandlerId};
pub use error::NetError;
pub use hooks::{ChatSink, GameHooks, LogChat, LogHooks};
pub use manager::{NetContext, NetManager, NetManagerBuilder};
pub use node::{Inbound, NetNode};

/// Everything a game layer usually needs, in one import.
pub mod prelude {
    pub use crate::{ChatSink, GameHooks, NetConfig, NetError, NetManager};
    pub use duetnet_protocol::{
        AgentId, AgentKind, GamePhase, Message, PeerId, Quat, Role, Tag, Vec2, Vec3,
    };
    pub use duetnet_replication::{
        Agent, AgentDirectory, CharacterAgent, DrawingAgent, PlatformAgent, Pose,
    };
    pub use duetnet_session::PLAYERS_PER_MATCH;
    pub use duetnet_transport::{ConnectionId, memory_server};
}
