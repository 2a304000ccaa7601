//! `NetManager`: the one object a game process owns for networking.
//!
//! It ties the layers together: node (transport) → dispatch → roster,
//! directory and coordinator. The host loop calls
//! [`update`](NetManager::update) once per frame; everything else happens
//! inside that call.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use duetnet_protocol::{
    AgentId, AgentKind, Chat, EnterGame, GamePhase, GameState, Group, IdentityRequest, Message,
    PeerId, Ping, Role, ScoreSync, Tag, TimeSync,
};
use duetnet_replication::{AgentDirectory, Pose, ReplicationCoordinator};
use duetnet_session::Roster;
use duetnet_tick::IntervalTimer;
use duetnet_transport::{ConnectionId, Driver, UdpDriver};
use tokio::time::Instant;

use crate::dispatch::{DispatchTable, HandlerId};
use crate::hooks::{ChatSink, GameHooks};
use crate::node::NetNode;
use crate::{NetConfig, NetError, handlers};

// ---------------------------------------------------------------------------
// NetContext
// ---------------------------------------------------------------------------

/// The state every handler mutates.
///
/// Handlers registered through [`NetManager::register`] receive this.
pub struct NetContext {
    pub(crate) node: NetNode,
    pub(crate) directory: AgentDirectory,
    pub(crate) roster: Roster,
    pub(crate) coordinator: ReplicationCoordinator,
    pub(crate) hooks: Box<dyn GameHooks>,
    pub(crate) chat: Box<dyn ChatSink>,
    /// Group members waiting to be dispatched, front first.
    pub(crate) deferred: VecDeque<(ConnectionId, Message)>,
    /// Client: the peer ID the server assigned. Unowned until then.
    pub(crate) local_peer: PeerId,
    /// Client: whether our own roster line has been shown.
    pub(crate) greeted: bool,
}

impl NetContext {
    pub fn role(&self) -> Role {
        self.node.role()
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut AgentDirectory {
        &mut self.directory
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Broadcasts from inside a handler. Handlers cannot return errors, so
    /// an encode failure is logged here.
    pub fn broadcast(&mut self, msg: impl Into<Message>) {
        let msg = msg.into();
        if let Err(e) = self.node.broadcast(&msg) {
            tracing::error!(tag = %msg.tag(), error = %e, "broadcast failed");
        }
    }

    /// Sends to one connection from inside a handler.
    pub fn send_to(&mut self, conn: ConnectionId, msg: impl Into<Message>) {
        let msg = msg.into();
        if let Err(e) = self.node.send_to(conn, &msg) {
            tracing::warn!(%conn, tag = %msg.tag(), error = %e, "send failed");
        }
    }

    /// Queues a Group's members for dispatch right after the current
    /// handler list, in order. Nested groups unfold in place.
    pub(crate) fn defer_group(&mut self, conn: ConnectionId, group: &Group) {
        for member in group.messages.iter().rev() {
            self.deferred.push_front((conn, member.clone()));
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a [`NetManager`].
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = NetManager::builder()
///     .port(9000)
///     .chat(LogChat)
///     .start_server()
///     .await?;
/// ```
pub struct NetManagerBuilder {
    config: NetConfig,
    hooks: Box<dyn GameHooks>,
    chat: Box<dyn ChatSink>,
}

impl NetManagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: NetConfig::default(),
            hooks: Box::new(()),
            chat: Box::new(()),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: NetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn hooks(mut self, hooks: impl GameHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn chat(mut self, chat: impl ChatSink + 'static) -> Self {
        self.chat = Box::new(chat);
        self
    }

    /// Starts whichever side `config.role` names.
    pub async fn start(self) -> Result<NetManager, NetError> {
        match self.config.role {
            Role::Server => self.start_server().await,
            Role::Client => self.start_client().await,
        }
    }

    /// Binds a UDP socket on `host:port` and starts a server.
    ///
    /// # Errors
    /// [`NetError::Transport`] if the bind fails. No manager is produced.
    pub async fn start_server(mut self) -> Result<NetManager, NetError> {
        self.config.role = Role::Server;
        let driver = UdpDriver::bind(&self.config.addr(), self.config.link_config()).await?;
        Ok(self.build(NetNode::server(Box::new(driver))))
    }

    /// Connects to a server at `host:port` and starts a client.
    ///
    /// # Errors
    /// [`NetError::Transport`] if the address does not resolve or the
    /// server never answers. No manager is produced.
    pub async fn start_client(mut self) -> Result<NetManager, NetError> {
        self.config.role = Role::Client;
        let (driver, server) =
            UdpDriver::connect(&self.config.addr(), self.config.link_config()).await?;
        Ok(self.build(NetNode::client(Box::new(driver), server)))
    }

    /// Starts a server on an existing driver, e.g. a memory driver.
    pub fn server_with_driver(mut self, driver: impl Driver) -> NetManager {
        self.config.role = Role::Server;
        self.build(NetNode::server(Box::new(driver)))
    }

    /// Starts a client on an existing driver already connected to `server`.
    pub fn client_with_driver(mut self, driver: impl Driver, server: ConnectionId) -> NetManager {
        self.config.role = Role::Client;
        self.build(NetNode::client(Box::new(driver), server))
    }

    fn build(self, node: NetNode) -> NetManager {
        let role = node.role();
        let mut dispatch = DispatchTable::new();
        match role {
            Role::Server => handlers::server::register(&mut dispatch),
            Role::Client => handlers::client::register(&mut dispatch),
        }

        tracing::info!(%role, addr = ?node.local_addr(), "net manager started");
        NetManager {
            ctx: NetContext {
                node,
                directory: AgentDirectory::new(role),
                roster: Roster::new(),
                coordinator: ReplicationCoordinator::new(self.config.interpolation_rate),
                hooks: self.hooks,
                chat: self.chat,
                deferred: VecDeque::new(),
                local_peer: PeerId::UNOWNED,
                greeted: false,
            },
            dispatch,
            sync_timer: IntervalTimer::new(self.config.sync_interval, true),
            ping_timer: IntervalTimer::new(self.config.ping_interval, false),
        }
    }
}

impl Default for NetManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// NetManager
// ---------------------------------------------------------------------------

/// A running server or client.
pub struct NetManager {
    ctx: NetContext,
    dispatch: DispatchTable<NetContext>,
    sync_timer: IntervalTimer,
    ping_timer: IntervalTimer,
}

impl NetManager {
    /// Creates a new builder.
    pub fn builder() -> NetManagerBuilder {
        NetManagerBuilder::new()
    }

    /// One frame of networking, in this order:
    ///
    /// 1. pump the transport and dispatch everything that arrived,
    ///    including the members of any Group
    /// 2. ease ghost agents toward their last received state by `dt`
    /// 3. if the sync timer fired, send one Group of changed agents
    /// 4. on a client, if the ping timer fired, send a Ping
    pub fn update(&mut self, dt: Duration) {
        let inbound = self.ctx.node.pump(Instant::now());
        for item in inbound {
            self.dispatch
                .dispatch(&mut self.ctx, item.tag, item.conn, item.message.as_ref());
            self.drain_deferred();
        }

        self.ctx
            .coordinator
            .interpolate(&mut self.ctx.directory, dt.as_secs_f32());

        if self.sync_timer.advance(dt) {
            if let Some(group) = self.ctx.coordinator.collect(&mut self.ctx.directory) {
                tracing::trace!(count = group.len(), "sending sync batch");
                self.ctx.broadcast(group);
            }
        }

        if self.role() == Role::Client && self.ping_timer.advance(dt) {
            let owner = self.ctx.local_peer;
            if !owner.is_unowned() {
                self.ctx.broadcast(Ping { owner });
            }
        }
    }

    fn drain_deferred(&mut self) {
        while let Some((conn, msg)) = self.ctx.deferred.pop_front() {
            self.dispatch
                .dispatch(&mut self.ctx, msg.tag(), conn, Some(&msg));
        }
    }

    /// Adds a handler after the built-in ones for `tag`.
    pub fn register<F>(&mut self, tag: Tag, handler: F) -> HandlerId
    where
        F: FnMut(&mut NetContext, ConnectionId, Option<&Message>) + Send + 'static,
    {
        self.dispatch.register(tag, handler)
    }

    pub fn unregister(&mut self, tag: Tag, id: HandlerId) -> bool {
        self.dispatch.unregister(tag, id)
    }

    // -- Outbound, client side ----------------------------------------------

    /// Starts the handshake. The reply sets [`local_peer`](Self::local_peer).
    pub fn request_identity(&mut self, username: &str) -> Result<(), NetError> {
        self.require(Role::Client, "request_identity")?;
        self.send(IdentityRequest {
            owner: PeerId::UNOWNED,
            username: username.to_string(),
        })
    }

    pub fn enter_game(&mut self) -> Result<(), NetError> {
        self.require(Role::Client, "enter_game")?;
        self.send(EnterGame {
            owner: self.ctx.local_peer,
        })
    }

    /// Sends a chat line. Empty text is ignored.
    pub fn send_chat(&mut self, text: &str) -> Result<(), NetError> {
        self.require(Role::Client, "send_chat")?;
        if text.is_empty() {
            return Ok(());
        }
        self.send(Chat {
            sender: self.ctx.local_peer,
            text: text.to_string(),
        })
    }

    // -- Outbound, server side ----------------------------------------------

    pub fn send_game_state(&mut self, phase: GamePhase) -> Result<(), NetError> {
        self.require(Role::Server, "send_game_state")?;
        self.send(GameState { phase })
    }

    pub fn send_score(&mut self, score: i32) -> Result<(), NetError> {
        self.require(Role::Server, "send_score")?;
        self.send(ScoreSync { score })
    }

    /// Sends the time left. Only whole seconds reach the clients.
    pub fn send_time(&mut self, remaining_seconds: f32) -> Result<(), NetError> {
        self.require(Role::Server, "send_time")?;
        self.send(TimeSync { remaining_seconds })
    }

    /// Spawns an unowned agent (a platform, say). It reaches clients with
    /// the match-start spawn broadcast.
    pub fn spawn_environment(&mut self, kind: AgentKind, pose: Pose) -> Result<AgentId, NetError> {
        self.require(Role::Server, "spawn_environment")?;
        Ok(self
            .ctx
            .directory
            .spawn_authoritative(kind, PeerId::UNOWNED, pose)?)
    }

    fn send(&mut self, msg: impl Into<Message>) -> Result<(), NetError> {
        self.ctx.node.broadcast(&msg.into())
    }

    fn require(&self, role: Role, operation: &'static str) -> Result<(), NetError> {
        if self.role() == role {
            return Ok(());
        }
        tracing::error!(operation, role = %self.role(), "operation called on the wrong side");
        Err(NetError::RoleMisuse {
            operation,
            role: self.role(),
        })
    }

    // -- Accessors -----------------------------------------------------------

    pub fn role(&self) -> Role {
        self.ctx.role()
    }

    /// Client: the assigned peer ID, unowned before the handshake. Server:
    /// always unowned.
    pub fn local_peer(&self) -> PeerId {
        self.ctx.local_peer
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.ctx.directory
    }

    /// For the game layer to move the agents this process owns.
    pub fn directory_mut(&mut self) -> &mut AgentDirectory {
        &mut self.ctx.directory
    }

    pub fn roster(&self) -> &Roster {
        &self.ctx.roster
    }

    pub fn connection_count(&self) -> usize {
        self.ctx.node.connection_count()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.ctx.node.local_addr()
    }

    /// Closes every connection. Outstanding sends are not awaited.
    pub fn shutdown(&mut self) {
        self.ctx.node.shutdown();
        self.ctx.deferred.clear();
    }
}

impl std::fmt::Debug for NetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetManager")
            .field("node", &self.ctx.node)
            .field("local_peer", &self.ctx.local_peer)
            .field("agents", &self.ctx.directory.len())
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}
