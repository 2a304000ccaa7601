//! The transport session: one driver plus the connections it tracks.
//!
//! A [`NetNode`] turns driver events into decoded [`Inbound`] items and
//! fans outbound messages out to every tracked connection. It does not
//! dispatch; [`NetManager`](crate::NetManager) feeds what [`NetNode::pump`]
//! returns into the dispatch table.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use duetnet_protocol::{Message, ProtocolError, Role, Tag, WireReader};
use duetnet_transport::{ConnectionId, Driver, DriverEvent};
use tokio::time::Instant;

use crate::NetError;

/// One decoded item from a pump.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub conn: ConnectionId,
    pub tag: Tag,
    /// `None` for the Delete event synthesized when `conn` dropped.
    pub message: Option<Message>,
}

impl Inbound {
    fn disconnected(conn: ConnectionId) -> Self {
        Self {
            conn,
            tag: Tag::Delete,
            message: None,
        }
    }
}

pub struct NetNode {
    driver: Box<dyn Driver>,
    role: Role,
    connections: BTreeSet<ConnectionId>,
}

impl NetNode {
    /// A listening node. Connections are tracked as the driver accepts
    /// them.
    pub fn server(driver: Box<dyn Driver>) -> Self {
        Self {
            driver,
            role: Role::Server,
            connections: BTreeSet::new(),
        }
    }

    /// A connected node. `server` is the single tracked connection.
    pub fn client(driver: Box<dyn Driver>, server: ConnectionId) -> Self {
        Self {
            driver,
            role: Role::Client,
            connections: BTreeSet::from([server]),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.driver.local_addr()
    }

    /// Tracked connections, in ID order.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_tracked(&self, conn: ConnectionId) -> bool {
        self.connections.contains(&conn)
    }

    /// Drains everything the driver has, without waiting.
    ///
    /// 1. Newly accepted connections join the tracked set.
    /// 2. Each payload is decoded. An unknown leading tag is dropped
    ///    quietly. Any other failure, an unknown tag inside a Group
    ///    included, drops that payload only, with a warning.
    /// 3. A dropped connection leaves the tracked set and yields a
    ///    payload-less Delete so cleanup handlers run.
    pub fn pump(&mut self, now: Instant) -> Vec<Inbound> {
        self.driver.update(now);

        while let Some(conn) = self.driver.accept() {
            tracing::info!(%conn, "connection accepted");
            self.connections.insert(conn);
        }

        let mut inbound = Vec::new();
        while let Some(event) = self.driver.pop_event() {
            match event {
                DriverEvent::Data { conn, payload } => match Message::decode(&payload) {
                    Ok(message) => inbound.push(Inbound {
                        conn,
                        tag: message.tag(),
                        message: Some(message),
                    }),
                    Err(ProtocolError::UnknownTag(tag)) if leading_tag(&payload) == Some(tag) => {
                        tracing::trace!(%conn, tag, "unknown message tag, dropped");
                    }
                    Err(e) => {
                        tracing::warn!(%conn, error = %e, len = payload.len(), "malformed message, dropped");
                    }
                },
                DriverEvent::Disconnected(conn) => {
                    if self.connections.remove(&conn) {
                        tracing::info!(%conn, "connection lost");
                        inbound.push(Inbound::disconnected(conn));
                    }
                }
            }
        }
        inbound
    }

    /// Sends `msg` to every tracked connection.
    ///
    /// The message is encoded once. A connection that fails to take it is
    /// logged and skipped; the rest still get it.
    ///
    /// # Errors
    /// [`NetError::Protocol`] if the message cannot be encoded (non-ASCII
    /// text).
    pub fn broadcast(&mut self, msg: &Message) -> Result<(), NetError> {
        let bytes = msg.encode()?;
        for &conn in &self.connections {
            if let Err(e) = self.driver.send(conn, &bytes) {
                tracing::warn!(%conn, error = %e, tag = %msg.tag(), "broadcast send failed");
            }
        }
        tracing::trace!(tag = %msg.tag(), peers = self.connections.len(), "broadcast");
        Ok(())
    }

    /// Sends `msg` to one connection.
    ///
    /// # Errors
    /// [`NetError::Protocol`] if encoding fails, [`NetError::Transport`] if
    /// the connection is unknown or closed.
    pub fn send_to(&mut self, conn: ConnectionId, msg: &Message) -> Result<(), NetError> {
        let bytes = msg.encode()?;
        self.driver.send(conn, &bytes)?;
        Ok(())
    }

    /// Closes every connection. Best effort; nothing is awaited.
    pub fn shutdown(&mut self) {
        for conn in std::mem::take(&mut self.connections) {
            self.driver.disconnect(conn);
        }
        tracing::info!(role = %self.role, "node shut down");
    }
}

/// The raw tag in front of a payload. An unknown tag here is
/// forward-compatible noise; one nested inside a Group is a broken batch.
fn leading_tag(payload: &[u8]) -> Option<u16> {
    WireReader::new(payload).peek_u16().ok()
}

impl std::fmt::Debug for NetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetNode")
            .field("role", &self.role)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duetnet_protocol::{Chat, PeerId};
    use duetnet_transport::memory_server;

    fn chat(text: &str) -> Message {
        Message::from(Chat {
            sender: PeerId(1),
            text: text.into(),
        })
    }

    #[tokio::test]
    async fn test_pump_tracks_accepted_connections() {
        let (server, connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let (_a, conn_a) = connector.connect().unwrap();
        let (_b, conn_b) = connector.connect().unwrap();

        assert!(node.pump(Instant::now()).is_empty());
        assert_eq!(node.connections().collect::<Vec<_>>(), vec![conn_a, conn_b]);
    }

    #[tokio::test]
    async fn test_pump_decodes_and_skips_garbage() {
        let (server, connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let (mut client, conn) = connector.connect().unwrap();

        client.send(conn, &[0xC8, 0x00, 1, 2, 3]).unwrap(); // unknown tag 200
        client.send(conn, &[Tag::Chat.as_u16() as u8, 0, 5]).unwrap(); // truncated
        client.send(conn, &chat("ok").encode().unwrap()).unwrap();

        let inbound = node.pump(Instant::now());
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].conn, conn);
        assert_eq!(inbound[0].message, Some(chat("ok")));
    }

    #[tokio::test]
    async fn test_disconnect_yields_payloadless_delete() {
        let (server, connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let (client, conn) = connector.connect().unwrap();
        node.pump(Instant::now());

        drop(client);
        let inbound = node.pump(Instant::now());
        assert_eq!(inbound, vec![Inbound::disconnected(conn)]);
        assert_eq!(node.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let (server, connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let (a, conn_a) = connector.connect().unwrap();
        let (b, conn_b) = connector.connect().unwrap();
        node.pump(Instant::now());

        node.broadcast(&chat("all")).unwrap();

        for (client, conn) in [(a, conn_a), (b, conn_b)] {
            let mut client_node = NetNode::client(Box::new(client), conn);
            let inbound = client_node.pump(Instant::now());
            assert_eq!(inbound.len(), 1);
            assert_eq!(inbound[0].message, Some(chat("all")));
        }
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_fails() {
        let (server, _connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let err = node
            .send_to(ConnectionId::new(42), &chat("nobody"))
            .unwrap_err();
        assert!(matches!(err, NetError::Transport(_)));
    }

    #[tokio::test]
    async fn test_broadcast_rejects_non_ascii() {
        let (server, _connector) = memory_server();
        let mut node = NetNode::server(Box::new(server));
        let err = node.broadcast(&chat("héllo")).unwrap_err();
        assert!(matches!(err, NetError::Protocol(ProtocolError::NonAscii(_))));
    }
}
