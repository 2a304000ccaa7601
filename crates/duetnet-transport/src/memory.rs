//! In-process driver pair built on tokio unbounded channels.
//!
//! Delivery is lossless and ordered, and nothing moves until the receiving
//! side calls [`Driver::update`], so tests can step a server and its
//! clients one tick at a time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::time::Instant;

use crate::{ConnectionId, Driver, DriverEvent, TransportError};

#[derive(Debug)]
enum ToServer {
    Connect {
        conn: ConnectionId,
        tx: UnboundedSender<ToClient>,
    },
    Data {
        conn: ConnectionId,
        payload: Vec<u8>,
    },
    Disconnect(ConnectionId),
}

#[derive(Debug)]
enum ToClient {
    Data(Vec<u8>),
    Closed,
}

/// Creates a listening memory driver and the handle clients connect with.
pub fn memory_server() -> (MemoryServer, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    let server = MemoryServer {
        rx,
        clients: HashMap::new(),
        accepted: VecDeque::new(),
        events: VecDeque::new(),
    };
    let connector = MemoryConnector {
        tx,
        next_conn: Arc::new(AtomicU64::new(1)),
    };
    (server, connector)
}

/// Server half of the memory transport.
#[derive(Debug)]
pub struct MemoryServer {
    rx: UnboundedReceiver<ToServer>,
    clients: HashMap<ConnectionId, UnboundedSender<ToClient>>,
    accepted: VecDeque<ConnectionId>,
    events: VecDeque<DriverEvent>,
}

impl Driver for MemoryServer {
    fn update(&mut self, _now: Instant) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                ToServer::Connect { conn, tx } => {
                    self.clients.insert(conn, tx);
                    self.accepted.push_back(conn);
                    tracing::debug!(%conn, "memory client connected");
                }
                ToServer::Data { conn, payload } => {
                    if self.clients.contains_key(&conn) {
                        self.events.push_back(DriverEvent::Data { conn, payload });
                    }
                }
                ToServer::Disconnect(conn) => {
                    if self.clients.remove(&conn).is_some() {
                        self.events.push_back(DriverEvent::Disconnected(conn));
                    }
                }
            }
        }
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        self.accepted.pop_front()
    }

    fn pop_event(&mut self) -> Option<DriverEvent> {
        self.events.pop_front()
    }

    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> Result<(), TransportError> {
        let tx = self
            .clients
            .get(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        tx.send(ToClient::Data(payload.to_vec()))
            .map_err(|_| TransportError::Closed(conn))
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if let Some(tx) = self.clients.remove(&conn) {
            let _ = tx.send(ToClient::Closed);
        }
    }
}

/// Cloneable handle for opening client connections to a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    tx: UnboundedSender<ToServer>,
    next_conn: Arc<AtomicU64>,
}

impl MemoryConnector {
    /// Opens a new connection. The server sees it on its next update.
    pub fn connect(&self) -> Result<(MemoryClient, ConnectionId), TransportError> {
        let conn = ConnectionId::new(self.next_conn.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx
            .send(ToServer::Connect { conn, tx })
            .map_err(|_| TransportError::Connect {
                addr: "memory".to_string(),
                reason: "server dropped".to_string(),
            })?;
        let client = MemoryClient {
            conn,
            tx: self.tx.clone(),
            rx,
            events: VecDeque::new(),
            open: true,
        };
        Ok((client, conn))
    }
}

/// Client half of the memory transport. Dropping it disconnects.
#[derive(Debug)]
pub struct MemoryClient {
    conn: ConnectionId,
    tx: UnboundedSender<ToServer>,
    rx: UnboundedReceiver<ToClient>,
    events: VecDeque<DriverEvent>,
    open: bool,
}

impl MemoryClient {
    fn close_locally(&mut self) {
        if self.open {
            self.open = false;
            self.events.push_back(DriverEvent::Disconnected(self.conn));
        }
    }
}

impl Driver for MemoryClient {
    fn update(&mut self, _now: Instant) {
        loop {
            match self.rx.try_recv() {
                Ok(ToClient::Data(payload)) if self.open => {
                    self.events.push_back(DriverEvent::Data {
                        conn: self.conn,
                        payload,
                    });
                }
                Ok(ToClient::Data(_)) => {}
                Ok(ToClient::Closed) | Err(TryRecvError::Disconnected) => {
                    self.close_locally();
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        None
    }

    fn pop_event(&mut self) -> Option<DriverEvent> {
        self.events.pop_front()
    }

    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> Result<(), TransportError> {
        if conn != self.conn || !self.open {
            return Err(TransportError::UnknownConnection(conn));
        }
        self.tx
            .send(ToServer::Data {
                conn,
                payload: payload.to_vec(),
            })
            .map_err(|_| TransportError::Closed(conn))
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if conn == self.conn && self.open {
            self.open = false;
            let _ = self.tx.send(ToServer::Disconnect(conn));
        }
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        if self.open {
            let _ = self.tx.send(ToServer::Disconnect(self.conn));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(driver: &mut dyn Driver) -> Vec<DriverEvent> {
        driver.update(Instant::now());
        std::iter::from_fn(|| driver.pop_event()).collect()
    }

    #[test]
    fn test_connect_then_exchange_payloads() {
        let (mut server, connector) = memory_server();
        let (mut client, conn) = connector.connect().unwrap();

        client.send(conn, b"hello").unwrap();
        let events = pump(&mut server);
        assert_eq!(server.accept(), Some(conn));
        assert_eq!(
            events,
            vec![DriverEvent::Data {
                conn,
                payload: b"hello".to_vec()
            }]
        );

        server.send(conn, b"back").unwrap();
        assert_eq!(
            pump(&mut client),
            vec![DriverEvent::Data {
                conn,
                payload: b"back".to_vec()
            }]
        );
    }

    #[test]
    fn test_dropping_client_reports_disconnect() {
        let (mut server, connector) = memory_server();
        let (client, conn) = connector.connect().unwrap();
        pump(&mut server);
        drop(client);
        assert_eq!(pump(&mut server), vec![DriverEvent::Disconnected(conn)]);
        assert!(matches!(
            server.send(conn, b"x"),
            Err(TransportError::UnknownConnection(_))
        ));
    }

    #[test]
    fn test_server_disconnect_reaches_client_once() {
        let (mut server, connector) = memory_server();
        let (mut client, conn) = connector.connect().unwrap();
        pump(&mut server);
        server.disconnect(conn);
        assert_eq!(pump(&mut client), vec![DriverEvent::Disconnected(conn)]);
        assert!(pump(&mut client).is_empty());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let (_server, connector) = memory_server();
        let (_a, first) = connector.connect().unwrap();
        let (_b, second) = connector.clone().connect().unwrap();
        assert_ne!(first, second);
    }
}
