//! UDP driver on a tokio `UdpSocket`.
//!
//! The socket is only touched through `try_recv_from` / `try_send_to`, so a
//! tick never waits on the network. Async is only used by the constructors.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::packet::{PAYLOAD_HEADER, Packet};
use crate::{ConnectionId, Driver, DriverEvent, LinkConfig, ReliableWindow, TransportError};

/// Largest datagram a UDP socket can hand us.
const MAX_DATAGRAM: usize = 65_536;

/// Largest UDP payload IPv4 can carry.
const MAX_UDP_PAYLOAD: usize = 65_507;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Server,
    Client,
}

#[derive(Debug)]
struct Link {
    addr: SocketAddr,
    window: ReliableWindow,
    last_recv: Instant,
    last_send: Instant,
    ack_due: bool,
}

/// A [`Driver`] over UDP.
#[derive(Debug)]
pub struct UdpDriver {
    socket: UdpSocket,
    config: LinkConfig,
    role: Role,
    next_conn: u64,
    links: HashMap<ConnectionId, Link>,
    by_addr: HashMap<SocketAddr, ConnectionId>,
    accepted: VecDeque<ConnectionId>,
    events: VecDeque<DriverEvent>,
    recv_buf: Vec<u8>,
}

impl UdpDriver {
    /// Binds a listening driver to `addr` (e.g. `"0.0.0.0:9000"`).
    pub async fn bind(addr: &str, config: LinkConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "UDP driver listening");
        Ok(Self::from_socket(socket, config, Role::Server))
    }

    /// Connects to a listening driver at `addr` (`host:port`).
    ///
    /// Sends a connect request every `resend_timeout` until the server
    /// accepts or `disconnect_timeout` runs out. Returns the driver and the
    /// connection to the server.
    pub async fn connect(
        addr: &str,
        config: LinkConfig,
    ) -> Result<(Self, ConnectionId), TransportError> {
        let server = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| TransportError::Resolve {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| TransportError::Resolve {
                addr: addr.to_string(),
                reason: "no addresses".to_string(),
            })?;

        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind {
                addr: local.to_string(),
                source,
            })?;

        let request = Packet::ConnectRequest.encode();
        let deadline = Instant::now() + config.disconnect_timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            if Instant::now() >= deadline {
                return Err(TransportError::Connect {
                    addr: addr.to_string(),
                    reason: "no response from server".to_string(),
                });
            }
            socket
                .send_to(&request, server)
                .await
                .map_err(|e| TransportError::Connect {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;

            match tokio::time::timeout(config.resend_timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) if from == server => {
                    if let Ok(Packet::ConnectAccept) = Packet::decode(&buf[..len]) {
                        break;
                    }
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "connect receive failed, retrying");
                    tokio::time::sleep(config.resend_timeout).await;
                }
                Err(_) => tracing::trace!(%server, "connect request timed out, resending"),
            }
        }

        let mut driver = Self::from_socket(socket, config, Role::Client);
        let conn = driver.add_link(server, Instant::now());
        tracing::info!(%conn, %server, "connected");
        Ok((driver, conn))
    }

    fn from_socket(socket: UdpSocket, config: LinkConfig, role: Role) -> Self {
        Self {
            socket,
            config,
            role,
            next_conn: 1,
            links: HashMap::new(),
            by_addr: HashMap::new(),
            accepted: VecDeque::new(),
            events: VecDeque::new(),
            recv_buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    fn add_link(&mut self, addr: SocketAddr, now: Instant) -> ConnectionId {
        let conn = ConnectionId::new(self.next_conn);
        self.next_conn += 1;
        self.links.insert(
            conn,
            Link {
                addr,
                window: ReliableWindow::new(self.config.window, self.config.resend_timeout)
                    .with_max_resends(self.config.max_resends),
                last_recv: now,
                last_send: now,
                ack_due: false,
            },
        );
        self.by_addr.insert(addr, conn);
        conn
    }

    fn remove_link(&mut self, conn: ConnectionId) -> Option<Link> {
        let link = self.links.remove(&conn)?;
        self.by_addr.remove(&link.addr);
        Some(link)
    }

    fn receive_all(&mut self, now: Instant) {
        let mut buf = std::mem::take(&mut self.recv_buf);
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, from)) => self.handle_datagram(from, &buf[..len], now),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::debug!(error = %e, "receive failed");
                    break;
                }
            }
        }
        self.recv_buf = buf;
    }

    fn handle_datagram(&mut self, from: SocketAddr, datagram: &[u8], now: Instant) {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(%from, error = %e, "dropping datagram");
                return;
            }
        };

        let Some(conn) = self.by_addr.get(&from).copied() else {
            if packet == Packet::ConnectRequest && self.role == Role::Server {
                let conn = self.add_link(from, now);
                self.accepted.push_back(conn);
                tracing::info!(%conn, %from, "accepted connection");
                send_datagram(&self.socket, from, &Packet::ConnectAccept.encode());
            } else {
                tracing::trace!(%from, "datagram from unknown address");
            }
            return;
        };

        let Some(link) = self.links.get_mut(&conn) else {
            return;
        };
        link.last_recv = now;

        match packet {
            Packet::Payload { seq, body } => {
                for payload in link.window.on_payload(seq, body) {
                    self.events.push_back(DriverEvent::Data { conn, payload });
                }
                link.ack_due = true;
            }
            Packet::Ack { next_expected } => link.window.on_ack(next_expected),
            // Our accept was lost; the client is still asking.
            Packet::ConnectRequest if self.role == Role::Server => {
                send_datagram(&self.socket, from, &Packet::ConnectAccept.encode());
            }
            Packet::Disconnect => {
                self.remove_link(conn);
                self.events.push_back(DriverEvent::Disconnected(conn));
                tracing::info!(%conn, "remote closed connection");
            }
            Packet::ConnectRequest | Packet::ConnectAccept | Packet::Heartbeat => {}
        }
    }

    fn maintain_links(&mut self, now: Instant) {
        let mut timed_out = Vec::new();
        let mut stalled = Vec::new();
        for (&conn, link) in &mut self.links {
            if now.saturating_duration_since(link.last_recv) >= self.config.disconnect_timeout {
                timed_out.push(conn);
                continue;
            }
            transmit(&self.socket, link, now);
            if link.window.has_failed() {
                stalled.push(conn);
                continue;
            }
            if link.ack_due {
                let ack = Packet::Ack {
                    next_expected: link.window.next_expected(),
                };
                send_datagram(&self.socket, link.addr, &ack.encode());
                link.ack_due = false;
                link.last_send = now;
            }
            if now.saturating_duration_since(link.last_send) >= self.config.heartbeat_interval {
                send_datagram(&self.socket, link.addr, &Packet::Heartbeat.encode());
                link.last_send = now;
            }
        }

        for conn in timed_out {
            self.remove_link(conn);
            self.events.push_back(DriverEvent::Disconnected(conn));
            tracing::warn!(%conn, "connection timed out");
        }
        for conn in stalled {
            if let Some(link) = self.remove_link(conn) {
                send_datagram(&self.socket, link.addr, &Packet::Disconnect.encode());
            }
            self.events.push_back(DriverEvent::Disconnected(conn));
            tracing::warn!(%conn, max_resends = self.config.max_resends, "payload never acknowledged, connection dropped");
        }
    }

    /// Largest message payload one datagram can carry on this driver.
    pub fn max_payload(&self) -> usize {
        self.config.max_datagram.min(MAX_UDP_PAYLOAD).saturating_sub(PAYLOAD_HEADER)
    }
}

impl Driver for UdpDriver {
    fn update(&mut self, now: Instant) {
        self.receive_all(now);
        self.maintain_links(now);
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        self.accepted.pop_front()
    }

    fn pop_event(&mut self) -> Option<DriverEvent> {
        self.events.pop_front()
    }

    fn send(&mut self, conn: ConnectionId, payload: &[u8]) -> Result<(), TransportError> {
        let max = self.max_payload();
        if payload.len() > max {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        let link = self
            .links
            .get_mut(&conn)
            .ok_or(TransportError::UnknownConnection(conn))?;
        link.window.push(Bytes::copy_from_slice(payload));
        transmit(&self.socket, link, Instant::now());
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if let Some(link) = self.remove_link(conn) {
            send_datagram(&self.socket, link.addr, &Packet::Disconnect.encode());
            tracing::debug!(%conn, "closed connection");
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

/// Sends whatever the link's window says is due.
fn transmit(socket: &UdpSocket, link: &mut Link, now: Instant) {
    for (seq, data) in link.window.poll_transmit(now) {
        let packet = Packet::Payload { seq, body: &data };
        send_datagram(socket, link.addr, &packet.encode());
        link.last_send = now;
    }
}

/// Best-effort send. A full socket buffer is not an error: the window
/// resends anything that mattered.
fn send_datagram(socket: &UdpSocket, addr: SocketAddr, datagram: &[u8]) {
    match socket.try_send_to(datagram, addr) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            tracing::trace!(%addr, "socket busy, datagram dropped");
        }
        Err(e) => tracing::warn!(%addr, error = %e, len = datagram.len(), "send failed"),
    }
}
