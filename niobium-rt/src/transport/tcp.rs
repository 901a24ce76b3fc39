//! Non-blocking TCP mesh.
//!
//! Every node binds its own endpoint, connects to all lower-numbered peers
//! and accepts from all higher-numbered ones, exchanging a 4-byte node id as
//! the handshake. After setup all sockets are non-blocking: sends queue what
//! the socket will not take, polls read what the socket has and reassemble
//! length-prefixed frames in place. TCP gives the per-peer ordering the
//! engine relies on.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::traits::{InboundFrame, Transport, TransportError};
use crate::memory::{MemoryPool, PoolConfig};
use crate::util::NodeId;

/// Read granularity for the shared ingress scratch buffer.
const RECV_CHUNK: usize = 64 * 1024;

/// Upper bound a peer may declare for one frame; larger is a protocol
/// violation.
const MAX_FRAME: usize = 256 * 1024 * 1024;

/// How long mesh establishment may take before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between connection attempts while a peer is still coming up.
const CONNECT_RETRY: Duration = Duration::from_millis(50);

struct Peer {
    node: NodeId,
    stream: TcpStream,
    /// Ingress accumulation; frames are split off the front in place.
    rx: BytesMut,
    /// Egress segments not yet accepted by the socket.
    tx: VecDeque<Bytes>,
    /// Bytes of the front egress segment already written.
    tx_offset: usize,
}

impl Peer {
    fn new(node: NodeId, stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self {
            node,
            stream,
            rx: BytesMut::new(),
            tx: VecDeque::new(),
            tx_offset: 0,
        })
    }

    /// Write queued segments until the socket pushes back.
    fn egress(&mut self) -> Result<(), TransportError> {
        while let Some(front) = self.tx.front() {
            match self.stream.write(&front[self.tx_offset..]) {
                Ok(0) => return Err(TransportError::PeerClosed(self.node)),
                Ok(written) => {
                    self.tx_offset += written;
                    if self.tx_offset == front.len() {
                        self.tx.pop_front();
                        self.tx_offset = 0;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read whatever the socket has into the accumulation buffer.
    fn ingress(&mut self, scratch: &mut BytesMut) -> Result<(), TransportError> {
        loop {
            match self.stream.read(&mut scratch[..]) {
                Ok(0) => return Err(TransportError::PeerClosed(self.node)),
                Ok(received) => self.rx.extend_from_slice(&scratch[..received]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    return Err(TransportError::PeerClosed(self.node))
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Split one complete frame off the accumulation buffer, if present.
    fn take_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.rx.len() < 4 {
            return Ok(None);
        }
        let declared =
            u32::from_ne_bytes([self.rx[0], self.rx[1], self.rx[2], self.rx[3]]) as usize;
        if declared > MAX_FRAME {
            return Err(TransportError::Corrupt {
                node: self.node,
                reason: format!("frame of {declared} bytes exceeds the {MAX_FRAME} limit"),
            });
        }
        if self.rx.len() < 4 + declared {
            return Ok(None);
        }
        let _ = self.rx.split_to(4);
        Ok(Some(self.rx.split_to(declared).freeze()))
    }

    fn pending_egress(&self) -> bool {
        !self.tx.is_empty()
    }
}

/// One node's endpoint of a TCP mesh.
pub struct TcpTransport {
    id: NodeId,
    peers: Vec<Option<Peer>>,
    listener: TcpListener,
    pool: MemoryPool,
    scratch: BytesMut,
    cursor: usize,
}

impl TcpTransport {
    /// Parse a comma-separated `host:port` list, one endpoint per node in
    /// node-id order.
    pub fn parse_endpoints(spec: &str) -> Result<Vec<SocketAddr>, TransportError> {
        spec.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<SocketAddr>()
                    .map_err(|_| TransportError::BadEndpoint(part.to_owned()))
            })
            .collect()
    }

    /// Build the mesh from the launcher environment: node id from
    /// `NIOBIUM_NODE_NAME`, endpoints from `NIOBIUM_PEERS`.
    pub fn from_env() -> Result<Self, TransportError> {
        use crate::node::config::{ENV_NODE_NAME, ENV_PEERS};

        let id = std::env::var(ENV_NODE_NAME)
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        let spec = std::env::var(ENV_PEERS)
            .map_err(|_| TransportError::BadEndpoint(format!("{ENV_PEERS} is not set")))?;
        let endpoints = Self::parse_endpoints(&spec)?;
        Self::connect(NodeId::from_raw(id), &endpoints)
    }

    /// Establish the mesh for node `id` of `endpoints.len()` nodes.
    ///
    /// Blocks until every peer link is up or [`CONNECT_TIMEOUT`] passes.
    pub fn connect(id: NodeId, endpoints: &[SocketAddr]) -> Result<Self, TransportError> {
        let node_count = endpoints.len();
        if id.index() >= node_count {
            return Err(TransportError::Handshake {
                node: id,
                reason: format!("node id outside the {node_count} configured endpoints"),
            });
        }
        let listener = TcpListener::bind(endpoints[id.index()])?;
        let mut peers: Vec<Option<Peer>> = Vec::new();
        peers.resize_with(node_count, || None);

        // Dial every lower-numbered node, announcing who we are.
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        for lower in 0..id.index() {
            let node = NodeId::from_raw(lower as u32);
            let stream = Self::dial(id, endpoints[lower], node, deadline)?;
            peers[lower] = Some(Peer::new(node, stream)?);
            debug!(local = %id, peer = %node, "mesh link up (dialed)");
        }

        // Accept from every higher-numbered node; the handshake tells us who
        // arrived. The listener goes non-blocking so the deadline holds even
        // when a peer never shows up.
        listener.set_nonblocking(true)?;
        let mut expected = node_count - id.index() - 1;
        while expected > 0 {
            if Instant::now() >= deadline {
                return Err(TransportError::Handshake {
                    node: id,
                    reason: format!("timed out with {expected} peers outstanding"),
                });
            }
            let mut stream = match listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(CONNECT_RETRY);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            stream.set_nonblocking(false)?;
            let mut raw = [0u8; 4];
            stream.read_exact(&mut raw)?;
            let node = NodeId::from_raw(u32::from_ne_bytes(raw));
            let slot = node.index();
            if slot <= id.index() || slot >= node_count || peers[slot].is_some() {
                return Err(TransportError::Handshake {
                    node,
                    reason: "unexpected peer announcement".to_owned(),
                });
            }
            peers[slot] = Some(Peer::new(node, stream)?);
            debug!(local = %id, peer = %node, "mesh link up (accepted)");
            expected -= 1;
        }

        let mut pool = MemoryPool::new(PoolConfig::default());
        let scratch = pool.allocate(RECV_CHUNK);
        Ok(Self {
            id,
            peers,
            listener,
            pool,
            scratch,
            cursor: 0,
        })
    }

    /// The address this node's listener actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    fn dial(
        own: NodeId,
        addr: SocketAddr,
        node: NodeId,
        deadline: Instant,
    ) -> Result<TcpStream, TransportError> {
        loop {
            match TcpStream::connect(addr) {
                Ok(mut stream) => {
                    // Announce ourselves before going non-blocking; the
                    // accepting side files the link under this id.
                    stream.write_all(&own.raw().to_ne_bytes())?;
                    return Ok(stream);
                }
                Err(_) if Instant::now() < deadline => std::thread::sleep(CONNECT_RETRY),
                Err(e) => {
                    return Err(TransportError::Handshake {
                        node,
                        reason: format!("connect to {addr} failed: {e}"),
                    })
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn node_count(&self) -> u32 {
        self.peers.len() as u32
    }

    fn send(&mut self, destination: NodeId, payload: Bytes) -> Result<(), TransportError> {
        if destination == self.id {
            return Err(TransportError::UnknownPeer(destination));
        }
        let peer = self
            .peers
            .get_mut(destination.index())
            .and_then(Option::as_mut)
            .ok_or(TransportError::UnknownPeer(destination))?;
        let header = (payload.len() as u32).to_ne_bytes();
        peer.tx.push_back(Bytes::copy_from_slice(&header));
        peer.tx.push_back(payload);
        peer.egress()
    }

    fn poll(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        let slots = self.peers.len();
        // Serve a buffered frame first, round-robin for fairness.
        for step in 0..slots {
            let index = (self.cursor + step) % slots;
            if let Some(peer) = self.peers[index].as_mut() {
                if let Some(payload) = peer.take_frame()? {
                    self.cursor = (index + 1) % slots;
                    trace!(source = %peer.node, len = payload.len(), "frame in");
                    return Ok(Some(InboundFrame {
                        source: peer.node,
                        payload,
                    }));
                }
            }
        }
        // Nothing buffered: one read sweep, then try again.
        for slot in self.peers.iter_mut().flatten() {
            slot.ingress(&mut self.scratch)?;
        }
        for step in 0..slots {
            let index = (self.cursor + step) % slots;
            if let Some(peer) = self.peers[index].as_mut() {
                if let Some(payload) = peer.take_frame()? {
                    self.cursor = (index + 1) % slots;
                    return Ok(Some(InboundFrame {
                        source: peer.node,
                        payload,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        for peer in self.peers.iter_mut().flatten() {
            peer.egress()?;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        let deadline = Instant::now() + Duration::from_secs(1);
        while self.peers.iter().flatten().any(Peer::pending_egress) {
            self.flush()?;
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        for peer in self.peers.iter_mut().flatten() {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
        self.pool.free_all();
        Ok(())
    }
}
