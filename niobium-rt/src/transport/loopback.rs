//! In-process mesh over channels.
//!
//! Every node of the mesh lives in the same process; payloads hop between
//! them through unbounded channels. Used by tests and demonstrations to run
//! whole clusters in one process, and a convenient single-node transport.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

// Layer 3: Internal module imports
use super::traits::{InboundFrame, Transport, TransportError};
use crate::util::NodeId;

/// Builder for a set of connected [`LoopbackTransport`]s.
pub struct LoopbackMesh;

impl LoopbackMesh {
    /// Build a fully-connected mesh of `node_count` transports, one per
    /// node, in node-id order.
    ///
    /// # Example
    /// ```rust
    /// use niobium_rt::transport::LoopbackMesh;
    ///
    /// let mut mesh = LoopbackMesh::new(2);
    /// let node1 = mesh.pop().unwrap();
    /// let node0 = mesh.pop().unwrap();
    /// ```
    pub fn new(node_count: u32) -> Vec<LoopbackTransport> {
        let mut senders = Vec::with_capacity(node_count as usize);
        let mut receivers = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        receivers
            .into_iter()
            .enumerate()
            .map(|(id, inbox)| LoopbackTransport {
                id: NodeId::from_raw(id as u32),
                node_count,
                peers: senders.clone(),
                inbox,
            })
            .collect()
    }
}

/// One node's endpoint of an in-process mesh.
pub struct LoopbackTransport {
    id: NodeId,
    node_count: u32,
    peers: Vec<Sender<(NodeId, Bytes)>>,
    inbox: Receiver<(NodeId, Bytes)>,
}

impl Transport for LoopbackTransport {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn node_count(&self) -> u32 {
        self.node_count
    }

    fn send(&mut self, destination: NodeId, payload: Bytes) -> Result<(), TransportError> {
        let peer = self
            .peers
            .get(destination.index())
            .ok_or(TransportError::UnknownPeer(destination))?;
        peer.send((self.id, payload))
            .map_err(|_| TransportError::PeerClosed(destination))
    }

    fn poll(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        match self.inbox.try_recv() {
            Ok((source, payload)) => Ok(Some(InboundFrame { source, payload })),
            Err(TryRecvError::Empty) => Ok(None),
            // Every peer endpoint is gone; nothing further can arrive.
            Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
