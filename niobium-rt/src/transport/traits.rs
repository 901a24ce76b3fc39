//! The transport contract.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::Bytes;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::NodeId;

/// Transport failures. The engine treats every one of these as fatal; there
/// is no in-engine recovery from a broken cluster fabric.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Destination is not a member of the cluster.
    #[error("destination {0} is outside the cluster")]
    UnknownPeer(NodeId),

    /// The peer's end of the connection is gone.
    #[error("peer {0} closed the connection")]
    PeerClosed(NodeId),

    /// Underlying socket failure.
    #[error("transport i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// A peer violated the framing protocol.
    #[error("malformed frame from {node}: {reason}")]
    Corrupt { node: NodeId, reason: String },

    /// Establishing the mesh failed.
    #[error("handshake with {node} failed: {reason}")]
    Handshake { node: NodeId, reason: String },

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint {0:?}")]
    BadEndpoint(String),
}

/// A payload delivered from another node.
#[derive(Debug)]
pub struct InboundFrame {
    /// The sending node.
    pub source: NodeId,
    /// The payload exactly as the sender flushed it: either one wire message
    /// or a multiplexed batch.
    pub payload: Bytes,
}

/// Point-to-point cluster fabric.
///
/// All calls are non-blocking: `send` queues or writes what it can, `poll`
/// probes for one completed inbound payload. Delivery order between a pair
/// of nodes equals send order; across pairs there is no ordering. The
/// multiplexer and engine rely on that pairwise guarantee instead of
/// sequence numbers.
pub trait Transport: Send {
    /// This node's id.
    fn node_id(&self) -> NodeId;

    /// Number of nodes in the mesh.
    fn node_count(&self) -> u32;

    /// Queue `payload` for `destination`, writing through as far as the
    /// fabric allows without blocking.
    fn send(&mut self, destination: NodeId, payload: Bytes) -> Result<(), TransportError>;

    /// Probe for one completed inbound payload.
    fn poll(&mut self) -> Result<Option<InboundFrame>, TransportError>;

    /// Push queued outbound bytes as far as possible without blocking.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Flush what remains and tear the fabric down.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}
