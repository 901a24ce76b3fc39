//! What a behavior can do while handling a message.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Bytes, BytesMut};

// Layer 3: Internal module imports
use super::acquaintance::AcquaintanceTable;
use crate::memory::MemoryPool;
use crate::message::{tags, Envelope};
use crate::node::engine::NodeShared;
use crate::node::errors::NodeError;
use crate::util::{ActorName, NodeId, ScriptId};

/// Dispatch-time capabilities handed to a behavior.
///
/// Borrowed pieces of the actor's exclusive state plus a handle to the node,
/// valid only for the duration of one handler invocation. Payload buffers
/// for outbound messages are carved from the dispatching worker's pool and
/// stamped with the worker's index so they find their way home after the
/// receiver is done with them.
pub struct ActorContext<'a> {
    name: ActorName,
    source: ActorName,
    worker: usize,
    node: &'a NodeShared,
    pool: &'a mut MemoryPool,
    scratch: &'a mut MemoryPool,
    supervisor: &'a mut ActorName,
    acquaintances: &'a mut AcquaintanceTable,
    children: &'a mut Vec<ActorName>,
}

impl<'a> ActorContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: ActorName,
        source: ActorName,
        worker: usize,
        node: &'a NodeShared,
        pool: &'a mut MemoryPool,
        scratch: &'a mut MemoryPool,
        supervisor: &'a mut ActorName,
        acquaintances: &'a mut AcquaintanceTable,
        children: &'a mut Vec<ActorName>,
    ) -> Self {
        Self {
            name,
            source,
            worker,
            node,
            pool,
            scratch,
            supervisor,
            acquaintances,
            children,
        }
    }

    /// This actor's name.
    pub fn name(&self) -> ActorName {
        self.name
    }

    /// Sender of the message being handled.
    pub fn source(&self) -> ActorName {
        self.source
    }

    /// The hosting node.
    pub fn node_id(&self) -> NodeId {
        self.node.node_id()
    }

    /// Nodes in the cluster.
    pub fn node_count(&self) -> u32 {
        self.node.node_count()
    }

    /// Worker threads on this node.
    pub fn worker_count(&self) -> usize {
        self.node.worker_count()
    }

    /// Index of the worker running this handler.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Application arguments the node was launched with.
    pub fn app_args(&self) -> &[String] {
        self.node.app_args()
    }

    /// Send `payload` to `destination` under `tag`.
    ///
    /// The payload is copied into a worker-pool buffer; location resolution
    /// and any network hop are the engine's business.
    pub fn send(&mut self, destination: ActorName, tag: u32, payload: &[u8]) {
        let payload = self.pooled(payload);
        self.send_bytes(destination, tag, payload);
    }

    /// Send an already-built payload without copying.
    pub fn send_bytes(&mut self, destination: ActorName, tag: u32, payload: Bytes) {
        let envelope =
            Envelope::new(tag, self.name, destination, payload).with_origin(self.worker);
        self.node.route(envelope);
    }

    /// Send to self.
    pub fn send_to_self(&mut self, tag: u32, payload: &[u8]) {
        let destination = self.name;
        self.send(destination, tag, payload);
    }

    /// Reply to the sender of the current message.
    pub fn reply(&mut self, tag: u32, payload: &[u8]) {
        let destination = self.source;
        self.send(destination, tag, payload);
    }

    /// Spawn a child actor from `script` on this node.
    ///
    /// This actor becomes the child's supervisor. To spawn on another node,
    /// send [`tags::ACTION_SPAWN`] to any actor there.
    pub fn spawn(&mut self, script: ScriptId) -> Result<ActorName, NodeError> {
        let child = self
            .node
            .spawn_with_supervisor(script, Some(self.name), None)?;
        self.children.push(child);
        Ok(child)
    }

    /// Begin stopping: sends the stop message to self. Pending mailbox
    /// messages ahead of it are still delivered.
    pub fn stop(&mut self) {
        self.send_to_self(tags::ACTION_STOP, &[]);
    }

    /// Ask `target` to stop. Compliance is the target's choice.
    pub fn ask_to_stop(&mut self, target: ActorName) {
        self.send(target, tags::ACTION_ASK_TO_STOP, &[]);
    }

    /// The actor responsible for stopping this one.
    pub fn supervisor(&self) -> ActorName {
        *self.supervisor
    }

    /// Hand supervision of this actor to `supervisor`.
    pub fn set_supervisor(&mut self, supervisor: ActorName) {
        *self.supervisor = supervisor;
    }

    /// Children spawned by this actor, in spawn order.
    pub fn children(&self) -> &[ActorName] {
        self.children
    }

    /// Bind acquaintance `index` to `peer`.
    pub fn acquaint(&mut self, index: usize, peer: ActorName) {
        self.acquaintances.bind(index, peer);
    }

    /// The peer bound at acquaintance `index`.
    pub fn acquaintance(&self, index: usize) -> Option<ActorName> {
        self.acquaintances.get(index)
    }

    /// Compact index for `peer`, recorded on first interaction.
    pub fn acquaintance_index(&mut self, peer: ActorName) -> usize {
        self.acquaintances.index_of(peer)
    }

    /// A zeroed scratch buffer from the worker's ephemeral pool. Handler
    /// temporaries only: release (drop) before returning.
    pub fn scratch_buffer(&mut self, size: usize) -> BytesMut {
        self.scratch.allocate(size)
    }

    fn pooled(&mut self, payload: &[u8]) -> Bytes {
        if payload.is_empty() {
            return Bytes::new();
        }
        let mut buf = self.pool.allocate(payload.len());
        buf[..payload.len()].copy_from_slice(payload);
        buf.freeze()
    }
}
