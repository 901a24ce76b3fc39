//! The dispatch thread.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use bytes::BytesMut;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::actor::{ActorBody, ActorCell, ActorContext};
use crate::memory::{MemoryPool, PoolConfig, PoolStats};
use crate::message::{tags, Envelope, Packer, Unpacker};
use crate::node::engine::NodeShared;
use crate::node::metrics::EngineMetrics;
use crate::util::ActorName;

/// How long an idle worker parks on its ready queue before housekeeping.
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// What the pool puts on a worker's command queue.
pub(crate) enum WorkerCommand {
    /// Run one dispatch for this actor.
    Dispatch(Arc<ActorCell>),
    /// Cooperative stop: finish what is queued, then exit.
    Stop,
}

/// The state owned by one worker thread.
///
/// Two memory pools, both single-owner: the outbound pool backs payloads the
/// worker's actors send (buffers come home through the recycle queue), the
/// scratch pool backs handler temporaries and is reset wholesale between
/// dispatches.
pub(crate) struct WorkerCore {
    id: usize,
    node: Arc<NodeShared>,
    commands: Receiver<WorkerCommand>,
    recycle: Receiver<BytesMut>,
    outbound_pool: MemoryPool,
    scratch_pool: MemoryPool,
    processed: Arc<AtomicU64>,
    pool_stats: Arc<Mutex<PoolStats>>,
}

impl WorkerCore {
    pub(crate) fn new(
        id: usize,
        node: Arc<NodeShared>,
        commands: Receiver<WorkerCommand>,
        recycle: Receiver<BytesMut>,
        processed: Arc<AtomicU64>,
        pool_stats: Arc<Mutex<PoolStats>>,
    ) -> Self {
        Self {
            id,
            node,
            commands,
            recycle,
            outbound_pool: MemoryPool::new(PoolConfig::default()),
            scratch_pool: MemoryPool::new(PoolConfig::ephemeral(1 << 20)),
            processed,
            pool_stats,
        }
    }

    /// The thread body: drain buffer returns, run dispatches, until stopped.
    pub(crate) fn run(mut self) {
        debug!(worker = self.id, "worker up");
        loop {
            self.drain_recycle();
            match self.commands.recv_timeout(IDLE_WAIT) {
                Ok(WorkerCommand::Dispatch(cell)) => self.dispatch(cell),
                Ok(WorkerCommand::Stop) => break,
                Err(RecvTimeoutError::Timeout) => {
                    *self.pool_stats.lock() = self.outbound_pool.stats();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Cooperative stop: whatever is already queued still runs.
        while let Ok(command) = self.commands.try_recv() {
            if let WorkerCommand::Dispatch(cell) = command {
                self.dispatch(cell);
            }
        }
        *self.pool_stats.lock() = self.outbound_pool.stats();
        debug!(worker = self.id, "worker down");
    }

    /// Buffers freed by other workers come home here.
    fn drain_recycle(&mut self) {
        while let Ok(buf) = self.recycle.try_recv() {
            self.outbound_pool.free(buf);
        }
    }

    /// One dispatch: claim the actor, deliver one mailbox message, keep the
    /// actor scheduled while its mailbox is non-empty.
    fn dispatch(&mut self, cell: Arc<ActorCell>) {
        if !cell.claim() {
            // Another worker is inside (a migration race); hand the
            // readiness token back and let the owner retry.
            self.node.requeue(cell);
            return;
        }

        if let Some(envelope) = cell.mailbox().pop() {
            let died = self.handle(&cell, envelope);
            self.processed.fetch_add(1, Ordering::Relaxed);
            if died {
                self.node.report_death(cell.name());
            }
        }

        cell.release();
        self.scratch_pool.free_all();

        if !cell.mailbox().is_empty() {
            // Keep the readiness token and go around again.
            self.node.requeue(cell);
        } else {
            cell.clear_ready();
            // A producer may have pushed between the emptiness check and
            // clearing the flag; re-arm if so.
            if !cell.mailbox().is_empty() && cell.mark_ready() {
                self.node.requeue(cell);
            }
        }
    }

    fn handle(&mut self, cell: &Arc<ActorCell>, envelope: Envelope) -> bool {
        let died = match envelope.tag() {
            tags::ACTION_SPAWN => {
                self.serve_spawn(cell, &envelope);
                false
            }
            tags::ACTION_GET_NODE_WORKER_COUNT => {
                self.serve_worker_count(cell, &envelope);
                false
            }
            _ => self.deliver(cell, &envelope),
        };
        self.recycle_payload(envelope);
        died
    }

    /// Run the behavior for one message, driving the lifecycle tags.
    fn deliver(&mut self, cell: &Arc<ActorCell>, envelope: &Envelope) -> bool {
        let node = Arc::clone(&self.node);
        let mut body = cell.body();
        if !body.lifecycle.accepts_messages() {
            EngineMetrics::incr(&node.metrics().dropped_dying);
            return false;
        }

        let ActorBody {
            behavior,
            lifecycle,
            supervisor,
            acquaintances,
            children,
        } = &mut *body;
        let mut ctx = ActorContext::new(
            cell.name(),
            envelope.source(),
            self.id,
            &node,
            &mut self.outbound_pool,
            &mut self.scratch_pool,
            supervisor,
            acquaintances,
            children,
        );

        match envelope.tag() {
            tags::ACTION_START => {
                lifecycle.mark_started();
                trace!(worker = self.id, actor = %cell.name(), "start");
                behavior.on_start(&mut ctx);
                false
            }
            tags::ACTION_STOP => {
                lifecycle.mark_dying();
                trace!(worker = self.id, actor = %cell.name(), "stop");
                behavior.on_stop(&mut ctx);
                true
            }
            _ => {
                behavior.receive(envelope, &mut ctx);
                false
            }
        }
    }

    /// Engine-served: spawn on this node for a (possibly remote) requester.
    fn serve_spawn(&mut self, cell: &Arc<ActorCell>, envelope: &Envelope) {
        let mut fields = Unpacker::new(envelope.payload().clone());
        let script = match fields.script() {
            Ok(script) => script,
            Err(error) => {
                warn!(worker = self.id, %error, "malformed spawn request dropped");
                return;
            }
        };
        let spawned = match self
            .node
            .spawn_with_supervisor(script, Some(envelope.source()), None)
        {
            Ok(name) => name,
            Err(error) => {
                warn!(%script, %error, "spawn request failed");
                ActorName::NONE
            }
        };
        let payload = Packer::new().actor(spawned).finish();
        self.node.route(Envelope::new(
            tags::ACTION_SPAWN_REPLY,
            cell.name(),
            envelope.source(),
            payload,
        ));
    }

    /// Engine-served: node capability query.
    fn serve_worker_count(&mut self, cell: &Arc<ActorCell>, envelope: &Envelope) {
        let payload = Packer::new()
            .u32(self.node.worker_count() as u32)
            .finish();
        self.node.route(Envelope::new(
            tags::ACTION_GET_NODE_WORKER_COUNT_REPLY,
            cell.name(),
            envelope.source(),
            payload,
        ));
    }

    /// Send the consumed payload buffer back to the pool it was carved
    /// from. Only sole-owner buffers can travel; shared slices (frames of a
    /// still-referenced batch) just drop.
    fn recycle_payload(&mut self, envelope: Envelope) {
        let origin = envelope.origin_worker();
        let payload = envelope.into_payload();
        if payload.is_empty() {
            return;
        }
        if let Ok(buf) = payload.try_into_mut() {
            match origin {
                Some(worker) if worker == self.id => self.outbound_pool.free(buf),
                Some(worker) => self.node.recycle_to(worker, buf),
                None => {}
            }
        }
    }
}
