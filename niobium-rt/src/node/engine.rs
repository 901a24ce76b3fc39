//! The engine: actor ownership, routing, lifecycle, the main loop.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use bytes::Bytes;
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace};

// Layer 3: Internal module imports
use super::config::NodeConfig;
use super::errors::NodeError;
use super::metrics::{EngineMetrics, MetricsSnapshot};
use super::names::{NameAllocator, NamePolicy};
use super::registry::ActorRegistry;
use super::signal;
use crate::actor::ActorCell;
use crate::message::{tags, wire, Envelope};
use crate::multiplex::Multiplexer;
use crate::script::{Script, ScriptRegistry};
use crate::transport::Transport;
use crate::util::{ActorName, NodeId, ScriptId};
use crate::worker::pool::{build_links, WorkerLinks, WorkerPool};

/// Cadence of load snapshots, balancing, and instrumentation output.
pub const LOAD_PERIOD: Duration = Duration::from_secs(1);

/// The engine state shared by the main loop and every worker thread.
///
/// Everything here is either lock-free or behind a short single-purpose
/// lock; the send fast path (name lookup, mailbox push, worker wake) takes
/// no lock beyond the mailbox's own.
pub(crate) struct NodeShared {
    config: NodeConfig,
    registry: ActorRegistry,
    scripts: ScriptRegistry,
    names: NameAllocator,
    metrics: EngineMetrics,
    workers: Arc<WorkerLinks>,
    outbound: Sender<Envelope>,
    deaths: Sender<ActorName>,
    alive: AtomicUsize,
}

impl NodeShared {
    pub(crate) fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub(crate) fn node_count(&self) -> u32 {
        self.config.node_count
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.config.workers
    }

    pub(crate) fn app_args(&self) -> &[String] {
        &self.config.app_args
    }

    pub(crate) fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Route one message to wherever its destination lives.
    ///
    /// Local destinations get a mailbox push and a worker wake; remote ones
    /// go to the outbound queue for the main loop to batch. A message for a
    /// name this node does not know is dropped and counted, never an error.
    pub(crate) fn route(&self, envelope: Envelope) {
        let destination = envelope.destination();
        if destination.is_none() {
            EngineMetrics::incr(&self.metrics.dropped_unknown);
            return;
        }
        let local = self.config.node_count == 1
            || destination.node(self.config.node_count) == self.config.node_id;
        if local {
            match self.registry.get(destination) {
                Some(cell) => {
                    cell.mailbox().push(envelope);
                    EngineMetrics::incr(&self.metrics.routed_local);
                    self.workers.schedule(cell);
                }
                None => {
                    trace!(%destination, "message for unknown local actor dropped");
                    EngineMetrics::incr(&self.metrics.dropped_unknown);
                }
            }
        } else {
            EngineMetrics::incr(&self.metrics.routed_remote);
            let _ = self.outbound.send(envelope);
        }
    }

    /// Allocate a slot and a name, build the behavior, hand the actor to
    /// the worker pool, and queue its start message.
    ///
    /// `None` supervisor means the actor supervises itself (initial actors).
    pub(crate) fn spawn_with_supervisor(
        &self,
        script: ScriptId,
        supervisor: Option<ActorName>,
        affinity: Option<usize>,
    ) -> Result<ActorName, NodeError> {
        let script = self.scripts.lookup(script)?;
        let slot = self.registry.allocate_slot()?;
        let name = match self.names.next() {
            Ok(name) => name,
            Err(e) => {
                self.registry.release_slot(slot);
                return Err(e);
            }
        };
        let supervisor = supervisor.unwrap_or(name);
        let cell = ActorCell::new(name, slot, script.instantiate(), supervisor, affinity);
        self.workers.assign(&cell);
        self.registry.insert(Arc::clone(&cell));
        self.alive.fetch_add(1, Ordering::AcqRel);
        EngineMetrics::incr(&self.metrics.spawned);
        debug!(actor = %name, script = script.name(), %supervisor, "spawned");

        self.route(Envelope::new(tags::ACTION_START, supervisor, name, Bytes::new()));
        Ok(name)
    }

    pub(crate) fn report_death(&self, name: ActorName) {
        let _ = self.deaths.send(name);
    }

    pub(crate) fn recycle_to(&self, worker: usize, buf: bytes::BytesMut) {
        self.workers.recycle(worker, buf);
    }

    pub(crate) fn requeue(&self, cell: Arc<ActorCell>) {
        self.workers.deliver(cell);
    }
}

/// One engine per process: owns the actors, workers, multiplexer, and
/// transport of this cluster member, and drives the main loop.
pub struct Node {
    shared: Arc<NodeShared>,
    pool: WorkerPool,
    transport: Box<dyn Transport>,
    multiplexer: Multiplexer,
    outbound_rx: Receiver<Envelope>,
    death_rx: Receiver<ActorName>,
    started_at: Instant,
    last_report: Instant,
}

impl Node {
    /// Initialize the engine: pools, worker pool, script registry, fault
    /// diagnostics. No actors exist yet.
    pub fn new(config: NodeConfig, transport: Box<dyn Transport>) -> Result<Self, NodeError> {
        config.validate()?;
        if transport.node_id() != config.node_id || transport.node_count() != config.node_count {
            return Err(NodeError::Config(format!(
                "transport endpoint {}/{} does not match configured {}/{}",
                transport.node_id(),
                transport.node_count(),
                config.node_id,
                config.node_count,
            )));
        }
        signal::install(config.node_id);

        let policy = if config.deterministic_names {
            NamePolicy::Deterministic
        } else {
            NamePolicy::Random
        };
        let names = NameAllocator::new(policy, config.node_id, config.node_count);
        let registry = ActorRegistry::new(config.max_actors);
        let multiplexer = Multiplexer::new(config.multiplex.clone(), config.node_count);
        let (links, receivers) = build_links(config.workers);
        let links = Arc::new(WorkerLinks::new(links));
        let (outbound_tx, outbound_rx) = unbounded();
        let (death_tx, death_rx) = unbounded();

        let auto_scale = config.auto_scale;
        let shared = Arc::new(NodeShared {
            config,
            registry,
            scripts: ScriptRegistry::new(),
            names,
            metrics: EngineMetrics::default(),
            workers: Arc::clone(&links),
            outbound: outbound_tx,
            deaths: death_tx,
            alive: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(&shared, links, receivers, auto_scale);

        info!(
            node = %shared.config.node_id,
            nodes = shared.config.node_count,
            workers = shared.config.workers,
            "node initialized"
        );
        Ok(Self {
            shared,
            pool,
            transport,
            multiplexer,
            outbound_rx,
            death_rx,
            started_at: Instant::now(),
            last_report: Instant::now(),
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.shared.config
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.shared.config.node_id
    }

    /// Register an actor class. Startup-time; ids are immutable afterwards.
    pub fn register_script(&self, script: Script) -> Result<(), NodeError> {
        self.shared.scripts.register(script).map_err(Into::into)
    }

    /// Spawn an initial actor (it supervises itself).
    pub fn spawn(&self, script: ScriptId) -> Result<ActorName, NodeError> {
        self.shared.spawn_with_supervisor(script, None, None)
    }

    /// Spawn an initial actor with a preferred worker. The hint wins when it
    /// names a real worker; placement is round-robin otherwise.
    pub fn spawn_pinned(
        &self,
        script: ScriptId,
        worker: usize,
    ) -> Result<ActorName, NodeError> {
        self.shared
            .spawn_with_supervisor(script, None, Some(worker))
    }

    /// Inject a message from outside the actor world (drivers, tests). The
    /// source is the none sentinel; replies to it go nowhere.
    pub fn send(&self, destination: ActorName, tag: u32, payload: &[u8]) {
        let payload = if payload.is_empty() {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(payload)
        };
        self.shared
            .route(Envelope::new(tag, ActorName::NONE, destination, payload));
    }

    /// Live actors owned by this node right now.
    pub fn alive_actors(&self) -> usize {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Snapshot the engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        let m = &self.shared.metrics;
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            alive: self.alive_actors(),
            spawned: EngineMetrics::load(&m.spawned),
            died: EngineMetrics::load(&m.died),
            routed_local: EngineMetrics::load(&m.routed_local),
            routed_remote: EngineMetrics::load(&m.routed_remote),
            inbound_payloads: EngineMetrics::load(&m.inbound_payloads),
            dropped_unknown: EngineMetrics::load(&m.dropped_unknown),
            dropped_dying: EngineMetrics::load(&m.dropped_dying),
            migrations: EngineMetrics::load(&m.migrations),
            worker_processed: self.pool.links().processed(),
            worker_pools: self.pool.links().pool_stats(),
            multiplexer: self.multiplexer.stats(),
        }
    }

    /// Drive the main loop on the calling thread until the node is
    /// quiescent: no live actors and nothing in flight. Tears the worker
    /// pool and transport down before returning, error or not.
    pub fn run(&mut self) -> Result<(), NodeError> {
        info!(node = %self.shared.config.node_id, "main loop running");
        let result = self.main_loop();
        if let Err(e) = &result {
            error!(node = %self.shared.config.node_id, error = %e, "fatal engine failure");
        }
        self.pool.stop();
        let _ = self.transport.shutdown();
        info!(node = %self.shared.config.node_id, "node down");
        result
    }

    fn main_loop(&mut self) -> Result<(), NodeError> {
        loop {
            let mut progressed = self.pump_transport()?;
            progressed |= self.drain_outbound()?;
            self.flush_expired_batches()?;
            progressed |= self.triage_deaths() > 0;
            self.report_tick();

            if self.drained() {
                // Death hooks may have produced final sends, and a batch
                // below its thresholds may still be parked; push everything
                // out before concluding.
                self.drain_outbound()?;
                self.flush_all_batches()?;
                self.transport.flush()?;
                if self.drained() && self.multiplexer.is_empty() {
                    break;
                }
                continue;
            }
            if !progressed {
                thread::sleep(Duration::from_micros(100));
            }
        }
        debug!(node = %self.shared.config.node_id, "quiescent");
        Ok(())
    }

    /// Nothing alive and nothing queued for routing or triage.
    fn drained(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire) == 0
            && self.outbound_rx.is_empty()
            && self.death_rx.is_empty()
    }

    /// Probe the transport and hand every completed inbound payload to
    /// local routing.
    fn pump_transport(&mut self) -> Result<bool, NodeError> {
        let mut progressed = false;
        while let Some(frame) = self.transport.poll()? {
            progressed = true;
            EngineMetrics::incr(&self.shared.metrics.inbound_payloads);
            trace!(source = %frame.source, len = frame.payload.len(), "inbound payload");
            self.deliver_inbound(frame.payload)?;
        }
        Ok(progressed)
    }

    /// Rematerialize the messages of one inbound payload and route them.
    fn deliver_inbound(&self, payload: Bytes) -> Result<(), NodeError> {
        if wire::is_batch(&payload) {
            for envelope in wire::decode_batch(payload)? {
                self.shared.route(envelope);
            }
        } else {
            let mut payload = payload;
            let envelope = wire::decode(&mut payload)?;
            self.shared.route(envelope);
        }
        Ok(())
    }

    /// Feed the workers' outbound traffic through the multiplexer.
    fn drain_outbound(&mut self) -> Result<bool, NodeError> {
        let mut progressed = false;
        let node_count = self.shared.config.node_count;
        let transport = &mut self.transport;
        let mut sink =
            |destination: NodeId, payload: Bytes| transport.send(destination, payload);
        while let Ok(envelope) = self.outbound_rx.try_recv() {
            progressed = true;
            let destination = envelope.destination().node(node_count);
            self.multiplexer
                .multiplex(destination, &envelope, &mut sink)?;
        }
        Ok(progressed)
    }

    fn flush_expired_batches(&mut self) -> Result<(), NodeError> {
        let transport = &mut self.transport;
        let mut sink =
            |destination: NodeId, payload: Bytes| transport.send(destination, payload);
        self.multiplexer.flush_expired(&mut sink)?;
        Ok(())
    }

    fn flush_all_batches(&mut self) -> Result<(), NodeError> {
        let transport = &mut self.transport;
        let mut sink =
            |destination: NodeId, payload: Bytes| transport.send(destination, payload);
        self.multiplexer.flush_all(&mut sink)?;
        Ok(())
    }

    /// Reclaim every actor the workers marked dying since the last pass.
    fn triage_deaths(&mut self) -> usize {
        let mut reclaimed = 0;
        while let Ok(name) = self.death_rx.try_recv() {
            if let Some(cell) = self.shared.registry.remove(name) {
                cell.body().lifecycle.mark_dead();
                for _ in cell.mailbox().drain() {
                    EngineMetrics::incr(&self.shared.metrics.dropped_dying);
                }
                EngineMetrics::incr(&self.shared.metrics.died);
                let was = self.shared.alive.fetch_sub(1, Ordering::AcqRel);
                debug!(actor = %name, alive = was.saturating_sub(1), "actor reclaimed");
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Periodic work: balancing and instrumentation output.
    fn report_tick(&mut self) {
        if self.last_report.elapsed() < LOAD_PERIOD {
            return;
        }
        self.last_report = Instant::now();
        self.pool
            .rebalance(&self.shared.registry, &self.shared.metrics);

        let config = &self.shared.config;
        if !(config.print_load || config.print_counters || config.print_memory_usage) {
            return;
        }
        let snapshot = self.metrics();
        if config.print_load {
            info!(
                node = %config.node_id,
                alive = snapshot.alive,
                processed = ?snapshot.worker_processed,
                "load"
            );
        }
        if config.print_memory_usage {
            info!(
                node = %config.node_id,
                pools = ?snapshot.worker_pools,
                multiplexer = ?snapshot.multiplexer,
                "memory"
            );
        }
        if config.print_counters {
            info!(node = %config.node_id, counters = %snapshot.to_json(), "counters");
        }
    }
}
