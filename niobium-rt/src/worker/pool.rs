//! Worker pool: thread lifecycle, actor placement, load balancing.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

// Layer 2: Third-party crate imports
use bytes::BytesMut;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

// Layer 3: Internal module imports
use super::worker::{WorkerCommand, WorkerCore};
use crate::actor::ActorCell;
use crate::memory::PoolStats;
use crate::node::engine::NodeShared;
use crate::node::metrics::EngineMetrics;
use crate::node::registry::ActorRegistry;

/// Processed-message imbalance (per window) that triggers a migration.
const MIGRATION_THRESHOLD: u64 = 64;

/// The sending half of one worker: everything other threads touch.
pub(crate) struct WorkerLink {
    pub(crate) commands: Sender<WorkerCommand>,
    pub(crate) recycle: Sender<BytesMut>,
    pub(crate) processed: Arc<AtomicU64>,
    pub(crate) pool_stats: Arc<Mutex<PoolStats>>,
}

/// Shared view of every worker, used by the engine's routing fast path.
pub(crate) struct WorkerLinks {
    links: Vec<WorkerLink>,
    next: AtomicUsize,
}

impl WorkerLinks {
    pub(crate) fn new(links: Vec<WorkerLink>) -> Self {
        Self {
            links,
            next: AtomicUsize::new(0),
        }
    }

    /// Place a new actor: affinity hint first, round-robin otherwise.
    pub(crate) fn assign(&self, cell: &ActorCell) -> usize {
        let worker = cell
            .affinity()
            .filter(|hint| *hint < self.links.len())
            .unwrap_or_else(|| self.next.fetch_add(1, Ordering::Relaxed) % self.links.len());
        cell.set_home_worker(worker);
        worker
    }

    /// Wake the owning worker if the actor is not already queued.
    pub(crate) fn schedule(&self, cell: Arc<ActorCell>) {
        if cell.mark_ready() {
            self.deliver(cell);
        }
    }

    /// Queue the actor on its current home worker, readiness already held.
    pub(crate) fn deliver(&self, cell: Arc<ActorCell>) {
        let home = cell.home_worker();
        if let Some(link) = self.links.get(home) {
            let _ = link.commands.send(WorkerCommand::Dispatch(cell));
        }
    }

    /// Route a freed buffer home to the worker whose pool owns it.
    pub(crate) fn recycle(&self, worker: usize, buf: BytesMut) {
        if let Some(link) = self.links.get(worker) {
            let _ = link.recycle.send(buf);
        }
    }

    /// Messages processed per worker since start.
    pub(crate) fn processed(&self) -> Vec<u64> {
        self.links
            .iter()
            .map(|link| link.processed.load(Ordering::Relaxed))
            .collect()
    }

    /// Outbound-pool counters per worker.
    pub(crate) fn pool_stats(&self) -> Vec<PoolStats> {
        self.links
            .iter()
            .map(|link| *link.pool_stats.lock())
            .collect()
    }

    fn stop_all(&self) {
        for link in &self.links {
            let _ = link.commands.send(WorkerCommand::Stop);
        }
    }
}

/// Build the channel pairs for `worker_count` workers: the shareable links
/// and the receiving halves the threads will own.
pub(crate) type WorkerReceivers = Vec<(Receiver<WorkerCommand>, Receiver<BytesMut>)>;

pub(crate) fn build_links(worker_count: usize) -> (Vec<WorkerLink>, WorkerReceivers) {
    let mut links = Vec::with_capacity(worker_count);
    let mut receivers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (command_tx, command_rx) = unbounded();
        let (recycle_tx, recycle_rx) = unbounded();
        links.push(WorkerLink {
            commands: command_tx,
            recycle: recycle_tx,
            processed: Arc::new(AtomicU64::new(0)),
            pool_stats: Arc::new(Mutex::new(PoolStats::default())),
        });
        receivers.push((command_rx, recycle_rx));
    }
    (links, receivers)
}

/// Windowed balancing state, behind its own lock.
struct Balancer {
    enabled: bool,
    window: Vec<u64>,
}

impl Balancer {
    fn rebalance(&mut self, links: &WorkerLinks, registry: &ActorRegistry, metrics: &EngineMetrics) {
        let totals = links.processed();
        if self.window.len() != totals.len() {
            self.window = totals;
            return;
        }
        let deltas: Vec<u64> = totals
            .iter()
            .zip(&self.window)
            .map(|(now, then)| now.saturating_sub(*then))
            .collect();
        self.window = totals;
        if !self.enabled || deltas.len() < 2 {
            return;
        }

        let (busiest, max) = peak(&deltas, |a, b| a > b);
        let (calmest, min) = peak(&deltas, |a, b| a < b);
        if max.saturating_sub(min) < MIGRATION_THRESHOLD {
            return;
        }

        // Move one idle actor off the hot worker. Idle means neither queued
        // nor running, so the home index can be republished without a drain:
        // producers read it at enqueue time.
        let mut migrated = false;
        registry.for_each(|cell| {
            if !migrated && cell.home_worker() == busiest && cell.is_idle() {
                cell.set_home_worker(calmest);
                EngineMetrics::incr(&metrics.migrations);
                debug!(actor = %cell.name(), from = busiest, to = calmest, "actor migrated");
                migrated = true;
            }
        });
    }
}

fn peak(deltas: &[u64], better: impl Fn(u64, u64) -> bool) -> (usize, u64) {
    let mut at = 0;
    let mut best = deltas[0];
    for (index, delta) in deltas.iter().enumerate() {
        if better(*delta, best) {
            at = index;
            best = *delta;
        }
    }
    (at, best)
}

/// Owns the worker threads. Lives on the engine's main loop.
pub struct WorkerPool {
    links: Arc<WorkerLinks>,
    threads: Vec<JoinHandle<()>>,
    balancer: Mutex<Balancer>,
}

impl WorkerPool {
    /// Spawn the worker threads against an already-built link set.
    pub(crate) fn start(
        node: &Arc<NodeShared>,
        links: Arc<WorkerLinks>,
        receivers: WorkerReceivers,
        auto_scale: bool,
    ) -> Self {
        let mut threads = Vec::with_capacity(receivers.len());
        for (id, (commands, recycle)) in receivers.into_iter().enumerate() {
            let core = WorkerCore::new(
                id,
                Arc::clone(node),
                commands,
                recycle,
                Arc::clone(&links.links[id].processed),
                Arc::clone(&links.links[id].pool_stats),
            );
            let handle = thread::Builder::new()
                .name(format!("niobium-worker-{id}"))
                .spawn(move || core.run());
            match handle {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Thread exhaustion is unrecoverable for the engine.
                    error!(worker = id, error = %e, "worker thread spawn failed");
                    std::process::abort();
                }
            }
        }
        Self {
            links,
            threads,
            balancer: Mutex::new(Balancer {
                enabled: auto_scale,
                window: Vec::new(),
            }),
        }
    }

    pub(crate) fn links(&self) -> &WorkerLinks {
        &self.links
    }

    /// Periodic load accounting and, when enabled, migration.
    pub(crate) fn rebalance(&self, registry: &ActorRegistry, metrics: &EngineMetrics) {
        self.balancer.lock().rebalance(&self.links, registry, metrics);
    }

    /// Cooperative stop: signal every worker, then join them.
    pub(crate) fn stop(&mut self) {
        self.links.stop_all();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
