//! Engine counters and periodic snapshots.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

// Layer 3: Internal module imports
use crate::memory::PoolStats;
use crate::multiplex::MultiplexStats;

/// Shared atomic counters every engine thread records into.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Actors spawned on this node.
    pub spawned: AtomicU64,
    /// Actors reclaimed on this node.
    pub died: AtomicU64,
    /// Messages delivered to a local mailbox.
    pub routed_local: AtomicU64,
    /// Messages handed to the outbound path.
    pub routed_remote: AtomicU64,
    /// Inbound transport payloads (single messages or batches).
    pub inbound_payloads: AtomicU64,
    /// Messages dropped: destination unknown to this node.
    pub dropped_unknown: AtomicU64,
    /// Messages dropped: destination was already dying or dead.
    pub dropped_dying: AtomicU64,
    /// Actors moved between workers by the balancer.
    pub migrations: AtomicU64,
}

impl EngineMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the node, serializable for the counter reports.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the node started.
    pub uptime_seconds: u64,
    /// Live actors right now.
    pub alive: usize,
    pub spawned: u64,
    pub died: u64,
    pub routed_local: u64,
    pub routed_remote: u64,
    pub inbound_payloads: u64,
    pub dropped_unknown: u64,
    pub dropped_dying: u64,
    pub migrations: u64,
    /// Messages processed per worker since start.
    pub worker_processed: Vec<u64>,
    /// Outbound pool counters per worker.
    pub worker_pools: Vec<PoolStats>,
    /// Batching counters.
    pub multiplexer: MultiplexStats,
}

impl MetricsSnapshot {
    /// Render as a single-line JSON record.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
