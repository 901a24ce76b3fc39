//! Per-destination batching with size and age flush triggers.

// Layer 1: Standard library imports
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

// Layer 3: Internal module imports
use super::batch::Batch;
use crate::memory::{MemoryPool, PoolConfig};
use crate::message::{wire, Envelope};
use crate::transport::TransportError;
use crate::util::NodeId;

/// Flush policy for outbound batching.
#[derive(Debug, Clone)]
pub struct MultiplexPolicy {
    /// A batch reaching this many bytes is flushed immediately. Messages
    /// whose single frame would reach it on their own skip batching.
    pub flush_threshold: usize,

    /// Oldest a non-empty batch may grow before the engine's main loop
    /// flushes it. This bounds the latency tax batching may charge.
    pub max_delay: Duration,

    /// Tags that always go straight to the transport, regardless of size:
    /// synchronization traffic that must not sit in a batch.
    pub bypass_tags: Vec<u32>,
}

impl Default for MultiplexPolicy {
    fn default() -> Self {
        Self {
            flush_threshold: 8 * 1024,
            max_delay: Duration::from_millis(1),
            bypass_tags: Vec::new(),
        }
    }
}

impl MultiplexPolicy {
    /// Whether `tag` skips batching.
    pub fn bypasses(&self, tag: u32) -> bool {
        self.bypass_tags.contains(&tag)
    }
}

/// Batching activity counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MultiplexStats {
    /// Frames appended to batches.
    pub frames_batched: u64,
    /// Batches handed to the transport.
    pub batches_flushed: u64,
    /// Messages that went to the transport unbatched.
    pub direct_sends: u64,
    /// Total payload bytes handed to the transport.
    pub bytes_flushed: u64,
}

/// Converts many small outbound cross-node messages into few large
/// transport sends.
///
/// One batch per destination node. Owned by the engine's main loop, which
/// feeds it the workers' outbound traffic and drives the age trigger every
/// iteration. Frames for one destination keep their append order within a
/// batch, and batches for one destination are flushed in open order, so the
/// pairwise transport ordering carries over to the messages inside.
pub struct Multiplexer {
    policy: MultiplexPolicy,
    batches: Vec<Option<Batch>>,
    pool: MemoryPool,
    stats: MultiplexStats,
}

impl Multiplexer {
    /// A multiplexer for a cluster of `node_count` nodes.
    pub fn new(policy: MultiplexPolicy, node_count: u32) -> Self {
        // Batch buffers cycle through the pool; one slab holds several.
        let slab = (policy.flush_threshold * 4).max(64 * 1024);
        let mut batches = Vec::new();
        batches.resize_with(node_count as usize, || None);
        Self {
            policy,
            batches,
            pool: MemoryPool::new(PoolConfig {
                slab_size: slab,
                ..PoolConfig::default()
            }),
            stats: MultiplexStats::default(),
        }
    }

    /// The active policy.
    pub fn policy(&self) -> &MultiplexPolicy {
        &self.policy
    }

    /// Route one outbound message: append it to the destination's batch, or
    /// hand it to `sink` directly when it is large, bypass-tagged, or
    /// batching is pointless for it.
    pub fn multiplex<F>(
        &mut self,
        destination: NodeId,
        envelope: &Envelope,
        sink: &mut F,
    ) -> Result<(), TransportError>
    where
        F: FnMut(NodeId, Bytes) -> Result<(), TransportError>,
    {
        let frame_len = wire::encoded_len(envelope);
        if frame_len >= self.policy.flush_threshold || self.policy.bypasses(envelope.tag()) {
            // Order with what is already batched for this destination.
            self.flush(destination, sink)?;
            let mut buf = self.pool.allocate(frame_len);
            buf.clear();
            wire::encode(envelope, &mut buf);
            self.stats.direct_sends += 1;
            self.stats.bytes_flushed += frame_len as u64;
            trace!(%destination, len = frame_len, "direct send");
            return sink(destination, buf.freeze());
        }

        let threshold = self.policy.flush_threshold;
        let pool = &mut self.pool;
        let slot = &mut self.batches[destination.index()];
        let batch = slot.get_or_insert_with(|| {
            let mut buf = pool.allocate(threshold + 256);
            buf.clear();
            Batch::open(buf)
        });
        batch.append(envelope);
        self.stats.frames_batched += 1;
        if batch.len() >= threshold {
            self.flush(destination, sink)?;
        }
        Ok(())
    }

    /// Flush the batch for one destination, if it holds anything.
    pub fn flush<F>(&mut self, destination: NodeId, sink: &mut F) -> Result<(), TransportError>
    where
        F: FnMut(NodeId, Bytes) -> Result<(), TransportError>,
    {
        if let Some(batch) = self.batches[destination.index()].take() {
            if batch.frame_count() > 0 {
                let payload = batch.seal();
                self.stats.batches_flushed += 1;
                self.stats.bytes_flushed += payload.len() as u64;
                trace!(%destination, len = payload.len(), "batch flush");
                sink(destination, payload)?;
            }
        }
        Ok(())
    }

    /// Flush every batch older than the policy's delay bound. Driven by the
    /// engine's main loop each iteration.
    pub fn flush_expired<F>(&mut self, sink: &mut F) -> Result<(), TransportError>
    where
        F: FnMut(NodeId, Bytes) -> Result<(), TransportError>,
    {
        let now = Instant::now();
        for index in 0..self.batches.len() {
            let expired = self.batches[index]
                .as_ref()
                .is_some_and(|batch| batch.age(now) >= self.policy.max_delay);
            if expired {
                self.flush(NodeId::from_raw(index as u32), sink)?;
            }
        }
        Ok(())
    }

    /// Flush everything, age notwithstanding (shutdown path).
    pub fn flush_all<F>(&mut self, sink: &mut F) -> Result<(), TransportError>
    where
        F: FnMut(NodeId, Bytes) -> Result<(), TransportError>,
    {
        for index in 0..self.batches.len() {
            self.flush(NodeId::from_raw(index as u32), sink)?;
        }
        Ok(())
    }

    /// Whether no batch holds pending frames.
    pub fn is_empty(&self) -> bool {
        self.batches
            .iter()
            .all(|slot| slot.as_ref().map_or(true, |batch| batch.frame_count() == 0))
    }

    /// Activity counters.
    pub fn stats(&self) -> MultiplexStats {
        self.stats
    }

    /// Pool counters, for memory reports.
    pub fn pool_stats(&self) -> crate::memory::PoolStats {
        self.pool.stats()
    }
}
