//! Slab-carving buffer pool with size-class recycling.
//!
//! The pool serves small allocations by carving the front off a large slab
//! (`BytesMut::split_to`), so a slab acts as a bump allocator whose backing
//! allocation is released once every carved chunk has been dropped. Freed
//! chunks re-enter a recycle bin keyed by size class and are handed out again
//! before any new carving happens. Requests at or above the slab size bypass
//! the slabs entirely and are tracked separately.

// Layer 1: Standard library imports
use std::collections::{HashMap, VecDeque};
use std::mem;

// Layer 2: Third-party crate imports
use bytes::BytesMut;
use serde::Serialize;

// Layer 3: Internal module imports
// (none)

/// Default slab size: 1 MiB.
pub const DEFAULT_SLAB_SIZE: usize = 1 << 20;

/// Configuration flags for a [`MemoryPool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Size of each slab the pool carves small allocations from.
    pub slab_size: usize,

    /// When enabled, freed buffers enter size-class recycle bins and are
    /// served again before carving. When disabled, `free` is a no-op and the
    /// owner reclaims slab space wholesale with `free_all`.
    pub tracking: bool,

    /// Round request sizes up to the next power of two so freed buffers
    /// coalesce onto a small lattice of bins.
    pub normalize: bool,

    /// Bypass the pool entirely; every request is a plain allocation.
    pub disabled: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            slab_size: DEFAULT_SLAB_SIZE,
            tracking: true,
            normalize: true,
            disabled: false,
        }
    }
}

impl PoolConfig {
    /// Scratch configuration: no recycling, the owner resets with `free_all`.
    pub fn ephemeral(slab_size: usize) -> Self {
        Self {
            slab_size,
            tracking: false,
            normalize: false,
            disabled: false,
        }
    }

    /// Pass every request straight to the system allocator.
    pub fn bypass() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }
}

/// Counters describing pool activity, cheap to copy into reports.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PoolStats {
    /// Slabs requested from the system allocator.
    pub slab_allocations: u64,
    /// Allocations served by carving from a slab.
    pub carved: u64,
    /// Allocations served from a recycle bin.
    pub bin_hits: u64,
    /// Buffers returned to a recycle bin.
    pub freed: u64,
    /// Requests at or above the slab size, served directly.
    pub large_allocations: u64,
    /// Large buffers released back to the system.
    pub large_released: u64,
    /// Requests served while the pool was disabled.
    pub bypass_allocations: u64,
    /// `free_all` invocations.
    pub resets: u64,
}

/// A per-owner buffer pool.
///
/// Not `Sync` by design: exactly one owner thread touches a pool. Buffers
/// freed elsewhere come home through the owner's triage queue.
#[derive(Debug)]
pub struct MemoryPool {
    config: PoolConfig,
    /// Slab currently being carved.
    current: BytesMut,
    /// Slabs reset by `free_all`, reusable before asking the system.
    ready: VecDeque<BytesMut>,
    /// Exhausted slab stubs awaiting `free_all`.
    dried: Vec<BytesMut>,
    /// Recycle bins: size class -> FIFO of freed buffers.
    bins: HashMap<usize, VecDeque<BytesMut>>,
    /// Large buffers currently outstanding.
    large_outstanding: usize,
    stats: PoolStats,
}

impl MemoryPool {
    /// Create an empty pool; the first allocation pulls the first slab.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            current: BytesMut::new(),
            ready: VecDeque::new(),
            dried: Vec::new(),
            bins: HashMap::new(),
            large_outstanding: 0,
            stats: PoolStats::default(),
        }
    }

    /// Allocate a zero-initialized buffer of exactly `size` bytes.
    ///
    /// The buffer's capacity is the (possibly normalized) size class, so a
    /// later [`free`](Self::free) re-bins it where the next request of the
    /// same class will find it.
    pub fn allocate(&mut self, size: usize) -> BytesMut {
        if size == 0 {
            return BytesMut::new();
        }
        if self.config.disabled {
            self.stats.bypass_allocations += 1;
            return BytesMut::zeroed(size);
        }

        let class = self.size_class(size);
        if class >= self.config.slab_size {
            self.stats.large_allocations += 1;
            self.large_outstanding += 1;
            let mut buf = BytesMut::with_capacity(class);
            buf.resize(size, 0);
            return buf;
        }

        if self.config.tracking {
            if let Some(queue) = self.bins.get_mut(&class) {
                if let Some(mut buf) = queue.pop_front() {
                    self.stats.bin_hits += 1;
                    buf.resize(size, 0);
                    return buf;
                }
            }
        }

        if self.current.len() < class {
            self.retire_current();
            self.current = self.next_slab(class);
        }

        self.stats.carved += 1;
        let mut chunk = self.current.split_to(class);
        chunk.truncate(size);
        chunk
    }

    /// Return a buffer to the pool.
    ///
    /// Large buffers go back to the system immediately. With tracking
    /// disabled this is a no-op and the buffer is simply dropped; its slab
    /// space comes back once every sibling chunk is gone.
    pub fn free(&mut self, buf: BytesMut) {
        if buf.capacity() == 0 || self.config.disabled {
            return;
        }
        if buf.capacity() >= self.config.slab_size {
            self.large_outstanding = self.large_outstanding.saturating_sub(1);
            self.stats.large_released += 1;
            return;
        }
        if !self.config.tracking {
            return;
        }
        let class = self.bin_class(buf.capacity());
        self.stats.freed += 1;
        self.bins.entry(class).or_default().push_back(buf);
    }

    /// Reset slab state: retired slab stubs become ready for carving again.
    ///
    /// Recycle bins and large-buffer tracking are untouched.
    pub fn free_all(&mut self) {
        self.stats.resets += 1;
        self.retire_current();
        while let Some(slab) = self.dried.pop() {
            if !slab.is_empty() {
                self.ready.push_back(slab);
            }
        }
    }

    /// Activity counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Bytes currently parked in recycle bins.
    pub fn bytes_in_bins(&self) -> usize {
        self.bins
            .iter()
            .map(|(class, queue)| class * queue.len())
            .sum()
    }

    /// Large buffers handed out and not yet freed.
    pub fn large_outstanding(&self) -> usize {
        self.large_outstanding
    }

    fn retire_current(&mut self) {
        let exhausted = mem::take(&mut self.current);
        if !exhausted.is_empty() {
            self.dried.push(exhausted);
        }
    }

    fn next_slab(&mut self, class: usize) -> BytesMut {
        loop {
            match self.ready.pop_front() {
                Some(slab) if slab.len() >= class => return slab,
                Some(slab) => self.dried.push(slab),
                None => {
                    self.stats.slab_allocations += 1;
                    return BytesMut::zeroed(self.config.slab_size);
                }
            }
        }
    }

    /// Class a request is served at: the next power of two when normalizing.
    fn size_class(&self, size: usize) -> usize {
        if self.config.normalize {
            size.checked_next_power_of_two().unwrap_or(size)
        } else {
            size
        }
    }

    /// Class a returned buffer is binned at. Rounds down so a later resize
    /// within the class always fits the buffer's capacity.
    fn bin_class(&self, capacity: usize) -> usize {
        if self.config.normalize && !capacity.is_power_of_two() {
            let shift = usize::BITS - 1 - capacity.leading_zeros();
            1usize << shift
        } else {
            capacity
        }
    }
}
