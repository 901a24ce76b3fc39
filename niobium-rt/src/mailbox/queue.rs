//! The per-actor FIFO.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::message::Envelope;

/// Multi-producer, single-consumer FIFO of envelopes for one actor.
///
/// Any thread may enqueue; only the actor's current worker dequeues. The
/// queue is a short critical section behind a `parking_lot` mutex, which is
/// a bare CAS when uncontended. Contention requires two producers hitting
/// the same actor in the same instant. Messages from one producer are
/// delivered in the order that producer enqueued them.
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    /// Mirror of the queue length, readable without the lock.
    depth: AtomicUsize,
    enqueued: AtomicU64,
}

impl Mailbox {
    /// An empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message. Returns `true` when the mailbox was empty, the
    /// edge on which the owning worker must be woken.
    pub fn push(&self, envelope: Envelope) -> bool {
        let mut queue = self.queue.lock();
        let was_empty = queue.is_empty();
        queue.push_back(envelope);
        self.depth.store(queue.len(), Ordering::Release);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        was_empty
    }

    /// Dequeue the oldest message, if any. Single consumer.
    pub fn pop(&self) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let envelope = queue.pop_front();
        self.depth.store(queue.len(), Ordering::Release);
        envelope
    }

    /// Take every queued message at once (death triage).
    pub fn drain(&self) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        self.depth.store(0, Ordering::Release);
        queue.drain(..).collect()
    }

    /// Messages currently queued. Lock-free observation.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether the mailbox is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages enqueued over the mailbox's lifetime.
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}
