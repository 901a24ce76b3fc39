//! Shared actor handle and exclusive actor state.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::{Mutex, MutexGuard};

// Layer 3: Internal module imports
use super::acquaintance::AcquaintanceTable;
use super::lifecycle::Lifecycle;
use super::traits::Behavior;
use crate::mailbox::Mailbox;
use crate::util::ActorName;

/// The exclusive half of an actor: everything the dispatching worker
/// mutates while it holds the claim.
pub struct ActorBody {
    pub(crate) behavior: Box<dyn Behavior>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) supervisor: ActorName,
    pub(crate) acquaintances: AcquaintanceTable,
    pub(crate) children: Vec<ActorName>,
}

/// The shared half of an actor: handle through which producers enqueue and
/// workers claim.
///
/// Claiming works by a CAS on the `running` flag; the body mutex behind it
/// is therefore uncontended and only exists to make the hand-off safe. The
/// `ready` flag records whether the cell currently sits in some worker's
/// ready queue, so an actor is enqueued at most once however many producers
/// hit its mailbox. The home worker index is published atomically; producers
/// read it at enqueue time, which is what makes migration a single store.
pub struct ActorCell {
    name: ActorName,
    slot: usize,
    mailbox: Mailbox,
    home_worker: AtomicUsize,
    affinity: Option<usize>,
    ready: AtomicBool,
    running: AtomicBool,
    body: Mutex<ActorBody>,
}

impl ActorCell {
    pub(crate) fn new(
        name: ActorName,
        slot: usize,
        behavior: Box<dyn Behavior>,
        supervisor: ActorName,
        affinity: Option<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            slot,
            mailbox: Mailbox::new(),
            home_worker: AtomicUsize::new(0),
            affinity,
            ready: AtomicBool::new(false),
            running: AtomicBool::new(false),
            body: Mutex::new(ActorBody {
                behavior,
                lifecycle: Lifecycle::spawned(),
                supervisor,
                acquaintances: AcquaintanceTable::new(),
                children: Vec::new(),
            }),
        })
    }

    /// The actor's globally unique name.
    pub fn name(&self) -> ActorName {
        self.name
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    /// The actor's mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Preferred worker, if the spawner expressed one.
    pub(crate) fn affinity(&self) -> Option<usize> {
        self.affinity
    }

    /// Worker currently responsible for this actor.
    pub(crate) fn home_worker(&self) -> usize {
        self.home_worker.load(Ordering::Acquire)
    }

    pub(crate) fn set_home_worker(&self, worker: usize) {
        self.home_worker.store(worker, Ordering::Release);
    }

    /// Try to take exclusive dispatch rights. Fails when another worker is
    /// inside the actor (a migration race).
    pub(crate) fn claim(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Mark the actor as sitting in a ready queue. Returns `true` on the
    /// not-ready to ready edge, the moment the cell must actually be
    /// enqueued.
    pub(crate) fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Neither enqueued nor being dispatched; safe to migrate.
    pub(crate) fn is_idle(&self) -> bool {
        !self.ready.load(Ordering::Acquire) && !self.running.load(Ordering::Acquire)
    }

    pub(crate) fn body(&self) -> MutexGuard<'_, ActorBody> {
        self.body.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::context::ActorContext;
    use crate::message::Envelope;

    struct Inert;

    impl Behavior for Inert {
        fn receive(&mut self, _message: &Envelope, _ctx: &mut ActorContext<'_>) {}
    }

    fn cell() -> Arc<ActorCell> {
        ActorCell::new(
            ActorName::from_raw(1),
            0,
            Box::new(Inert),
            ActorName::from_raw(1),
            None,
        )
    }

    #[test]
    fn test_claim_is_exclusive() {
        let cell = cell();
        assert!(cell.claim());
        assert!(!cell.claim());
        cell.release();
        assert!(cell.claim());
    }

    #[test]
    fn test_ready_edge() {
        let cell = cell();
        assert!(cell.mark_ready());
        assert!(!cell.mark_ready());
        cell.clear_ready();
        assert!(cell.mark_ready());
    }

    #[test]
    fn test_idle_requires_neither_flag() {
        let cell = cell();
        assert!(cell.is_idle());
        cell.mark_ready();
        assert!(!cell.is_idle());
        cell.clear_ready();
        cell.claim();
        assert!(!cell.is_idle());
        cell.release();
        assert!(cell.is_idle());
    }

    #[test]
    fn test_home_worker_publication() {
        let cell = cell();
        assert_eq!(cell.home_worker(), 0);
        cell.set_home_worker(3);
        assert_eq!(cell.home_worker(), 3);
    }

    #[test]
    fn test_new_cell_is_spawned() {
        let cell = cell();
        let body = cell.body();
        assert!(body.lifecycle.is_spawned());
        assert!(body.lifecycle.accepts_messages());
        assert_eq!(body.supervisor, ActorName::from_raw(1));
        assert!(body.children.is_empty());
    }
}
