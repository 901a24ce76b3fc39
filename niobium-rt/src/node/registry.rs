//! The owned-actors table.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::errors::NodeError;
use crate::actor::ActorCell;
use crate::util::ActorName;

/// Name-addressed table of the actors this node owns.
///
/// The send fast path is a lock-free map lookup. Slot indices (bounded when
/// the node caps its actor count) recycle through a free list behind a
/// short spawn-and-death lock; names never recycle, only slots do.
pub struct ActorRegistry {
    cells: DashMap<ActorName, Arc<ActorCell>>,
    slots: Mutex<SlotTable>,
}

struct SlotTable {
    /// Next never-used slot index.
    high_water: usize,
    /// Indices of retired actors, reused first.
    free: Vec<usize>,
    /// 0 means unbounded.
    capacity: usize,
    live: usize,
}

impl ActorRegistry {
    /// A registry holding at most `capacity` live actors (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: DashMap::new(),
            slots: Mutex::new(SlotTable {
                high_water: 0,
                free: Vec::new(),
                capacity,
                live: 0,
            }),
        }
    }

    /// Reserve a slot for a spawn. Held lock is short: allocation only.
    pub fn allocate_slot(&self) -> Result<usize, NodeError> {
        let mut slots = self.slots.lock();
        if slots.capacity != 0 && slots.live >= slots.capacity {
            return Err(NodeError::SlotsExhausted {
                capacity: slots.capacity,
            });
        }
        slots.live += 1;
        if let Some(slot) = slots.free.pop() {
            return Ok(slot);
        }
        let slot = slots.high_water;
        slots.high_water += 1;
        Ok(slot)
    }

    /// Hand back a slot whose spawn did not complete.
    pub fn release_slot(&self, slot: usize) {
        let mut slots = self.slots.lock();
        slots.free.push(slot);
        slots.live = slots.live.saturating_sub(1);
    }

    /// Publish a spawned actor under its name.
    pub fn insert(&self, cell: Arc<ActorCell>) {
        self.cells.insert(cell.name(), cell);
    }

    /// Resolve a name. Lock-free.
    pub fn get(&self, name: ActorName) -> Option<Arc<ActorCell>> {
        self.cells.get(&name).map(|entry| Arc::clone(entry.value()))
    }

    /// Retire a dead actor: unpublish the name and recycle the slot.
    pub fn remove(&self, name: ActorName) -> Option<Arc<ActorCell>> {
        let (_, cell) = self.cells.remove(&name)?;
        let mut slots = self.slots.lock();
        slots.free.push(cell.slot());
        slots.live = slots.live.saturating_sub(1);
        Some(cell)
    }

    /// Live actors owned by this node.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the node owns no actors.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Visit every live cell.
    pub fn for_each(&self, mut visit: impl FnMut(&Arc<ActorCell>)) {
        for entry in self.cells.iter() {
            visit(entry.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorContext, Behavior};
    use crate::message::Envelope;

    struct Inert;

    impl Behavior for Inert {
        fn receive(&mut self, _message: &Envelope, _ctx: &mut ActorContext<'_>) {}
    }

    fn cell(name: u32, slot: usize) -> Arc<ActorCell> {
        ActorCell::new(
            ActorName::from_raw(name),
            slot,
            Box::new(Inert),
            ActorName::from_raw(name),
            None,
        )
    }

    #[test]
    fn test_insert_resolve_remove() {
        let registry = ActorRegistry::new(0);
        let slot = registry.allocate_slot().unwrap();
        registry.insert(cell(7, slot));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(ActorName::from_raw(7)).unwrap().name().raw(),
            7
        );
        assert!(registry.get(ActorName::from_raw(8)).is_none());

        registry.remove(ActorName::from_raw(7)).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get(ActorName::from_raw(7)).is_none());
    }

    #[test]
    fn test_slots_recycle_but_names_do_not() {
        let registry = ActorRegistry::new(0);
        let first = registry.allocate_slot().unwrap();
        registry.insert(cell(1, first));
        registry.remove(ActorName::from_raw(1));

        // The retired slot index is handed out again for a new name.
        let second = registry.allocate_slot().unwrap();
        assert_eq!(second, first);
        registry.insert(cell(2, second));
        assert!(registry.get(ActorName::from_raw(1)).is_none());
        assert!(registry.get(ActorName::from_raw(2)).is_some());
    }

    #[test]
    fn test_capacity_enforced() {
        let registry = ActorRegistry::new(2);
        registry.allocate_slot().unwrap();
        registry.allocate_slot().unwrap();
        assert!(matches!(
            registry.allocate_slot(),
            Err(NodeError::SlotsExhausted { capacity: 2 })
        ));
    }

    #[test]
    fn test_for_each_visits_all() {
        let registry = ActorRegistry::new(0);
        for name in 0..5u32 {
            let slot = registry.allocate_slot().unwrap();
            registry.insert(cell(name, slot));
        }
        let mut visited = 0;
        registry.for_each(|_| visited += 1);
        assert_eq!(visited, 5);
    }
}
