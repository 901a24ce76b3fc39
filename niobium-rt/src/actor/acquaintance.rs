//! Compact per-actor peer addressing.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::util::ActorName;

/// Maps small local indices to peer actor names.
///
/// Actors refer to peers by these indices when packing message graphs, so a
/// payload can carry a one-byte slot instead of a full name. Index 0 is
/// conventionally self or the supervisor; that convention belongs to the
/// script, not the engine. Acquaintances are names, never references:
/// lookup happens on use, so there are no cycles to manage.
#[derive(Debug, Default)]
pub struct AcquaintanceTable {
    names: Vec<ActorName>,
}

impl AcquaintanceTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `index` to `peer`, growing the table with empty slots as needed.
    pub fn bind(&mut self, index: usize, peer: ActorName) {
        if index >= self.names.len() {
            self.names.resize(index + 1, ActorName::NONE);
        }
        self.names[index] = peer;
    }

    /// The peer bound at `index`, if any.
    pub fn get(&self, index: usize) -> Option<ActorName> {
        self.names
            .get(index)
            .copied()
            .filter(|name| !name.is_none())
    }

    /// Index of `peer`, recording it at the first free opportunity on first
    /// interaction.
    pub fn index_of(&mut self, peer: ActorName) -> usize {
        if let Some(index) = self.names.iter().position(|name| *name == peer) {
            return index;
        }
        if let Some(free) = self.names.iter().position(|name| name.is_none()) {
            self.names[free] = peer;
            return free;
        }
        self.names.push(peer);
        self.names.len() - 1
    }

    /// Number of slots in the table (bound or empty).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
