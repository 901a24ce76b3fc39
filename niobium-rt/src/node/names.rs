//! Actor name assignment.
//!
//! Deterministic mode draws from a per-node counter encoded so that
//! `name mod node_count = node_id`: any node locates any actor with one
//! modulo, no directory. Random mode draws 31-bit names; those carry no
//! location, so it is only honored on single-node runs.

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// Layer 3: Internal module imports
use super::errors::NodeError;
use crate::util::{ActorName, NodeId};

/// How a node assigns names to the actors it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// Counter-derived names with the node id encoded in the residue.
    Deterministic,
    /// Random 31-bit names (single-node only).
    Random,
}

/// Allocates names that never collide cluster-wide and are never reused
/// within a run.
pub struct NameAllocator {
    policy: NamePolicy,
    node_id: NodeId,
    node_count: u32,
    sequence: AtomicU32,
    random: Mutex<RandomState>,
}

struct RandomState {
    rng: SmallRng,
    issued: HashSet<u32>,
}

impl NameAllocator {
    /// An allocator for this node.
    pub fn new(policy: NamePolicy, node_id: NodeId, node_count: u32) -> Self {
        Self {
            policy,
            node_id,
            node_count,
            sequence: AtomicU32::new(0),
            random: Mutex::new(RandomState {
                rng: SmallRng::from_entropy(),
                issued: HashSet::new(),
            }),
        }
    }

    /// The active policy.
    pub fn policy(&self) -> NamePolicy {
        self.policy
    }

    /// Assign the next name.
    pub fn next(&self) -> Result<ActorName, NodeError> {
        match self.policy {
            NamePolicy::Deterministic => self.next_deterministic(),
            NamePolicy::Random => self.next_random(),
        }
    }

    /// The node hosting `name`, under deterministic naming.
    pub fn location(&self, name: ActorName) -> NodeId {
        name.node(self.node_count)
    }

    fn next_deterministic(&self) -> Result<ActorName, NodeError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let raw = sequence
            .checked_mul(self.node_count)
            .and_then(|base| base.checked_add(self.node_id.raw()))
            .ok_or(NodeError::NamesExhausted)?;
        if raw == u32::MAX {
            // The sentinel is not a valid name.
            return Err(NodeError::NamesExhausted);
        }
        Ok(ActorName::from_raw(raw))
    }

    fn next_random(&self) -> Result<ActorName, NodeError> {
        let mut state = self.random.lock();
        // The 31-bit space is far larger than any plausible actor count;
        // bail out rather than spin when it is effectively full.
        for _ in 0..1024 {
            let raw = state.rng.gen_range(0..(1u32 << 31));
            if state.issued.insert(raw) {
                return Ok(ActorName::from_raw(raw));
            }
        }
        Err(NodeError::NamesExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_names_encode_node() {
        let allocator = NameAllocator::new(NamePolicy::Deterministic, NodeId::from_raw(1), 3);
        for expected in [1u32, 4, 7, 10] {
            let name = allocator.next().unwrap();
            assert_eq!(name.raw(), expected);
            assert_eq!(name.node(3), NodeId::from_raw(1));
            assert_eq!(allocator.location(name), NodeId::from_raw(1));
        }
    }

    #[test]
    fn test_deterministic_single_node_is_dense() {
        let allocator = NameAllocator::new(NamePolicy::Deterministic, NodeId::from_raw(0), 1);
        let names: Vec<u32> = (0..5).map(|_| allocator.next().unwrap().raw()).collect();
        assert_eq!(names, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_random_names_are_31_bit_and_unique() {
        let allocator = NameAllocator::new(NamePolicy::Random, NodeId::from_raw(0), 1);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let name = allocator.next().unwrap();
            assert!(name.raw() < (1 << 31));
            assert!(seen.insert(name.raw()), "name reused");
        }
    }

    #[test]
    fn test_names_never_repeat_across_policy() {
        let allocator = NameAllocator::new(NamePolicy::Deterministic, NodeId::from_raw(0), 2);
        let a = allocator.next().unwrap();
        let b = allocator.next().unwrap();
        assert_ne!(a, b);
    }
}
