// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Globally unique integer name of an actor.
///
/// The name is the address: in deterministic naming mode the hosting node is
/// `name mod node_count`, so location lookup is O(1) arithmetic with no
/// directory. Names are never reused during a run, even after the actor dies.
///
/// # Example
/// ```rust
/// use niobium_rt::util::ActorName;
///
/// let name = ActorName::from_raw(5);
/// assert_eq!(name.node(2).raw(), 1); // odd names live on node 1 of 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorName(u32);

impl ActorName {
    /// Sentinel for "no actor": spawn replies carry it on failure and
    /// externally injected messages use it as their source.
    pub const NONE: ActorName = ActorName(u32::MAX);

    /// Wrap a raw integer name.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the [`ActorName::NONE`] sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// The node hosting this actor under deterministic naming.
    pub const fn node(self, node_count: u32) -> NodeId {
        NodeId(self.0 % node_count)
    }
}

impl Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "actor/none")
        } else {
            write!(f, "actor/{}", self.0)
        }
    }
}

/// Identifier of a node (one engine process) in the cluster.
///
/// Assigned by the cluster launcher through the environment; dense in
/// `0..node_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw node index.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw node index.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into per-node tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node/{}", self.0)
    }
}

/// Identifier of a registered script (actor class descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptId(u32);

impl ScriptId {
    /// Wrap a raw script id.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw script id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script/{}", self.0)
    }
}
