//! Reserved message tags.
//!
//! System tags occupy a dedicated high-bit range; everything below belongs
//! to applications and passes through the engine opaquely.

/// Base of the reserved system range.
pub const SYSTEM_TAG_BASE: u32 = 1 << 30;

/// Spawn an actor on the destination's node. Payload: packed script id.
pub const ACTION_SPAWN: u32 = SYSTEM_TAG_BASE;

/// Reply to [`ACTION_SPAWN`]. Payload: packed name of the new actor, or the
/// none sentinel if the spawn failed.
pub const ACTION_SPAWN_REPLY: u32 = SYSTEM_TAG_BASE + 1;

/// First message every actor receives; drives the start hook.
pub const ACTION_START: u32 = SYSTEM_TAG_BASE + 2;

/// Conventional acknowledgement of [`ACTION_START`], sent by behaviors.
pub const ACTION_START_REPLY: u32 = SYSTEM_TAG_BASE + 3;

/// Sent by an actor to itself to stop; drives the stop hook and death.
pub const ACTION_STOP: u32 = SYSTEM_TAG_BASE + 4;

/// Polite stop request; delivered to the behavior, which complies by
/// stopping itself (or not).
pub const ACTION_ASK_TO_STOP: u32 = SYSTEM_TAG_BASE + 5;

/// Query the worker count of the destination's node.
pub const ACTION_GET_NODE_WORKER_COUNT: u32 = SYSTEM_TAG_BASE + 6;

/// Reply to [`ACTION_GET_NODE_WORKER_COUNT`]. Payload: packed count.
pub const ACTION_GET_NODE_WORKER_COUNT_REPLY: u32 = SYSTEM_TAG_BASE + 7;

/// Reserved for tree-structured broadcast. Not served by the engine.
pub const ACTION_BINOMIAL_TREE_SEND: u32 = SYSTEM_TAG_BASE + 8;

/// Envelope tag of a batched transport payload.
pub const ACTION_MULTIPLEX: u32 = SYSTEM_TAG_BASE + 9;

/// Whether a tag lies in the reserved system range.
pub const fn is_system(tag: u32) -> bool {
    tag & SYSTEM_TAG_BASE != 0
}
