//! Per-owner memory pools for message buffers.
//!
//! Every pool belongs to exactly one owner (the transport for inbound
//! buffers, each worker for outbound and scratch buffers, the multiplexer
//! for batch buffers) and is only touched by that owner's thread. Buffers
//! freed on another thread travel back to the owning worker through its
//! triage queue and re-enter the pool there.

pub mod pool;

pub use pool::{MemoryPool, PoolConfig, PoolStats};
