//! Outbound batching: many small cross-node messages, few transport sends.

pub mod batch;
pub mod multiplexer;

pub use multiplexer::{MultiplexPolicy, MultiplexStats, Multiplexer};
