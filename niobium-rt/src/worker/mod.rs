//! Workers: the threads that run actor handlers.

pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
