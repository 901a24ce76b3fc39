//! Messages: opaque routed buffers, system tags, wire codec, payload packing.

pub mod envelope;
pub mod pack;
pub mod tags;
pub mod wire;

pub use envelope::Envelope;
pub use pack::{Packer, Unpacker};
pub use wire::WireError;
