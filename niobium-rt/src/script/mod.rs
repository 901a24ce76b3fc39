//! Scripts: static descriptors of actor classes.

pub mod registry;

pub use registry::{Script, ScriptError, ScriptRegistry};
