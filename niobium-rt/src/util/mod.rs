//! Shared utilities: integer identifier newtypes.

pub mod ids;

pub use ids::{ActorName, NodeId, ScriptId};
