//! One-stop imports for building on the runtime.

pub use crate::actor::{ActorContext, Behavior};
pub use crate::message::{tags, Envelope, Packer, Unpacker};
pub use crate::multiplex::MultiplexPolicy;
pub use crate::node::{Node, NodeConfig, NodeError};
pub use crate::script::Script;
pub use crate::transport::{LoopbackMesh, Transport};
pub use crate::util::{ActorName, NodeId, ScriptId};
