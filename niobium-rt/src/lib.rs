//! # niobium-rt - Distributed Actor Runtime
//!
//! A per-node engine for spawning lightweight actors across a cluster,
//! dispatching opaque tagged messages between them with location
//! transparency, and scheduling their handlers across a fixed pool of worker
//! threads.
//!
//! # Quick Start
//!
//! ```rust
//! use niobium_rt::prelude::*;
//!
//! struct Greeter;
//!
//! impl Behavior for Greeter {
//!     fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
//!         if message.tag() == 1 {
//!             ctx.reply(2, b"hello");
//!             ctx.stop();
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), NodeError> {
//!     let transport = LoopbackMesh::new(1).pop().unwrap();
//!     let mut node = Node::new(NodeConfig::single_node(2), Box::new(transport))?;
//!
//!     node.register_script(Script::new(ScriptId::from_raw(1), "greeter", || {
//!         Box::new(Greeter)
//!     }))?;
//!     let greeter = node.spawn(ScriptId::from_raw(1))?;
//!
//!     node.send(greeter, 1, b"");
//!     node.run()
//! }
//! ```
//!
//! # Model
//!
//! - Every actor has a globally unique integer **name**; the name is the
//!   address. Under deterministic naming, `name mod node_count` is the
//!   hosting node, so routing needs no directory.
//! - An actor is a single-threaded unit of state behind a FIFO **mailbox**.
//!   Handlers are run-to-completion: at most one worker is ever inside a
//!   given actor, and there are no suspension points. Messages are the
//!   sole IPC.
//! - A **script** describes an actor class (id plus behavior factory);
//!   spawning instantiates it and delivers a start message.
//! - Small cross-node messages coalesce in the **multiplexer** into few
//!   large transport sends, bounded in added latency; large or bypass-tagged
//!   messages go straight through.
//! - Message buffers come from per-worker **pools** and are recycled to the
//!   pool they were carved from after the receiver is done.
//!
//! # Module Organization
//!
//! - [`actor`] - Behavior trait, dispatch context, per-actor state
//! - [`script`] - Actor class descriptors and the per-node registry
//! - [`mailbox`] - Per-actor FIFO with a wait-free length probe
//! - [`message`] - Envelopes, system tags, wire codec, payload packing
//! - [`worker`] - Dispatch threads and the worker pool
//! - [`multiplex`] - Outbound batching per destination node
//! - [`transport`] - The network seam: loopback and TCP meshes
//! - [`memory`] - Per-owner slab pools with size-class recycling
//! - [`node`] - The engine: spawn/send/run, configuration, metrics
//! - [`util`] - Integer id newtypes
//!
//! # Guarantees
//!
//! - Per producer, mailbox delivery order is enqueue order.
//! - Per (source node, destination node) pair, transport delivery order is
//!   send order; the multiplexer preserves it through batching.
//! - A buffer carved from worker W's pool returns to worker W's pool.
//!
//! There are no delivery guarantees across node failure, no actor migration
//! between nodes, no request/response correlation, and no message schemas:
//! payloads are opaque bytes.

pub mod actor;
pub mod mailbox;
pub mod memory;
pub mod message;
pub mod multiplex;
pub mod node;
pub mod prelude;
pub mod script;
pub mod transport;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use actor::{ActorContext, Behavior};
pub use mailbox::Mailbox;
pub use memory::{MemoryPool, PoolConfig, PoolStats};
pub use message::{tags, Envelope, Packer, Unpacker, WireError};
pub use multiplex::{MultiplexPolicy, MultiplexStats, Multiplexer};
pub use node::{MetricsSnapshot, Node, NodeConfig, NodeError};
pub use script::{Script, ScriptError, ScriptRegistry};
pub use transport::{InboundFrame, LoopbackMesh, TcpTransport, Transport, TransportError};
pub use util::{ActorName, NodeId, ScriptId};
