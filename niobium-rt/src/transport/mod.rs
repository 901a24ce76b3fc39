//! The network seam: an abstract non-blocking send/probe interface plus the
//! two concrete meshes (in-process loopback, TCP).

pub mod loopback;
pub mod tcp;
pub mod traits;

pub use loopback::{LoopbackMesh, LoopbackTransport};
pub use tcp::TcpTransport;
pub use traits::{InboundFrame, Transport, TransportError};
