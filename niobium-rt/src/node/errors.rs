//! Node-level error taxonomy.
//!
//! Every public engine entry point either succeeds or returns one of these;
//! the only soft failures in the engine are drop-and-count on the routing
//! path, which never surface as errors.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::WireError;
use crate::script::ScriptError;
use crate::transport::TransportError;
use crate::util::ScriptId;

/// Engine failures.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Spawn referenced a script nobody registered. No side effects.
    #[error("unknown script: {0}")]
    UnknownScript(ScriptId),

    /// Script registration collided on an id.
    #[error("script {0} is already registered")]
    ScriptAlreadyRegistered(ScriptId),

    /// The actor slot table is full.
    #[error("actor slot table exhausted ({capacity} slots)")]
    SlotsExhausted { capacity: usize },

    /// The name allocator ran out of the 31-bit space.
    #[error("actor name space exhausted")]
    NamesExhausted,

    /// Bad cluster sizing or flags; reported and aborts initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// The cluster fabric failed. Fatal, no in-engine recovery.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A peer sent bytes that do not decode. Fatal.
    #[error("wire protocol violation: {0}")]
    Wire(#[from] WireError),
}

impl NodeError {
    /// Whether the engine must terminate on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Transport(_) | NodeError::Wire(_))
    }
}

impl From<ScriptError> for NodeError {
    fn from(error: ScriptError) -> Self {
        match error {
            ScriptError::Unknown(id) => NodeError::UnknownScript(id),
            ScriptError::AlreadyRegistered(id) => NodeError::ScriptAlreadyRegistered(id),
        }
    }
}
