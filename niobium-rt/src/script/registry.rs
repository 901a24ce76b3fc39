//! Script descriptors and the per-node registry.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::actor::Behavior;
use crate::util::ScriptId;

/// Script registration and lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// A script with this id is already registered.
    #[error("script {0} is already registered")]
    AlreadyRegistered(ScriptId),

    /// Spawn referenced an id nobody registered.
    #[error("unknown script: {0}")]
    Unknown(ScriptId),
}

/// Immutable descriptor of one actor class: an id, a human-readable name,
/// and a factory producing the behavior for each spawned instance.
///
/// # Example
/// ```rust
/// use niobium_rt::actor::{ActorContext, Behavior};
/// use niobium_rt::message::Envelope;
/// use niobium_rt::script::Script;
/// use niobium_rt::util::ScriptId;
///
/// struct Echo;
/// impl Behavior for Echo {
///     fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
///         ctx.reply(message.tag(), message.payload());
///     }
/// }
///
/// let script = Script::new(ScriptId::from_raw(1), "echo", || Box::new(Echo));
/// assert_eq!(script.name(), "echo");
/// ```
pub struct Script {
    id: ScriptId,
    name: &'static str,
    factory: Box<dyn Fn() -> Box<dyn Behavior> + Send + Sync>,
}

impl Script {
    /// Describe an actor class.
    pub fn new<F>(id: ScriptId, name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Behavior> + Send + Sync + 'static,
    {
        Self {
            id,
            name,
            factory: Box::new(factory),
        }
    }

    /// The script's id.
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// The script's human-readable name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build the behavior for one new actor.
    pub(crate) fn instantiate(&self) -> Box<dyn Behavior> {
        (self.factory)()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Per-node script table. Registration happens during startup; lookups on
/// the spawn path are lock-free afterwards.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: DashMap<ScriptId, Arc<Script>>,
}

impl ScriptRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script. Ids are claimed first-come, immutably.
    pub fn register(&self, script: Script) -> Result<(), ScriptError> {
        match self.scripts.entry(script.id()) {
            Entry::Occupied(_) => Err(ScriptError::AlreadyRegistered(script.id())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(script));
                Ok(())
            }
        }
    }

    /// Look up a script by id.
    pub fn lookup(&self, id: ScriptId) -> Result<Arc<Script>, ScriptError> {
        self.scripts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ScriptError::Unknown(id))
    }

    /// Number of registered scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether no scripts are registered.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
