//! The behavior contract every actor class implements.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::context::ActorContext;
use crate::message::Envelope;

/// Message-handling logic shared by all actors of one script.
///
/// Handlers are run-to-completion on a worker thread: the engine guarantees
/// that at most one worker is ever inside a given actor's handler, so the
/// behavior owns its state with no synchronization. Handlers must return
/// promptly; messages are the sole IPC, and blocking inside a handler
/// stalls every actor scheduled on the same worker.
///
/// A behavior may, through the [`ActorContext`]: send messages (to itself,
/// to any name, or back to the current sender), spawn children, record
/// acquaintances, ask another actor to stop, and stop itself.
///
/// # Example
///
/// ```rust
/// use niobium_rt::actor::{ActorContext, Behavior};
/// use niobium_rt::message::Envelope;
///
/// struct Counter {
///     seen: u64,
/// }
///
/// impl Behavior for Counter {
///     fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
///         self.seen += 1;
///         if message.tag() == 42 {
///             ctx.reply(43, &[]);
///             ctx.stop();
///         }
///     }
/// }
/// ```
pub trait Behavior: Send + 'static {
    /// Called once, when the engine delivers the start message. The default
    /// does nothing.
    fn on_start(&mut self, _ctx: &mut ActorContext<'_>) {}

    /// Handle one message. The envelope is borrowed; it must not be kept
    /// past return.
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>);

    /// Called once, when the actor stops. The default does nothing.
    fn on_stop(&mut self, _ctx: &mut ActorContext<'_>) {}
}
