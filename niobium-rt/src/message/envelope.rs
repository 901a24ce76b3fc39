//! The routed message unit.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::Bytes;

// Layer 3: Internal module imports
use super::tags;
use crate::util::ActorName;

/// A message in flight: routing header plus an opaque payload.
///
/// An envelope is owned by exactly one place at a time: the sender's stack,
/// a mailbox, a multiplexer batch, the transport, or the receiving handler.
/// Sending consumes it; the receive handler borrows it and must not keep it
/// past return. The payload is opaque to the engine: only the tag is
/// interpreted, and only when it lies in the reserved system range.
#[derive(Clone, PartialEq)]
pub struct Envelope {
    tag: u32,
    source: ActorName,
    destination: ActorName,
    payload: Bytes,
    /// Worker whose pool the payload buffer was carved from, for recycling
    /// after the receiver is done. `None` for inbound and external messages.
    origin_worker: Option<usize>,
}

impl Envelope {
    /// Build an envelope with no buffer origin.
    pub fn new(tag: u32, source: ActorName, destination: ActorName, payload: Bytes) -> Self {
        Self {
            tag,
            source,
            destination,
            payload,
            origin_worker: None,
        }
    }

    /// Record the worker whose pool owns the payload buffer.
    pub(crate) fn with_origin(mut self, worker: usize) -> Self {
        self.origin_worker = Some(worker);
        self
    }

    /// The receiver-interpreted discriminator.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Name of the sending actor ([`ActorName::NONE`] for external sends).
    pub fn source(&self) -> ActorName {
        self.source
    }

    /// Name of the destination actor.
    pub fn destination(&self) -> ActorName {
        self.destination
    }

    /// The opaque payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the tag lies in the reserved system range.
    pub fn is_system(&self) -> bool {
        tags::is_system(self.tag)
    }

    pub(crate) fn origin_worker(&self) -> Option<usize> {
        self.origin_worker
    }

    /// Consume the envelope, keeping only the payload buffer.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("tag", &self.tag)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("payload_len", &self.payload.len())
            .field("origin_worker", &self.origin_worker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let env = Envelope::new(
            42,
            ActorName::from_raw(1),
            ActorName::from_raw(2),
            Bytes::from_static(b"hi"),
        );
        assert_eq!(env.tag(), 42);
        assert_eq!(env.source().raw(), 1);
        assert_eq!(env.destination().raw(), 2);
        assert_eq!(env.payload_len(), 2);
        assert!(!env.is_system());
        assert_eq!(env.origin_worker(), None);
    }

    #[test]
    fn test_origin_tracking() {
        let env = Envelope::new(
            1,
            ActorName::NONE,
            ActorName::from_raw(0),
            Bytes::new(),
        )
        .with_origin(3);
        assert_eq!(env.origin_worker(), Some(3));
    }

    #[test]
    fn test_system_detection() {
        let env = Envelope::new(
            tags::ACTION_STOP,
            ActorName::from_raw(1),
            ActorName::from_raw(1),
            Bytes::new(),
        );
        assert!(env.is_system());
    }

    #[test]
    fn test_into_payload() {
        let env = Envelope::new(
            7,
            ActorName::from_raw(1),
            ActorName::from_raw(2),
            Bytes::from_static(b"abc"),
        );
        assert_eq!(env.into_payload().as_ref(), b"abc");
    }
}
