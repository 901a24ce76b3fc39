//! One in-flight batch for one destination node.

// Layer 1: Standard library imports
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use crate::message::{tags, wire, Envelope};

/// Accumulates message frames behind a batch envelope until flushed.
///
/// The frame count in the envelope is patched in at seal time, so appends
/// are a single copy.
#[derive(Debug)]
pub(crate) struct Batch {
    buffer: BytesMut,
    frames: u32,
    opened_at: Instant,
}

impl Batch {
    /// Start an empty batch in `buffer`, stamping the open time.
    pub(crate) fn open(mut buffer: BytesMut) -> Self {
        buffer.clear();
        buffer.put_u32_ne(tags::ACTION_MULTIPLEX);
        buffer.put_u32_ne(0); // frame count, patched by seal
        Self {
            buffer,
            frames: 0,
            opened_at: Instant::now(),
        }
    }

    /// Append one message as a frame.
    pub(crate) fn append(&mut self, envelope: &Envelope) {
        wire::encode(envelope, &mut self.buffer);
        self.frames += 1;
    }

    /// Bytes accumulated so far, envelope included.
    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Frames accumulated so far.
    pub(crate) fn frame_count(&self) -> u32 {
        self.frames
    }

    /// Time since the first field was written.
    pub(crate) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.opened_at)
    }

    /// Patch the frame count and hand the payload to the transport.
    pub(crate) fn seal(mut self) -> Bytes {
        let count = self.frames.to_ne_bytes();
        self.buffer[4..8].copy_from_slice(&count);
        self.buffer.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ActorName;

    fn envelope(tag: u32) -> Envelope {
        Envelope::new(
            tag,
            ActorName::from_raw(1),
            ActorName::from_raw(2),
            Bytes::from_static(&[9; 8]),
        )
    }

    #[test]
    fn test_batch_accumulates_and_seals() {
        let mut batch = Batch::open(BytesMut::with_capacity(256));
        assert_eq!(batch.len(), wire::BATCH_HEADER_LEN);

        batch.append(&envelope(1));
        batch.append(&envelope(2));
        assert_eq!(batch.frame_count(), 2);
        assert_eq!(
            batch.len(),
            wire::BATCH_HEADER_LEN + 2 * (wire::HEADER_LEN + 8)
        );

        let payload = batch.seal();
        assert!(wire::is_batch(&payload));
        let frames = wire::decode_batch(payload).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].tag(), 1);
        assert_eq!(frames[1].tag(), 2);
    }

    #[test]
    fn test_age_grows() {
        let batch = Batch::open(BytesMut::new());
        let later = Instant::now() + Duration::from_millis(5);
        assert!(batch.age(later) >= Duration::from_millis(5));
    }
}
