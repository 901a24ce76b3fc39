//! Native-endian wire codec.
//!
//! The cluster is homogeneous, so fields travel in the sender's native byte
//! order. A single message is a 16-byte header followed by the payload; a
//! batched payload is an 8-byte batch envelope followed by whole message
//! frames back to back.
//!
//! ```text
//! offset  size  field
//! 0       4     tag
//! 4       4     source_actor_name
//! 8       4     destination_actor_name
//! 12      4     payload_length
//! 16      N     payload (opaque)
//! ```

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

// Layer 3: Internal module imports
use super::envelope::Envelope;
use super::tags;
use crate::util::ActorName;

/// Size of the per-message header.
pub const HEADER_LEN: usize = 16;

/// Size of the batch envelope preceding the frames of a batched payload.
pub const BATCH_HEADER_LEN: usize = 8;

/// Decoding failures. Always a protocol violation, never recoverable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than a header requires.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Header declares more payload than the buffer carries.
    #[error("payload of {declared} bytes exceeds the {available} available")]
    BadLength { declared: usize, available: usize },

    /// Batch decode on a payload that is not a batch.
    #[error("expected a batch envelope, found tag {tag:#x}")]
    NotABatch { tag: u32 },

    /// Batch frame count disagrees with the frames present.
    #[error("batch declared {declared} frames but carried {carried}")]
    FrameCountMismatch { declared: u32, carried: u32 },
}

/// Bytes `envelope` occupies on the wire.
pub fn encoded_len(envelope: &Envelope) -> usize {
    HEADER_LEN + envelope.payload_len()
}

/// Append `envelope` to `buf` as one wire frame.
pub fn encode(envelope: &Envelope, buf: &mut BytesMut) {
    buf.reserve(encoded_len(envelope));
    buf.put_u32_ne(envelope.tag());
    buf.put_u32_ne(envelope.source().raw());
    buf.put_u32_ne(envelope.destination().raw());
    buf.put_u32_ne(envelope.payload_len() as u32);
    buf.extend_from_slice(envelope.payload());
}

/// Consume one wire frame from the front of `buf`.
///
/// The payload is a zero-copy slice of `buf`.
pub fn decode(buf: &mut Bytes) -> Result<Envelope, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }
    let tag = buf.get_u32_ne();
    let source = ActorName::from_raw(buf.get_u32_ne());
    let destination = ActorName::from_raw(buf.get_u32_ne());
    let length = buf.get_u32_ne() as usize;
    if buf.len() < length {
        return Err(WireError::BadLength {
            declared: length,
            available: buf.len(),
        });
    }
    let payload = buf.split_to(length);
    Ok(Envelope::new(tag, source, destination, payload))
}

/// Tag of the first frame in `payload`, if a header fits.
pub fn peek_tag(payload: &[u8]) -> Option<u32> {
    payload
        .get(..4)
        .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
}

/// Whether `payload` is a batched transport payload.
pub fn is_batch(payload: &[u8]) -> bool {
    peek_tag(payload) == Some(tags::ACTION_MULTIPLEX)
}

/// Split a batched payload into its message frames.
///
/// Frame payloads are zero-copy slices of the batch buffer.
pub fn decode_batch(mut payload: Bytes) -> Result<Vec<Envelope>, WireError> {
    if payload.len() < BATCH_HEADER_LEN {
        return Err(WireError::Truncated {
            needed: BATCH_HEADER_LEN,
            available: payload.len(),
        });
    }
    let tag = payload.get_u32_ne();
    if tag != tags::ACTION_MULTIPLEX {
        return Err(WireError::NotABatch { tag });
    }
    let declared = payload.get_u32_ne();
    let mut frames = Vec::with_capacity(declared as usize);
    while !payload.is_empty() {
        frames.push(decode(&mut payload)?);
    }
    if frames.len() != declared as usize {
        return Err(WireError::FrameCountMismatch {
            declared,
            carried: frames.len() as u32,
        });
    }
    Ok(frames)
}
