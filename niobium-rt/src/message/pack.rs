//! Payload packing helpers.
//!
//! Payloads are opaque to the engine, but both the engine's own system
//! messages (spawn requests, capability replies) and applications need to
//! put integers and byte runs into them. Everything is native-endian, like
//! the wire codec.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use super::wire::WireError;
use crate::util::{ActorName, ScriptId};

/// Accumulates fields into a payload buffer.
///
/// # Example
/// ```rust
/// use niobium_rt::message::{Packer, Unpacker};
///
/// let payload = Packer::new().u32(7).u64(9).finish();
/// let mut fields = Unpacker::new(payload);
/// assert_eq!(fields.u32().unwrap(), 7);
/// assert_eq!(fields.u64().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct Packer {
    buf: BytesMut,
}

impl Packer {
    /// Start an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a payload with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a `u32`.
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32_ne(value);
        self
    }

    /// Append a `u64`.
    pub fn u64(mut self, value: u64) -> Self {
        self.buf.put_u64_ne(value);
        self
    }

    /// Append an actor name.
    pub fn actor(self, name: ActorName) -> Self {
        self.u32(name.raw())
    }

    /// Append a script id.
    pub fn script(self, id: ScriptId) -> Self {
        self.u32(id.raw())
    }

    /// Append a length-prefixed byte run.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.put_u32_ne(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a length-prefixed vector of `u32`.
    pub fn u32_slice(mut self, values: &[u32]) -> Self {
        self.buf.put_u32_ne(values.len() as u32);
        for value in values {
            self.buf.put_u32_ne(*value);
        }
        self
    }

    /// Finish and take the payload.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads fields back out of a payload, in packing order.
#[derive(Debug)]
pub struct Unpacker {
    buf: Bytes,
}

impl Unpacker {
    /// Wrap a payload for reading.
    pub fn new(payload: Bytes) -> Self {
        Self { buf: payload }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, bytes: usize) -> Result<(), WireError> {
        if self.buf.len() < bytes {
            return Err(WireError::Truncated {
                needed: bytes,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Read a `u32`.
    pub fn u32(&mut self) -> Result<u32, WireError> {
        self.need(4)?;
        Ok(self.buf.get_u32_ne())
    }

    /// Read a `u64`.
    pub fn u64(&mut self) -> Result<u64, WireError> {
        self.need(8)?;
        Ok(self.buf.get_u64_ne())
    }

    /// Read an actor name.
    pub fn actor(&mut self) -> Result<ActorName, WireError> {
        Ok(ActorName::from_raw(self.u32()?))
    }

    /// Read a script id.
    pub fn script(&mut self) -> Result<ScriptId, WireError> {
        Ok(ScriptId::from_raw(self.u32()?))
    }

    /// Read a length-prefixed byte run, zero-copy.
    pub fn bytes(&mut self) -> Result<Bytes, WireError> {
        let length = self.u32()? as usize;
        self.need(length)?;
        Ok(self.buf.split_to(length))
    }

    /// Read a length-prefixed vector of `u32`.
    pub fn u32_vec(&mut self) -> Result<Vec<u32>, WireError> {
        let length = self.u32()? as usize;
        self.need(length.saturating_mul(4))?;
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(self.buf.get_u32_ne());
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_vector_roundtrip() {
        let values: Vec<u32> = (0..1000).map(|i| i * 3).collect();
        let payload = Packer::new().u32_slice(&values).finish();

        let mut fields = Unpacker::new(payload);
        let back = fields.u32_vec().unwrap();
        assert_eq!(back.len(), values.len());
        assert_eq!(back, values);
        assert_eq!(fields.remaining(), 0);
    }

    #[test]
    fn test_mixed_fields_roundtrip() {
        let payload = Packer::new()
            .u32(4096)
            .actor(ActorName::from_raw(17))
            .script(ScriptId::from_raw(3))
            .u64(1 << 40)
            .bytes(b"genome")
            .finish();

        let mut fields = Unpacker::new(payload);
        assert_eq!(fields.u32().unwrap(), 4096);
        assert_eq!(fields.actor().unwrap().raw(), 17);
        assert_eq!(fields.script().unwrap().raw(), 3);
        assert_eq!(fields.u64().unwrap(), 1 << 40);
        assert_eq!(fields.bytes().unwrap().as_ref(), b"genome");
        assert_eq!(fields.remaining(), 0);
    }

    #[test]
    fn test_underflow_is_an_error() {
        let payload = Packer::new().u32(1).finish();
        let mut fields = Unpacker::new(payload);
        fields.u32().unwrap();
        assert!(fields.u32().is_err());
    }

    #[test]
    fn test_byte_run_truncation_detected() {
        // Length prefix promises more than the payload holds.
        let payload = Packer::new().u32(100).finish();
        let mut fields = Unpacker::new(payload);
        assert!(fields.bytes().is_err());
    }
}
