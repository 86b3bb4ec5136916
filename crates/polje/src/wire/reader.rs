//! Bounds-checked cursor over an in-memory protobuf buffer.

use super::{Tag, WireType, MAX_VARINT_LEN};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::DEFAULT_RECURSION_LIMIT;
use bytes::Bytes;

/// Reads wire-format primitives from a [`Bytes`] buffer.
///
/// Length-delimited values are returned as zero-copy slices of the input,
/// which is what lets lazy fields keep the exact bytes of a sub-message.
/// Nested messages are read by narrowing the readable window with
/// [`push_limit`](Self::push_limit) and restoring it afterwards; nesting
/// depth is tracked so adversarial input fails cleanly instead of
/// exhausting the stack.
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    pos: usize,
    limit: usize,
    depth: u32,
    recursion_limit: u32,
}

impl WireReader {
    /// Creates a reader over the whole buffer
    pub fn new(buf: impl Into<Bytes>) -> Self {
        let buf = buf.into();
        let limit = buf.len();
        Self {
            buf,
            pos: 0,
            limit,
            depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Sets the maximum nesting depth
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Sets the nesting depth this reader starts at
    pub(crate) fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current nesting depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Configured maximum nesting depth
    pub fn recursion_limit(&self) -> u32 {
        self.recursion_limit
    }

    /// True once the current window has been fully consumed
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.limit
    }

    /// Bytes left in the current window
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    fn error(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(kind, self.pos)
    }

    /// Reads a field key
    pub fn read_tag(&mut self) -> Result<Tag> {
        let start = self.pos;
        let raw = self.read_varint()?;
        Tag::from_raw(raw).map_err(|e| match e {
            Error::Decode(d) => Error::decode(d.kind().clone(), start),
            other => other,
        })
    }

    /// Reads a base-128 varint of up to 10 bytes
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            if self.pos >= self.limit {
                return Err(self.error(DecodeErrorKind::TruncatedMessage));
            }
            let byte = self.buf[self.pos];
            self.pos += 1;
            result |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(self.error(DecodeErrorKind::MalformedVarint))
    }

    /// Reads a varint and keeps its low 32 bits.
    ///
    /// Negative int32 values are written sign-extended to 10 bytes; the
    /// padding high bits are discarded here. Any value wider than 32 bits
    /// is truncated the same way rather than rejected, matching how every
    /// protobuf runtime reads int32, uint32 and enum fields.
    pub fn read_varint32(&mut self) -> Result<u32> {
        Ok(self.read_varint()? as u32)
    }

    /// Reads a zigzag-encoded sint32
    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(super::decode_zigzag32(self.read_varint32()?))
    }

    /// Reads a zigzag-encoded sint64
    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(super::decode_zigzag64(self.read_varint()?))
    }

    /// Reads a little-endian 32-bit value
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian 64-bit value
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a varint length prefix and checks it against the window
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        if len > i32::MAX as u64 {
            return Err(self.error(DecodeErrorKind::NegativeSize));
        }
        let len = len as usize;
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TruncatedMessage));
        }
        Ok(len)
    }

    /// Reads a length-delimited value as a slice of the input
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Takes the next `len` raw bytes
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TruncatedMessage));
        }
        let out = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    /// Restricts reading to the next `len` bytes.
    ///
    /// Returns the previous limit, to be handed back to
    /// [`pop_limit`](Self::pop_limit).
    pub fn push_limit(&mut self, len: usize) -> Result<usize> {
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TruncatedMessage));
        }
        let old = self.limit;
        self.limit = self.pos + len;
        Ok(old)
    }

    /// Restores a limit saved by [`push_limit`](Self::push_limit)
    pub fn pop_limit(&mut self, old: usize) {
        self.limit = old;
    }

    /// Enters one level of message or group nesting
    pub fn enter_nested(&mut self) -> Result<()> {
        if self.depth >= self.recursion_limit {
            tracing::debug!(
                depth = self.depth,
                offset = self.pos,
                "recursion limit reached while parsing"
            );
            return Err(self.error(DecodeErrorKind::TooManyNestedMessages {
                limit: self.recursion_limit,
            }));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leaves one level of nesting
    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Verifies an END_GROUP tag closes the group opened for `expected`
    pub fn check_end_group(&self, expected: u32, found: Tag) -> Result<()> {
        if found.wire_type != WireType::EndGroup || found.number != expected {
            return Err(self.error(DecodeErrorKind::InvalidEndGroupTag {
                expected,
                found: found.number,
            }));
        }
        Ok(())
    }

    /// Skips the value following `tag`, including whole groups
    pub fn skip_field(&mut self, tag: Tag) -> Result<()> {
        match tag.wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::I64 => {
                self.take(8)?;
            }
            WireType::Len => {
                let len = self.read_len()?;
                self.pos += len;
            }
            WireType::I32 => {
                self.take(4)?;
            }
            WireType::StartGroup => {
                self.enter_nested()?;
                loop {
                    if self.is_at_end() {
                        return Err(self.error(DecodeErrorKind::TruncatedMessage));
                    }
                    let inner = self.read_tag()?;
                    if inner.wire_type == WireType::EndGroup {
                        self.check_end_group(tag.number, inner)?;
                        break;
                    }
                    self.skip_field(inner)?;
                }
                self.exit_nested();
            }
            WireType::EndGroup => {
                return Err(self.error(DecodeErrorKind::UnexpectedEndGroup(tag.number)));
            }
        }
        Ok(())
    }

    /// Bytes from `start` up to the current position
    pub fn slice_from(&self, start: usize) -> Bytes {
        self.buf.slice(start..self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> WireReader {
        WireReader::new(Bytes::from_static(data))
    }

    #[test]
    fn test_read_varint_field() {
        // Field 1, wire type 0 (varint), value 150
        let mut r = reader(&[0x08, 0x96, 0x01]);
        let tag = r.read_tag().unwrap();
        assert_eq!(tag, Tag::new(1, WireType::Varint));
        assert_eq!(r.read_varint().unwrap(), 150);
        assert!(r.is_at_end());
    }

    #[test]
    fn test_read_len_field() {
        let mut r = reader(&[0x0A, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(r.read_tag().unwrap(), Tag::new(1, WireType::Len));
        assert_eq!(&r.read_bytes().unwrap()[..], b"hello");
    }

    #[test]
    fn test_read_fixed() {
        let mut r = reader(&[0x01, 0x02, 0x03, 0x04, 0x01, 0, 0, 0, 0, 0, 0, 0x80]);
        assert_eq!(r.read_fixed32().unwrap(), 0x0403_0201);
        assert_eq!(r.read_fixed64().unwrap(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_negative_int32_is_ten_bytes() {
        let mut r = reader(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert_eq!(r.read_varint32().unwrap() as i32, -1);
    }

    #[test]
    fn test_wide_varint32_keeps_low_bits() {
        // 2^32 + 5
        let mut r = reader(&[0x85, 0x80, 0x80, 0x80, 0x10]);
        assert_eq!(r.read_varint32().unwrap(), 5);
        assert!(r.is_at_end());
    }

    #[test]
    fn test_eleven_byte_varint_is_malformed() {
        let mut r = reader(&[0xFF; 11]);
        let err = r.read_varint().unwrap_err();
        assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::MalformedVarint));
    }

    #[test]
    fn test_length_past_end_is_truncated() {
        let mut r = reader(&[0x0A, 0x05, b'h', b'i']);
        r.read_tag().unwrap();
        let err = r.read_bytes().unwrap_err();
        assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::TruncatedMessage));
    }

    #[test]
    fn test_invalid_wire_type() {
        // Field 1, wire type 6
        let mut r = reader(&[0x0E]);
        let err = r.read_tag().unwrap_err();
        assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::InvalidWireType(6)));
    }

    #[test]
    fn test_invalid_field_number() {
        let mut r = reader(&[0x00, 0x01]);
        assert!(r.read_tag().is_err());
    }

    #[test]
    fn test_skip_group() {
        // Field 1 start group, inner field 2 varint, field 1 end group, field 3 varint
        let mut r = reader(&[0x0B, 0x10, 0x01, 0x0C, 0x18, 0x02]);
        let tag = r.read_tag().unwrap();
        r.skip_field(tag).unwrap();
        assert_eq!(r.read_tag().unwrap(), Tag::new(3, WireType::Varint));
        assert_eq!(r.read_varint().unwrap(), 2);
    }

    #[test]
    fn test_mismatched_end_group() {
        // Start group field 1, end group field 2
        let mut r = reader(&[0x0B, 0x14]);
        let tag = r.read_tag().unwrap();
        let err = r.skip_field(tag).unwrap_err();
        assert_eq!(
            err.decode_kind(),
            Some(&DecodeErrorKind::InvalidEndGroupTag {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_limits() {
        let mut r = reader(&[0x01, 0x02, 0x03]);
        let old = r.push_limit(2).unwrap();
        assert_eq!(r.remaining(), 2);
        r.read_raw(2).unwrap();
        assert!(r.is_at_end());
        r.pop_limit(old);
        assert_eq!(r.remaining(), 1);
        assert!(r.push_limit(5).is_err());
    }

    #[test]
    fn test_recursion_limit() {
        let mut r = reader(&[]).with_recursion_limit(2);
        r.enter_nested().unwrap();
        r.enter_nested().unwrap();
        let err = r.enter_nested().unwrap_err();
        assert_eq!(
            err.decode_kind(),
            Some(&DecodeErrorKind::TooManyNestedMessages { limit: 2 })
        );
    }
}
