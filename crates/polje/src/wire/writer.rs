//! Wire-format encoder over any [`BufMut`].

use super::{encode_zigzag32, encode_zigzag64, Tag, WireType};
use bytes::BufMut;

/// Writes wire-format primitives into a [`BufMut`].
///
/// Every method mirrors a [`WireReader`](super::WireReader) method.
/// Writing is infallible: sizes are computed up front by the callers so
/// that length prefixes are always known before the payload.
#[derive(Debug)]
pub struct WireWriter<'a, B: BufMut> {
    buf: &'a mut B,
}

impl<'a, B: BufMut> WireWriter<'a, B> {
    /// Wraps an output buffer
    pub fn new(buf: &'a mut B) -> Self {
        Self { buf }
    }

    /// Writes a field key
    pub fn write_tag(&mut self, number: u32, wire_type: WireType) {
        self.write_varint(u64::from(Tag::new(number, wire_type).to_raw()));
    }

    /// Writes a base-128 varint
    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Writes an int32; negative values are sign-extended to 10 bytes
    pub fn write_int32(&mut self, value: i32) {
        self.write_varint(value as i64 as u64);
    }

    /// Writes a zigzag-encoded sint32
    pub fn write_sint32(&mut self, value: i32) {
        self.write_varint(u64::from(encode_zigzag32(value)));
    }

    /// Writes a zigzag-encoded sint64
    pub fn write_sint64(&mut self, value: i64) {
        self.write_varint(encode_zigzag64(value));
    }

    /// Writes a little-endian 32-bit value
    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Writes a little-endian 64-bit value
    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Writes a length prefix followed by `data`
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.buf.put_slice(data);
    }

    /// Writes bytes with no prefix
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Access to the underlying buffer, for nested writers
    pub fn buf_mut(&mut self) -> &mut B {
        &mut *self.buf
    }
}
