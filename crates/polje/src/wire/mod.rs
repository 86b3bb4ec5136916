//! Low-level protobuf wire format encoding and decoding.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: START_GROUP / END_GROUP (deprecated groups)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! [`WireReader`] and [`WireWriter`] are the primitives every other module
//! goes through; nothing else touches raw bytes.

mod reader;
mod writer;

use crate::error::{DecodeErrorKind, Error, Result};

pub use reader::WireReader;
pub use writer::WireWriter;

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Maximum encoded length of a varint
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::decode(DecodeErrorKind::InvalidWireType(value), 0)),
        }
    }
}

/// A decoded field key: field number plus wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Field number, always in `1..=MAX_FIELD_NUMBER`
    pub number: u32,
    /// Encoding of the value that follows
    pub wire_type: WireType,
}

impl Tag {
    /// Creates a new tag
    pub fn new(number: u32, wire_type: WireType) -> Self {
        Self { number, wire_type }
    }

    /// The packed `(number << 3) | wire_type` key
    pub fn to_raw(self) -> u32 {
        (self.number << 3) | self.wire_type as u32
    }

    /// Splits a raw key into number and wire type.
    pub fn from_raw(raw: u64) -> Result<Self> {
        let wire_type = WireType::try_from((raw & 0x07) as u8)?;
        let number = raw >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(Error::decode(DecodeErrorKind::InvalidTag(number), 0));
        }
        Ok(Self {
            number: number as u32,
            wire_type,
        })
    }
}

/// Zigzag-encode a 32-bit signed integer
#[inline]
pub fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Zigzag-encode a 64-bit signed integer
#[inline]
pub fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Zigzag-decode into a 32-bit signed integer: `(n >>> 1) ^ -(n & 1)`
#[inline]
pub fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Zigzag-decode into a 64-bit signed integer: `(n >>> 1) ^ -(n & 1)`
#[inline]
pub fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Number of bytes `value` occupies as a varint
#[inline]
pub fn varint_len(value: u64) -> usize {
    // Every 7 significant bits take one byte; zero still takes one.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Number of bytes a tag for `number` occupies
#[inline]
pub fn tag_len(number: u32) -> usize {
    varint_len(u64::from(number) << 3)
}
