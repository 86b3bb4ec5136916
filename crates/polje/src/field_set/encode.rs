//! Serialization of a field set.
//!
//! Known fields and extensions are written in ascending field number,
//! followed by the unknown fields in the order they were first seen.
//! Sizes are always computed before writing so every length prefix is
//! known up front.

use super::{message_set, Entry, Slot};
use crate::descriptor::Kind;
use crate::message::DynamicMessage;
use crate::value::Value;
use crate::wire::{encode_zigzag32, encode_zigzag64, tag_len, varint_len, WireType, WireWriter};
use bytes::BufMut;

/// Encoded size of a whole message
pub(crate) fn encoded_len(msg: &DynamicMessage) -> usize {
    if msg.descriptor().is_message_set() {
        return message_set::encoded_len(msg);
    }
    let fields = msg.field_set();
    fields.iter().map(entry_len).sum::<usize>() + fields.unknown().encoded_len()
}

/// Writes a whole message
pub(crate) fn encode<B: BufMut>(msg: &DynamicMessage, w: &mut WireWriter<'_, B>) {
    if msg.descriptor().is_message_set() {
        message_set::encode(msg, w);
        return;
    }
    let fields = msg.field_set();
    for entry in fields.iter() {
        encode_entry(entry, w);
    }
    fields.unknown().encode_to(w);
}

/// Encoded size of one stored field, tags included
pub(crate) fn entry_len(entry: &Entry) -> usize {
    let number = entry.field.number();
    let kind = entry.field.kind();
    match &entry.slot {
        Slot::Lazy(lazy) => len_delimited(number, lazy.encoded_len()),
        Slot::Value(Value::List(list)) if entry.field.is_packed() => {
            let data: usize = list.iter().map(|v| scalar_len(&kind, v)).sum();
            len_delimited(number, data)
        }
        Slot::Value(Value::List(list)) => list.iter().map(|v| value_len(number, &kind, v)).sum(),
        Slot::Value(value) => value_len(number, &kind, value),
    }
}

/// Writes one stored field
pub(crate) fn encode_entry<B: BufMut>(entry: &Entry, w: &mut WireWriter<'_, B>) {
    let number = entry.field.number();
    let kind = entry.field.kind();
    match &entry.slot {
        Slot::Lazy(lazy) => {
            w.write_tag(number, WireType::Len);
            w.write_bytes(lazy.bytes());
        }
        Slot::Value(Value::List(list)) if entry.field.is_packed() => {
            let data: usize = list.iter().map(|v| scalar_len(&kind, v)).sum();
            w.write_tag(number, WireType::Len);
            w.write_varint(data as u64);
            for v in list {
                write_scalar(&kind, v, w);
            }
        }
        Slot::Value(Value::List(list)) => {
            for v in list {
                encode_value(number, &kind, v, w);
            }
        }
        Slot::Value(value) => encode_value(number, &kind, value, w),
    }
}

fn len_delimited(number: u32, len: usize) -> usize {
    tag_len(number) + varint_len(len as u64) + len
}

fn value_len(number: u32, kind: &Kind, value: &Value) -> usize {
    match (kind, value) {
        (Kind::Group(_), Value::Message(m)) => 2 * tag_len(number) + m.encoded_len(),
        (Kind::Message(_), Value::Message(m)) => len_delimited(number, m.encoded_len()),
        (_, Value::String(s)) => len_delimited(number, s.len()),
        (_, Value::Bytes(b)) => len_delimited(number, b.len()),
        _ => tag_len(number) + scalar_len(kind, value),
    }
}

fn encode_value<B: BufMut>(number: u32, kind: &Kind, value: &Value, w: &mut WireWriter<'_, B>) {
    match (kind, value) {
        (Kind::Group(_), Value::Message(m)) => {
            w.write_tag(number, WireType::StartGroup);
            encode(m, w);
            w.write_tag(number, WireType::EndGroup);
        }
        (_, Value::Message(m)) => {
            w.write_tag(number, WireType::Len);
            w.write_varint(m.encoded_len() as u64);
            encode(m, w);
        }
        (_, Value::String(s)) => {
            w.write_tag(number, WireType::Len);
            w.write_bytes(s.as_bytes());
        }
        (_, Value::Bytes(b)) => {
            w.write_tag(number, WireType::Len);
            w.write_bytes(b);
        }
        _ => {
            w.write_tag(number, kind.wire_type());
            write_scalar(kind, value, w);
        }
    }
}

/// Size of a numeric value without its tag
fn scalar_len(kind: &Kind, value: &Value) -> usize {
    match (kind, value) {
        (Kind::Sint32, Value::I32(n)) => varint_len(u64::from(encode_zigzag32(*n))),
        (Kind::Sfixed32, _) | (Kind::Fixed32, _) | (Kind::Float, _) => 4,
        (Kind::Sfixed64, _) | (Kind::Fixed64, _) | (Kind::Double, _) => 8,
        (_, Value::I32(n)) | (_, Value::EnumNumber(n)) => varint_len(*n as i64 as u64),
        (Kind::Sint64, Value::I64(n)) => varint_len(encode_zigzag64(*n)),
        (_, Value::I64(n)) => varint_len(*n as u64),
        (_, Value::U32(n)) => varint_len(u64::from(*n)),
        (_, Value::U64(n)) => varint_len(*n),
        (_, Value::Bool(_)) => 1,
        _ => 0,
    }
}

fn write_scalar<B: BufMut>(kind: &Kind, value: &Value, w: &mut WireWriter<'_, B>) {
    match (kind, value) {
        (Kind::Sint32, Value::I32(n)) => w.write_sint32(*n),
        (Kind::Sfixed32, Value::I32(n)) => w.write_fixed32(*n as u32),
        (Kind::Fixed32, Value::U32(n)) => w.write_fixed32(*n),
        (Kind::Float, Value::F32(f)) => w.write_fixed32(f.to_bits()),
        (Kind::Sfixed64, Value::I64(n)) => w.write_fixed64(*n as u64),
        (Kind::Fixed64, Value::U64(n)) => w.write_fixed64(*n),
        (Kind::Double, Value::F64(f)) => w.write_fixed64(f.to_bits()),
        (_, Value::I32(n)) | (_, Value::EnumNumber(n)) => w.write_int32(*n),
        (Kind::Sint64, Value::I64(n)) => w.write_sint64(*n),
        (_, Value::I64(n)) => w.write_varint(*n as u64),
        (_, Value::U32(n)) => w.write_varint(u64::from(*n)),
        (_, Value::U64(n)) => w.write_varint(*n),
        (_, Value::Bool(b)) => w.write_varint(u64::from(*b)),
        _ => {}
    }
}
