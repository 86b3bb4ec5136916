//! Parsing wire data into a field set.
//!
//! Every tag is dispatched through the message descriptor, then through
//! the extension registry for numbers in an extension range. Anything
//! neither of them recognizes, or that arrives with a wire type the field
//! cannot accept, is kept in the unknown field set instead of failing.

use super::{message_set, Entry, FieldSet, Slot};
use crate::config::ParseOptions;
use crate::descriptor::{FieldDescriptor, Kind, MessageDescriptor};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::lazy::LazyField;
use crate::message::DynamicMessage;
use crate::registry::ExtensionRegistry;
use crate::value::Value;
use crate::wire::{Tag, WireReader, WireType};
use bytes::Bytes;
use tracing::{debug, trace};

/// Registry and options in effect for one parse
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodeContext<'a> {
    pub(crate) registry: &'a ExtensionRegistry,
    pub(crate) options: &'a ParseOptions,
}

/// Parses a whole buffer into `msg`, starting at nesting `depth`
pub(crate) fn merge_from_buf(
    msg: &mut DynamicMessage,
    bytes: Bytes,
    depth: u32,
    ctx: DecodeContext<'_>,
) -> Result<()> {
    let mut r = WireReader::new(bytes)
        .with_recursion_limit(ctx.options.recursion_limit)
        .with_depth(depth);
    merge_fields(msg, &mut r, ctx, None)
}

/// Reads fields into `msg` until the window ends or, inside a group, until
/// the group's END_GROUP tag
pub(crate) fn merge_fields(
    msg: &mut DynamicMessage,
    r: &mut WireReader,
    ctx: DecodeContext<'_>,
    group: Option<u32>,
) -> Result<()> {
    let desc = msg.descriptor().clone();
    loop {
        if r.is_at_end() {
            return match group {
                Some(_) => Err(Error::decode(
                    DecodeErrorKind::TruncatedMessage,
                    r.position(),
                )),
                None => Ok(()),
            };
        }
        let tag = r.read_tag()?;
        if tag.wire_type == WireType::EndGroup {
            return match group {
                Some(number) => r.check_end_group(number, tag),
                None => Err(Error::decode(
                    DecodeErrorKind::UnexpectedEndGroup(tag.number),
                    r.position(),
                )),
            };
        }
        if desc.is_message_set()
            && tag.number == message_set::ITEM
            && tag.wire_type == WireType::StartGroup
        {
            message_set::merge_item(msg, r, ctx)?;
            continue;
        }
        match lookup(&desc, tag.number, ctx.registry) {
            Some(field) => merge_field(msg, &field, tag, r, ctx)?,
            None => {
                trace!(
                    message = desc.full_name(),
                    number = tag.number,
                    "unknown field"
                );
                msg.field_set_mut()
                    .unknown_mut()
                    .merge_field_from(tag, r)?;
            }
        }
    }
}

fn lookup(
    desc: &MessageDescriptor,
    number: u32,
    registry: &ExtensionRegistry,
) -> Option<FieldDescriptor> {
    if let Some(field) = desc.get_field(number) {
        return Some(field);
    }
    if !desc.is_extension_number(number) {
        return None;
    }
    let info = registry.find_by_number(desc, number)?;
    trace!(
        extension = info.descriptor().full_name(),
        "resolved extension through registry"
    );
    Some(info.descriptor().clone())
}

fn merge_field(
    msg: &mut DynamicMessage,
    field: &FieldDescriptor,
    tag: Tag,
    r: &mut WireReader,
    ctx: DecodeContext<'_>,
) -> Result<()> {
    let kind = field.kind();

    // Either encoding is accepted for packable fields
    if field.is_packable() && tag.wire_type == WireType::Len {
        return merge_packed(msg, field, &kind, r);
    }
    if tag.wire_type != kind.wire_type() {
        trace!(
            field = field.full_name(),
            wire_type = ?tag.wire_type,
            "wire type mismatch, keeping value as unknown"
        );
        return msg.field_set_mut().unknown_mut().merge_field_from(tag, r);
    }

    match &kind {
        Kind::Message(message_type) => merge_message(msg, field, message_type, r, ctx),
        Kind::Group(message_type) => merge_group(msg, field, message_type, r, ctx),
        Kind::String => {
            let start = r.position();
            let bytes = r.read_bytes()?;
            match std::str::from_utf8(&bytes) {
                Ok(s) => {
                    store(msg.field_set_mut(), field, Value::String(s.to_owned()));
                    Ok(())
                }
                Err(_) if field.enforces_utf8() && ctx.options.check_utf8 => Err(Error::decode(
                    DecodeErrorKind::InvalidUtf8 {
                        field: field.full_name().to_string(),
                    },
                    start,
                )),
                Err(_) => {
                    debug!(
                        field = field.full_name(),
                        "string is not valid UTF-8, keeping value as unknown"
                    );
                    msg.field_set_mut()
                        .unknown_mut()
                        .add_length_delimited(field.number(), bytes);
                    Ok(())
                }
            }
        }
        Kind::Bytes => {
            let bytes = r.read_bytes()?;
            store(msg.field_set_mut(), field, Value::Bytes(bytes));
            Ok(())
        }
        _ => {
            let value = read_scalar(&kind, r)?;
            store_scalar(msg.field_set_mut(), field, &kind, value);
            Ok(())
        }
    }
}

fn merge_packed(
    msg: &mut DynamicMessage,
    field: &FieldDescriptor,
    kind: &Kind,
    r: &mut WireReader,
) -> Result<()> {
    let len = r.read_len()?;
    let old = r.push_limit(len)?;
    while !r.is_at_end() {
        let value = read_scalar(kind, r)?;
        store_scalar(msg.field_set_mut(), field, kind, value);
    }
    r.pop_limit(old);
    Ok(())
}

fn merge_message(
    msg: &mut DynamicMessage,
    field: &FieldDescriptor,
    message_type: &MessageDescriptor,
    r: &mut WireReader,
    ctx: DecodeContext<'_>,
) -> Result<()> {
    if field.is_lazy() && ctx.options.lazy_fields {
        r.enter_nested()?;
        let bytes = r.read_bytes()?;
        let depth = r.depth();
        r.exit_nested();
        let incoming = LazyField::captured(
            message_type.clone(),
            bytes,
            ctx.registry.clone(),
            ctx.options.clone(),
            depth,
        );
        merge_lazy(msg.field_set_mut(), field, incoming);
        return Ok(());
    }

    let len = r.read_len()?;
    let old = r.push_limit(len)?;
    r.enter_nested()?;
    if field.is_repeated() {
        let mut child = DynamicMessage::new(message_type.clone());
        merge_fields(&mut child, r, ctx, None)?;
        msg.field_set_mut()
            .list_mut(field)
            .push(Value::Message(child));
    } else {
        let child = msg.field_set_mut().message_mut(field);
        merge_fields(child, r, ctx, None)?;
    }
    r.exit_nested();
    r.pop_limit(old);
    Ok(())
}

fn merge_group(
    msg: &mut DynamicMessage,
    field: &FieldDescriptor,
    message_type: &MessageDescriptor,
    r: &mut WireReader,
    ctx: DecodeContext<'_>,
) -> Result<()> {
    let number = field.number();
    r.enter_nested()?;
    if field.is_repeated() {
        let mut child = DynamicMessage::new(message_type.clone());
        merge_fields(&mut child, r, ctx, Some(number))?;
        msg.field_set_mut()
            .list_mut(field)
            .push(Value::Message(child));
    } else {
        let child = msg.field_set_mut().message_mut(field);
        merge_fields(child, r, ctx, Some(number))?;
    }
    r.exit_nested();
    Ok(())
}

/// Folds a freshly captured lazy value into whatever the field holds
pub(crate) fn merge_lazy(fields: &mut FieldSet, field: &FieldDescriptor, incoming: LazyField) {
    match fields.get_mut(field.number()) {
        Some(Entry {
            slot: Slot::Lazy(existing),
            ..
        }) => existing.merge(&incoming),
        Some(Entry {
            slot: Slot::Value(Value::Message(existing)),
            ..
        }) => existing.merge_unchecked(incoming.get()),
        _ => fields.insert(field, Slot::Lazy(incoming)),
    }
}

fn store(fields: &mut FieldSet, field: &FieldDescriptor, value: Value) {
    if field.is_repeated() {
        fields.list_mut(field).push(value);
    } else {
        fields.insert(field, Slot::Value(value));
    }
}

/// Stores a numeric value, diverting numbers a closed enum does not declare
/// into the unknown fields
fn store_scalar(fields: &mut FieldSet, field: &FieldDescriptor, kind: &Kind, value: Value) {
    if let (Kind::Enum(enum_type), Value::EnumNumber(number)) = (kind, &value) {
        if enum_type.is_closed() && !enum_type.contains(*number) {
            trace!(
                field = field.full_name(),
                value = *number,
                "closed enum value out of range, keeping as unknown"
            );
            fields
                .unknown_mut()
                .add_varint(field.number(), *number as i64 as u64);
            return;
        }
    }
    store(fields, field, value);
}

fn read_scalar(kind: &Kind, r: &mut WireReader) -> Result<Value> {
    Ok(match kind {
        Kind::Double => Value::F64(f64::from_bits(r.read_fixed64()?)),
        Kind::Float => Value::F32(f32::from_bits(r.read_fixed32()?)),
        Kind::Int32 => Value::I32(r.read_varint32()? as i32),
        Kind::Int64 => Value::I64(r.read_varint()? as i64),
        Kind::Uint32 => Value::U32(r.read_varint32()?),
        Kind::Uint64 => Value::U64(r.read_varint()?),
        Kind::Sint32 => Value::I32(r.read_sint32()?),
        Kind::Sint64 => Value::I64(r.read_sint64()?),
        Kind::Fixed32 => Value::U32(r.read_fixed32()?),
        Kind::Fixed64 => Value::U64(r.read_fixed64()?),
        Kind::Sfixed32 => Value::I32(r.read_fixed32()? as i32),
        Kind::Sfixed64 => Value::I64(r.read_fixed64()? as i64),
        Kind::Bool => Value::Bool(r.read_varint()? != 0),
        Kind::Enum(_) => Value::EnumNumber(r.read_varint32()? as i32),
        Kind::String | Kind::Bytes | Kind::Message(_) | Kind::Group(_) => {
            return Err(Error::invalid_argument(format!(
                "{kind:?} is not a numeric type"
            )))
        }
    })
}
