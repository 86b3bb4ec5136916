//! MessageSet wire format.
//!
//! A MessageSet carries its extensions as repeated group 1 items instead
//! of ordinary fields:
//!
//! ```text
//! repeated group Item = 1 {
//!   required uint32 type_id = 2;
//!   required bytes message = 3;
//! }
//! ```
//!
//! `type_id` is the extension's field number and `message` its encoded
//! value.

use super::decode::{self, DecodeContext};
use super::Slot;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::lazy::LazyField;
use crate::message::DynamicMessage;
use crate::value::Value;
use crate::wire::{tag_len, varint_len, WireReader, WireType, WireWriter};
use bytes::{BufMut, Bytes};
use tracing::trace;

pub(crate) const ITEM: u32 = 1;
const TYPE_ID: u32 = 2;
const MESSAGE: u32 = 3;

/// Encoded size of one item carrying `payload_len` message bytes
pub(crate) fn item_len(type_id: u32, payload_len: usize) -> usize {
    2 * tag_len(ITEM)
        + tag_len(TYPE_ID)
        + varint_len(u64::from(type_id))
        + tag_len(MESSAGE)
        + varint_len(payload_len as u64)
        + payload_len
}

/// Writes one item
pub(crate) fn write_item<B: BufMut>(w: &mut WireWriter<'_, B>, type_id: u32, payload: &[u8]) {
    w.write_tag(ITEM, WireType::StartGroup);
    w.write_tag(TYPE_ID, WireType::Varint);
    w.write_varint(u64::from(type_id));
    w.write_tag(MESSAGE, WireType::Len);
    w.write_bytes(payload);
    w.write_tag(ITEM, WireType::EndGroup);
}

/// Reads the body of an item whose start tag was just consumed, storing it
/// as an extension if the registry knows `type_id` and as an unknown
/// length-delimited field otherwise.
///
/// The type id and the payload may arrive in either order. Items without a
/// payload carry nothing and are dropped.
pub(crate) fn merge_item(
    msg: &mut DynamicMessage,
    r: &mut WireReader,
    ctx: DecodeContext<'_>,
) -> Result<()> {
    r.enter_nested()?;
    let mut type_id = 0u32;
    let mut payload: Option<Bytes> = None;
    loop {
        if r.is_at_end() {
            return Err(Error::decode(
                DecodeErrorKind::TruncatedMessage,
                r.position(),
            ));
        }
        let tag = r.read_tag()?;
        match (tag.number, tag.wire_type) {
            (_, WireType::EndGroup) => {
                r.check_end_group(ITEM, tag)?;
                break;
            }
            (TYPE_ID, WireType::Varint) => type_id = r.read_varint32()?,
            (MESSAGE, WireType::Len) => payload = Some(r.read_bytes()?),
            _ => r.skip_field(tag)?,
        }
    }
    let depth = r.depth();
    r.exit_nested();

    let Some(payload) = payload else {
        return Ok(());
    };
    if type_id == 0 {
        return Ok(());
    }

    let desc = msg.descriptor().clone();
    let ext = ctx
        .registry
        .find_by_number(&desc, type_id)
        .map(|info| info.descriptor().clone())
        .filter(|ext| ext.kind().is_message());
    let Some(ext) = ext else {
        trace!(type_id, "unknown MessageSet item kept as unknown field");
        msg.field_set_mut().unknown_mut().add_length_delimited(type_id, payload);
        return Ok(());
    };

    if ctx.options.eager_message_sets {
        let target = msg.field_set_mut().message_mut(&ext);
        return decode::merge_from_buf(target, payload, depth, ctx);
    }

    let Some(message_type) = ext.kind().as_message().cloned() else {
        return Ok(());
    };
    let incoming = LazyField::captured(
        message_type,
        payload,
        ctx.registry.clone(),
        ctx.options.clone(),
        depth,
    );
    decode::merge_lazy(msg.field_set_mut(), &ext, incoming);
    Ok(())
}

/// Encoded size of a MessageSet's extensions and unknown items
pub(crate) fn encoded_len(msg: &DynamicMessage) -> usize {
    let fields = msg.field_set();
    let items: usize = fields
        .iter()
        .map(|entry| match &entry.slot {
            Slot::Lazy(lazy) if entry.field.is_extension() => {
                item_len(entry.field.number(), lazy.encoded_len())
            }
            Slot::Value(Value::Message(m)) if entry.field.is_extension() => {
                item_len(entry.field.number(), m.encoded_len())
            }
            _ => super::encode::entry_len(entry),
        })
        .sum();
    items + fields.unknown().message_set_len()
}

/// Writes a MessageSet's extensions and unknown items
pub(crate) fn encode<B: BufMut>(msg: &DynamicMessage, w: &mut WireWriter<'_, B>) {
    let fields = msg.field_set();
    for entry in fields.iter() {
        match &entry.slot {
            Slot::Lazy(lazy) if entry.field.is_extension() => {
                write_item(w, entry.field.number(), lazy.bytes());
            }
            Slot::Value(Value::Message(m)) if entry.field.is_extension() => {
                write_item(w, entry.field.number(), &m.encode_to_vec());
            }
            _ => super::encode::encode_entry(entry, w),
        }
    }
    fields.unknown().encode_message_set_to(w);
}
