//! Reflection-driven messages.

use crate::config::ParseOptions;
use crate::descriptor::{FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::field_set::decode::{self, DecodeContext};
use crate::field_set::{encode, init, merge, Entry, FieldSet, Slot};
use crate::registry::ExtensionRegistry;
use crate::unknown::UnknownFieldSet;
use crate::value::{EnumValue, Value};
use crate::wire::{varint_len, WireWriter, MAX_VARINT_LEN};
use bytes::{BufMut, Bytes};
use std::borrow::Cow;
use std::io::{Read, Write};

/// A message of any type, accessed through its descriptor.
///
/// Fields are read and written with [`FieldDescriptor`]s of the message's
/// type (or extensions of it). Setters validate the value against the
/// declared type and fail with [`Error::InvalidArgument`] on a mismatch.
///
/// Presence follows the schema: proto2 fields, message fields, oneof
/// members and proto3 `optional` fields remember being set even to their
/// default; other proto3 scalars are present only while non-zero.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    desc: MessageDescriptor,
    fields: FieldSet,
}

impl DynamicMessage {
    /// Creates an empty message
    pub fn new(desc: MessageDescriptor) -> Self {
        Self {
            desc,
            fields: FieldSet::default(),
        }
    }

    /// The message type
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.desc
    }

    pub(crate) fn field_set(&self) -> &FieldSet {
        &self.fields
    }

    pub(crate) fn field_set_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    /// Parses a complete message and checks its required fields
    pub fn parse(desc: MessageDescriptor, data: impl Into<Bytes>) -> Result<Self> {
        Self::parse_with(
            desc,
            data,
            &ExtensionRegistry::empty(),
            &ParseOptions::default(),
        )
    }

    /// Parses a message without checking required fields
    pub fn parse_partial(desc: MessageDescriptor, data: impl Into<Bytes>) -> Result<Self> {
        Self::parse_partial_with(
            desc,
            data,
            &ExtensionRegistry::empty(),
            &ParseOptions::default(),
        )
    }

    /// Parses a complete message, decoding the extensions `registry` knows
    pub fn parse_with(
        desc: MessageDescriptor,
        data: impl Into<Bytes>,
        registry: &ExtensionRegistry,
        options: &ParseOptions,
    ) -> Result<Self> {
        let msg = Self::parse_partial_with(desc, data, registry, options)?;
        msg.check_initialized()?;
        Ok(msg)
    }

    /// Parses a message with `registry` without checking required fields
    pub fn parse_partial_with(
        desc: MessageDescriptor,
        data: impl Into<Bytes>,
        registry: &ExtensionRegistry,
        options: &ParseOptions,
    ) -> Result<Self> {
        let mut msg = Self::new(desc);
        msg.merge_from_bytes(data, registry, options)?;
        Ok(msg)
    }

    /// Parses `data` and merges the result into this message.
    ///
    /// Required fields are not checked.
    pub fn merge_from_bytes(
        &mut self,
        data: impl Into<Bytes>,
        registry: &ExtensionRegistry,
        options: &ParseOptions,
    ) -> Result<()> {
        let ctx = DecodeContext { registry, options };
        decode::merge_from_buf(self, data.into(), 0, ctx)
    }

    /// Reads `reader` to its end and parses the bytes as one message.
    ///
    /// Failures of the reader are returned as [`Error::Io`] unchanged;
    /// interrupted reads are not retried.
    pub fn parse_from_reader<R: Read>(
        desc: MessageDescriptor,
        mut reader: R,
        registry: &ExtensionRegistry,
        options: &ParseOptions,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        read_to_end(&mut reader, &mut buf)?;
        Self::parse_with(desc, buf, registry, options)
    }

    /// Reads one varint-length-prefixed message from `reader`.
    ///
    /// Returns `None` if the reader is already at its end.
    pub fn parse_delimited_from<R: Read>(
        desc: MessageDescriptor,
        reader: &mut R,
        registry: &ExtensionRegistry,
        options: &ParseOptions,
    ) -> Result<Option<Self>> {
        let Some(len) = read_length_prefix(reader)? else {
            return Ok(None);
        };
        let mut buf = Vec::with_capacity(len.min(64 * 1024));
        read_to_end(&mut reader.by_ref().take(len as u64), &mut buf)?;
        if buf.len() < len {
            return Err(Error::decode(DecodeErrorKind::TruncatedMessage, buf.len()));
        }
        Self::parse_with(desc, buf, registry, options).map(Some)
    }

    /// Size of the encoded message in bytes
    pub fn encoded_len(&self) -> usize {
        encode::encoded_len(self)
    }

    /// Encodes the message into `buf`
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<()> {
        let len = self.encoded_len();
        if buf.remaining_mut() < len {
            return Err(Error::invalid_argument(format!(
                "buffer has room for {} bytes, message needs {len}",
                buf.remaining_mut()
            )));
        }
        encode::encode(self, &mut WireWriter::new(buf));
        Ok(())
    }

    /// Encodes the message into a new vector
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        encode::encode(self, &mut WireWriter::new(&mut buf));
        buf
    }

    /// Encodes the message into a new [`Bytes`]
    pub fn encode_to_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    /// Writes the encoded message to `writer`
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.encode_to_vec())?;
        Ok(())
    }

    /// Writes the message with a varint length prefix
    pub fn write_delimited_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let body = self.encode_to_vec();
        let mut buf = Vec::with_capacity(varint_len(body.len() as u64) + body.len());
        let mut w = WireWriter::new(&mut buf);
        w.write_varint(body.len() as u64);
        w.write_raw(&body);
        writer.write_all(&buf)?;
        Ok(())
    }

    /// The stored entry for `field`, if it is present
    fn entry(&self, field: &FieldDescriptor) -> Option<&Entry> {
        self.fields
            .get(field.number())
            .filter(|e| e.field.full_name() == field.full_name())
    }

    fn check_field(&self, field: &FieldDescriptor) -> Result<()> {
        let belongs = if field.is_extension() {
            field.containing_message().full_name() == self.desc.full_name()
        } else {
            field.containing_message() == self.desc
        };
        if belongs {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "'{}' is not a field of '{}'",
                field.full_name(),
                self.desc.full_name()
            )))
        }
    }

    /// True if the field is set.
    ///
    /// Repeated fields count as set while they hold at least one element.
    pub fn has_field(&self, field: &FieldDescriptor) -> bool {
        self.entry(field).is_some()
    }

    /// The field's value, or its default if it is not set.
    ///
    /// Lazy message fields are parsed on first access; their value is
    /// returned as a copy.
    pub fn get_field(&self, field: &FieldDescriptor) -> Cow<'_, Value> {
        match self.entry(field).map(|e| &e.slot) {
            Some(Slot::Value(value)) => Cow::Borrowed(value),
            Some(Slot::Lazy(lazy)) => Cow::Owned(Value::Message(lazy.get().clone())),
            None => Cow::Owned(field.default_value()),
        }
    }

    /// Looks up a field by name and returns its value
    pub fn get_field_by_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        let field = self.desc.get_field_by_name(name)?;
        Some(self.get_field(&field))
    }

    /// Borrows a set singular message field, parsing it first if lazy
    pub fn get_message(&self, field: &FieldDescriptor) -> Option<&DynamicMessage> {
        match self.entry(field).map(|e| &e.slot) {
            Some(Slot::Value(Value::Message(message))) => Some(message),
            Some(Slot::Lazy(lazy)) => Some(lazy.get()),
            _ => None,
        }
    }

    /// Mutable access to a singular message field, setting it to an empty
    /// message first if it is absent
    pub fn get_message_mut(&mut self, field: &FieldDescriptor) -> Result<&mut DynamicMessage> {
        self.check_field(field)?;
        if field.is_repeated() || !field.kind().is_message() {
            return Err(Error::invalid_argument(format!(
                "'{}' is not a singular message field",
                field.full_name()
            )));
        }
        Ok(self.fields.message_mut(field))
    }

    /// Sets a field.
    ///
    /// Repeated fields take a [`Value::List`]. Setting a oneof member
    /// clears the other members; setting an implicit-presence field to its
    /// zero value clears it.
    pub fn set_field(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_field(field)?;
        let kind = field.kind();
        if field.is_repeated() {
            let Value::List(list) = &value else {
                return Err(Error::invalid_argument(format!(
                    "repeated field '{}' takes a list",
                    field.full_name()
                )));
            };
            for element in list {
                check_element(field, &kind, element)?;
            }
            if list.is_empty() {
                self.fields.remove(field.number());
                return Ok(());
            }
        } else {
            check_element(field, &kind, &value)?;
            if !field.supports_presence() && value.is_zero() {
                self.fields.remove(field.number());
                return Ok(());
            }
        }
        self.fields.insert(field, Slot::Value(value));
        Ok(())
    }

    /// Looks up a field by name and sets it
    pub fn set_field_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.desc.get_field_by_name(name).ok_or_else(|| {
            Error::invalid_argument(format!(
                "'{}' has no field named '{name}'",
                self.desc.full_name()
            ))
        })?;
        self.set_field(&field, value)
    }

    /// Clears a field
    pub fn clear_field(&mut self, field: &FieldDescriptor) {
        if self.check_field(field).is_ok() {
            self.fields.remove(field.number());
        }
    }

    /// Number of elements in a repeated field
    pub fn repeated_len(&self, field: &FieldDescriptor) -> usize {
        match self.entry(field).map(|e| &e.slot) {
            Some(Slot::Value(Value::List(list))) => list.len(),
            _ => 0,
        }
    }

    /// One element of a repeated field
    pub fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Option<&Value> {
        match self.entry(field).map(|e| &e.slot) {
            Some(Slot::Value(Value::List(list))) => list.get(index),
            _ => None,
        }
    }

    /// Replaces one element of a repeated field
    pub fn set_repeated(
        &mut self,
        field: &FieldDescriptor,
        index: usize,
        value: Value,
    ) -> Result<()> {
        self.check_repeated(field, &value)?;
        let len = self.repeated_len(field);
        if index >= len {
            return Err(Error::invalid_argument(format!(
                "index {index} out of range for '{}' with {len} elements",
                field.full_name()
            )));
        }
        self.fields.list_mut(field)[index] = value;
        Ok(())
    }

    /// Appends an element to a repeated field
    pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_repeated(field, &value)?;
        self.fields.list_mut(field).push(value);
        Ok(())
    }

    fn check_repeated(&self, field: &FieldDescriptor, value: &Value) -> Result<()> {
        self.check_field(field)?;
        if !field.is_repeated() {
            return Err(Error::invalid_argument(format!(
                "'{}' is not repeated",
                field.full_name()
            )));
        }
        check_element(field, &field.kind(), value)
    }

    /// True if any member of the oneof is set
    pub fn has_oneof(&self, oneof: &OneofDescriptor) -> bool {
        self.which_oneof(oneof).is_some()
    }

    /// The member of the oneof that is set
    pub fn which_oneof(&self, oneof: &OneofDescriptor) -> Option<FieldDescriptor> {
        oneof.fields().find(|field| self.has_field(field))
    }

    /// Clears whichever member of the oneof is set
    pub fn clear_oneof(&mut self, oneof: &OneofDescriptor) {
        if oneof.containing_message() != &self.desc {
            return;
        }
        for field in oneof.fields() {
            self.fields.remove(field.number());
        }
    }

    /// Reads a singular enum field.
    ///
    /// Numbers the enum does not declare, which open enums keep, come back
    /// as [`EnumValue::Unrecognized`].
    pub fn get_enum(&self, field: &FieldDescriptor) -> Result<EnumValue> {
        let Kind::Enum(enum_type) = field.kind() else {
            return Err(Error::invalid_argument(format!(
                "'{}' is not an enum field",
                field.full_name()
            )));
        };
        if field.is_repeated() {
            return Err(Error::invalid_argument(format!(
                "'{}' is repeated",
                field.full_name()
            )));
        }
        let number = self
            .get_field(field)
            .as_enum_number()
            .unwrap_or_else(|| enum_type.default_number());
        if enum_type.contains(number) {
            Ok(EnumValue::Known(number))
        } else {
            Ok(EnumValue::Unrecognized(number))
        }
    }

    /// Sets a singular enum field.
    ///
    /// [`EnumValue::Unrecognized`] has no number that could be written and
    /// is rejected, as is a `Known` number the enum does not declare.
    pub fn set_enum(&mut self, field: &FieldDescriptor, value: EnumValue) -> Result<()> {
        let Kind::Enum(enum_type) = field.kind() else {
            return Err(Error::invalid_argument(format!(
                "'{}' is not an enum field",
                field.full_name()
            )));
        };
        match value {
            EnumValue::Unrecognized(_) => Err(Error::invalid_argument(format!(
                "cannot set '{}' to an unrecognized enum value",
                field.full_name()
            ))),
            EnumValue::Known(number) if !enum_type.contains(number) => {
                Err(Error::invalid_argument(format!(
                    "enum '{}' has no value {number}",
                    enum_type.full_name()
                )))
            }
            EnumValue::Known(number) => self.set_field(field, Value::EnumNumber(number)),
        }
    }

    /// Looks up `key` in a map field.
    ///
    /// When several entries share the key the last one wins.
    pub fn map_get(&self, field: &FieldDescriptor, key: &Value) -> Option<Cow<'_, Value>> {
        if !field.is_map() {
            return None;
        }
        let entry_type = field.kind().as_message()?.clone();
        let key_field = entry_type.map_entry_key_field()?;
        let value_field = entry_type.map_entry_value_field()?;
        let list = match self.entry(field).map(|e| &e.slot) {
            Some(Slot::Value(Value::List(list))) => list,
            _ => return None,
        };
        list.iter().rev().find_map(|element| {
            let entry = element.as_message()?;
            (entry.get_field(&key_field).as_ref() == key).then(|| entry.get_field(&value_field))
        })
    }

    /// Present fields and extensions in field number order
    pub fn fields(&self) -> impl Iterator<Item = (FieldDescriptor, Cow<'_, Value>)> + '_ {
        self.fields.iter().map(|entry| {
            let value = match &entry.slot {
                Slot::Value(value) => Cow::Borrowed(value),
                Slot::Lazy(lazy) => Cow::Owned(Value::Message(lazy.get().clone())),
            };
            (entry.field.clone(), value)
        })
    }

    /// Clears every field, extension and unknown field
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Fields read from the wire that the schema and registry did not know
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        self.fields.unknown()
    }

    /// Mutable access to the unknown fields
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        self.fields.unknown_mut()
    }

    /// Merges `other` into this message; both must have the same type
    pub fn merge(&mut self, other: &DynamicMessage) -> Result<()> {
        if self.desc.full_name() != other.desc.full_name() {
            return Err(Error::invalid_argument(format!(
                "cannot merge '{}' into '{}'",
                other.desc.full_name(),
                self.desc.full_name()
            )));
        }
        self.merge_unchecked(other);
        Ok(())
    }

    pub(crate) fn merge_unchecked(&mut self, other: &DynamicMessage) {
        merge::merge(self, other);
    }

    /// Paths of all missing required fields, empty if initialized
    pub fn initialization_errors(&self) -> Vec<String> {
        let mut missing = Vec::new();
        init::find_missing(self, "", &mut missing);
        missing
    }

    /// True if every required field, recursively, is set
    pub fn is_initialized(&self) -> bool {
        self.initialization_errors().is_empty()
    }

    /// Comma-separated paths of all missing required fields
    pub fn initialization_error_string(&self) -> String {
        self.initialization_errors().join(", ")
    }

    /// Fails with [`Error::Uninitialized`] listing every missing required
    /// field
    pub fn check_initialized(&self) -> Result<()> {
        let missing = self.initialization_errors();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Uninitialized { missing })
        }
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.desc.full_name() == other.desc.full_name() && self.fields == other.fields
    }
}

fn check_element(field: &FieldDescriptor, kind: &Kind, value: &Value) -> Result<()> {
    if value.is_valid_for(kind) {
        return Ok(());
    }
    match (kind, value) {
        (Kind::Enum(enum_type), Value::EnumNumber(number)) => Err(Error::invalid_argument(
            format!("enum '{}' has no value {number}", enum_type.full_name()),
        )),
        _ => Err(Error::invalid_argument(format!(
            "value {value:?} does not match the type of '{}' ({kind:?})",
            field.full_name()
        ))),
    }
}

/// Reads until end of input without retrying interrupted reads
fn read_to_end(reader: &mut impl Read, buf: &mut Vec<u8>) -> Result<()> {
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Reads a varint length prefix; `None` at a clean end of input
fn read_length_prefix(reader: &mut impl Read) -> Result<Option<usize>> {
    let mut value: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte)? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(Error::decode(DecodeErrorKind::TruncatedMessage, i));
        }
        value |= u64::from(byte[0] & 0x7F) << (7 * i);
        if byte[0] & 0x80 == 0 {
            if value > i32::MAX as u64 {
                return Err(Error::decode(DecodeErrorKind::NegativeSize, i));
            }
            return Ok(Some(value as usize));
        }
    }
    Err(Error::decode(DecodeErrorKind::MalformedVarint, MAX_VARINT_LEN))
}
