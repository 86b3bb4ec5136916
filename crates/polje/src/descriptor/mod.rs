//! Read-only schema metadata.
//!
//! The engine never generates code: it is driven entirely by the
//! descriptors in a [`DescriptorPool`]. All definitions live in one
//! arena behind an `Arc`, and [`MessageDescriptor`], [`FieldDescriptor`],
//! [`EnumDescriptor`] and [`OneofDescriptor`] are cheap handles (pool plus
//! index). Self-referential and mutually recursive schemas therefore need
//! no reference cycles.
//!
//! Pools are filled either programmatically through [`PoolBuilder`] or
//! from compiled schema output (a serialized `FileDescriptorSet` or a
//! `prost_reflect::DescriptorPool`), see [`DescriptorPool::decode`] and
//! [`DescriptorPool::from_reflect`].

mod builder;
mod reflect;

use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::value::Value;
use crate::wire::WireType;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

pub use builder::{EnumDef, FieldDef, FieldType, MessageDef, PoolBuilder};

/// Proto syntax version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Syntax {
    /// Proto2 syntax
    #[default]
    Proto2,
    /// Proto3 syntax
    Proto3,
}

impl Syntax {
    /// Returns the syntax declaration string
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl TryFrom<&str> for Syntax {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "" | "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            _ => Err(Error::descriptor_build(format!(
                "unsupported proto syntax: '{value}'"
            ))),
        }
    }
}

/// Field label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Singular, may be absent
    Optional,
    /// Singular, must be present for the message to be initialized
    Required,
    /// Zero or more values (lists and maps)
    Repeated,
}

/// Declared type of a field.
///
/// Closed union of the eighteen protobuf field types; the composite ones
/// carry the descriptor of their nested type.
#[derive(Clone, PartialEq, Eq)]
pub enum Kind {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// An enum type
    Enum(EnumDescriptor),
    /// An embedded message, length-delimited on the wire
    Message(MessageDescriptor),
    /// A group: an embedded message delimited by START/END_GROUP tags
    Group(MessageDescriptor),
}

impl Kind {
    /// Wire type used for a single, unpacked value of this kind
    pub fn wire_type(&self) -> WireType {
        match self {
            Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Bool
            | Kind::Enum(_) => WireType::Varint,
            Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::I64,
            Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::I32,
            Kind::String | Kind::Bytes | Kind::Message(_) => WireType::Len,
            Kind::Group(_) => WireType::StartGroup,
        }
    }

    /// True for kinds that may use the packed repeated encoding
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            Kind::String | Kind::Bytes | Kind::Message(_) | Kind::Group(_)
        )
    }

    /// True for message and group kinds
    pub fn is_message(&self) -> bool {
        matches!(self, Kind::Message(_) | Kind::Group(_))
    }

    /// The nested message type, for message and group kinds
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Kind::Message(m) | Kind::Group(m) => Some(m),
            _ => None,
        }
    }

    /// The enum type, for enum kinds
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            Kind::Enum(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Double => write!(f, "double"),
            Kind::Float => write!(f, "float"),
            Kind::Int32 => write!(f, "int32"),
            Kind::Int64 => write!(f, "int64"),
            Kind::Uint32 => write!(f, "uint32"),
            Kind::Uint64 => write!(f, "uint64"),
            Kind::Sint32 => write!(f, "sint32"),
            Kind::Sint64 => write!(f, "sint64"),
            Kind::Fixed32 => write!(f, "fixed32"),
            Kind::Fixed64 => write!(f, "fixed64"),
            Kind::Sfixed32 => write!(f, "sfixed32"),
            Kind::Sfixed64 => write!(f, "sfixed64"),
            Kind::Bool => write!(f, "bool"),
            Kind::String => write!(f, "string"),
            Kind::Bytes => write!(f, "bytes"),
            Kind::Enum(e) => write!(f, "enum {}", e.full_name()),
            Kind::Message(m) => write!(f, "message {}", m.full_name()),
            Kind::Group(m) => write!(f, "group {}", m.full_name()),
        }
    }
}

/// Index-based form of [`Kind`] stored inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindIndex {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Enum(usize),
    Message(usize),
    Group(usize),
}

impl KindIndex {
    pub(crate) fn is_packable(self) -> bool {
        !matches!(
            self,
            KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) | KindIndex::Group(_)
        )
    }

    pub(crate) fn is_message(self) -> bool {
        matches!(self, KindIndex::Message(_) | KindIndex::Group(_))
    }
}

#[derive(Debug)]
pub(crate) struct PoolInner {
    pub(crate) messages: Vec<MessageInner>,
    pub(crate) enums: Vec<EnumInner>,
    pub(crate) extensions: Vec<FieldInner>,
    pub(crate) message_names: HashMap<String, usize>,
    pub(crate) enum_names: HashMap<String, usize>,
    pub(crate) extension_names: HashMap<String, usize>,
}

#[derive(Debug)]
pub(crate) struct MessageInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) syntax: Syntax,
    /// Declaration order
    pub(crate) fields: Vec<FieldInner>,
    pub(crate) by_number: HashMap<u32, usize>,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) oneofs: Vec<OneofInner>,
    pub(crate) extension_ranges: Vec<Range<u32>>,
    pub(crate) map_entry: bool,
    pub(crate) message_set: bool,
}

#[derive(Debug)]
pub(crate) struct OneofInner {
    pub(crate) name: String,
    pub(crate) fields: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct FieldInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: u32,
    pub(crate) kind: KindIndex,
    pub(crate) cardinality: Cardinality,
    pub(crate) packed: bool,
    pub(crate) lazy: bool,
    pub(crate) oneof: Option<usize>,
    pub(crate) presence: bool,
    pub(crate) utf8: bool,
    pub(crate) default: Option<Value>,
    /// Message index of the extended type, for extensions
    pub(crate) extendee: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct EnumInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) values: Vec<(String, i32)>,
    pub(crate) closed: bool,
}

/// A set of resolved message, enum and extension definitions
#[derive(Clone)]
pub struct DescriptorPool {
    pub(crate) inner: Arc<PoolInner>,
}

impl DescriptorPool {
    /// Starts building a pool programmatically
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Looks up a message type by fully-qualified name
    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.inner
            .message_names
            .get(name)
            .map(|&index| MessageDescriptor {
                pool: self.clone(),
                index,
            })
    }

    /// Looks up an enum type by fully-qualified name
    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.inner.enum_names.get(name).map(|&index| EnumDescriptor {
            pool: self.clone(),
            index,
        })
    }

    /// Looks up an extension by fully-qualified name
    pub fn get_extension_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.inner
            .extension_names
            .get(name)
            .map(|&index| FieldDescriptor {
                pool: self.clone(),
                loc: FieldLoc::Extension(index),
            })
    }

    /// Iterates all message types
    pub fn all_messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len()).map(|index| MessageDescriptor {
            pool: self.clone(),
            index,
        })
    }

    /// Iterates all extensions
    pub fn all_extensions(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.inner.extensions.len()).map(|index| FieldDescriptor {
            pool: self.clone(),
            loc: FieldLoc::Extension(index),
        })
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .field("extensions", &self.inner.extensions.len())
            .finish()
    }
}

/// Handle to a message type
#[derive(Clone)]
pub struct MessageDescriptor {
    pool: DescriptorPool,
    index: usize,
}

impl MessageDescriptor {
    fn inner(&self) -> &MessageInner {
        &self.pool.inner.messages[self.index]
    }

    /// The pool this type belongs to
    pub fn parent_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Syntax of the defining file
    pub fn syntax(&self) -> Syntax {
        self.inner().syntax
    }

    /// Fields in declaration order.
    ///
    /// This is the order required-field paths are reported in. Encoding
    /// does not follow it: messages are always written in ascending field
    /// number order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.inner().fields.len()).map(move |index| self.field_at(index))
    }

    fn field_at(&self, index: usize) -> FieldDescriptor {
        FieldDescriptor {
            pool: self.pool.clone(),
            loc: FieldLoc::Field {
                message: self.index,
                index,
            },
        }
    }

    /// Looks up a field by number
    pub fn get_field(&self, number: u32) -> Option<FieldDescriptor> {
        self.inner()
            .by_number
            .get(&number)
            .map(|&index| self.field_at(index))
    }

    /// Looks up a field by name
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.inner()
            .by_name
            .get(name)
            .map(|&index| self.field_at(index))
    }

    /// Oneofs in declaration order
    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        (0..self.inner().oneofs.len()).map(move |index| OneofDescriptor {
            message: self.clone(),
            index,
        })
    }

    /// Field number ranges reserved for extensions (end exclusive)
    pub fn extension_ranges(&self) -> &[Range<u32>] {
        &self.inner().extension_ranges
    }

    /// True if `number` falls in one of the extension ranges
    pub fn is_extension_number(&self, number: u32) -> bool {
        self.inner()
            .extension_ranges
            .iter()
            .any(|range| range.contains(&number))
    }

    /// Extensions in the pool that extend this type
    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.pool
            .all_extensions()
            .filter(move |ext| ext.extendee_index() == Some(self.index))
    }

    /// True for the synthesized entry type of a map field
    pub fn is_map_entry(&self) -> bool {
        self.inner().map_entry
    }

    /// True if this type uses the MessageSet wire format
    pub fn is_message_set(&self) -> bool {
        self.inner().message_set
    }

    /// Key field of a map entry type
    pub fn map_entry_key_field(&self) -> Option<FieldDescriptor> {
        self.is_map_entry().then(|| self.get_field(1)).flatten()
    }

    /// Value field of a map entry type
    pub fn map_entry_value_field(&self) -> Option<FieldDescriptor> {
        self.is_map_entry().then(|| self.get_field(2)).flatten()
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.pool.ptr_eq(&other.pool) && self.index == other.index
    }
}

impl Eq for MessageDescriptor {}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldLoc {
    Field { message: usize, index: usize },
    Extension(usize),
}

/// Handle to a field or extension
#[derive(Clone)]
pub struct FieldDescriptor {
    pool: DescriptorPool,
    loc: FieldLoc,
}

impl FieldDescriptor {
    pub(crate) fn inner(&self) -> &FieldInner {
        match self.loc {
            FieldLoc::Field { message, index } => &self.pool.inner.messages[message].fields[index],
            FieldLoc::Extension(index) => &self.pool.inner.extensions[index],
        }
    }

    /// The pool this field belongs to
    pub fn parent_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.inner().number
    }

    /// Declared type
    pub fn kind(&self) -> Kind {
        let pool = &self.pool;
        match self.inner().kind {
            KindIndex::Double => Kind::Double,
            KindIndex::Float => Kind::Float,
            KindIndex::Int32 => Kind::Int32,
            KindIndex::Int64 => Kind::Int64,
            KindIndex::Uint32 => Kind::Uint32,
            KindIndex::Uint64 => Kind::Uint64,
            KindIndex::Sint32 => Kind::Sint32,
            KindIndex::Sint64 => Kind::Sint64,
            KindIndex::Fixed32 => Kind::Fixed32,
            KindIndex::Fixed64 => Kind::Fixed64,
            KindIndex::Sfixed32 => Kind::Sfixed32,
            KindIndex::Sfixed64 => Kind::Sfixed64,
            KindIndex::Bool => Kind::Bool,
            KindIndex::String => Kind::String,
            KindIndex::Bytes => Kind::Bytes,
            KindIndex::Enum(index) => Kind::Enum(EnumDescriptor {
                pool: pool.clone(),
                index,
            }),
            KindIndex::Message(index) => Kind::Message(MessageDescriptor {
                pool: pool.clone(),
                index,
            }),
            KindIndex::Group(index) => Kind::Group(MessageDescriptor {
                pool: pool.clone(),
                index,
            }),
        }
    }

    /// Field label
    pub fn cardinality(&self) -> Cardinality {
        self.inner().cardinality
    }

    /// True for repeated fields, including maps
    pub fn is_repeated(&self) -> bool {
        self.inner().cardinality == Cardinality::Repeated
    }

    /// True for required fields
    pub fn is_required(&self) -> bool {
        self.inner().cardinality == Cardinality::Required
    }

    /// True for repeated fields whose type is a map entry
    pub fn is_map(&self) -> bool {
        match self.inner().kind {
            KindIndex::Message(index) => {
                self.is_repeated() && self.pool.inner.messages[index].map_entry
            }
            _ => false,
        }
    }

    /// True for repeated fields that are not maps
    pub fn is_list(&self) -> bool {
        self.is_repeated() && !self.is_map()
    }

    /// True if repeated values are written in the packed encoding
    pub fn is_packed(&self) -> bool {
        let inner = self.inner();
        inner.packed && inner.cardinality == Cardinality::Repeated && inner.kind.is_packable()
    }

    /// True if the field may legally use the packed encoding
    pub fn is_packable(&self) -> bool {
        self.is_repeated() && self.inner().kind.is_packable()
    }

    /// True for message fields annotated `[lazy = true]`
    pub fn is_lazy(&self) -> bool {
        let inner = self.inner();
        inner.lazy && inner.cardinality != Cardinality::Repeated && inner.kind.is_message()
    }

    /// True if the field tracks presence separately from its value
    pub fn supports_presence(&self) -> bool {
        self.inner().presence
    }

    /// True for string fields that reject invalid UTF-8
    pub fn enforces_utf8(&self) -> bool {
        let inner = self.inner();
        inner.utf8 && inner.kind == KindIndex::String
    }

    /// True if this descriptor describes an extension
    pub fn is_extension(&self) -> bool {
        matches!(self.loc, FieldLoc::Extension(_))
    }

    fn extendee_index(&self) -> Option<usize> {
        self.inner().extendee
    }

    /// The message type this field belongs to.
    ///
    /// For extensions this is the extended type, not the declaring scope.
    pub fn containing_message(&self) -> MessageDescriptor {
        let index = match self.loc {
            FieldLoc::Field { message, .. } => message,
            FieldLoc::Extension(index) => self.pool.inner.extensions[index].extendee.unwrap_or(0),
        };
        MessageDescriptor {
            pool: self.pool.clone(),
            index,
        }
    }

    /// The oneof this field is a member of
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        match self.loc {
            FieldLoc::Field { message, .. } => {
                self.inner().oneof.map(|index| OneofDescriptor {
                    message: MessageDescriptor {
                        pool: self.pool.clone(),
                        index: message,
                    },
                    index,
                })
            }
            FieldLoc::Extension(_) => None,
        }
    }

    /// Value reported for the field when it is absent
    pub fn default_value(&self) -> Value {
        if self.is_repeated() {
            return Value::List(Vec::new());
        }
        if let Some(default) = &self.inner().default {
            return default.clone();
        }
        match self.kind() {
            Kind::Message(m) | Kind::Group(m) => Value::Message(DynamicMessage::new(m)),
            kind => Value::zero_for(&kind),
        }
    }

    /// Wire type of a single unpacked value
    pub fn wire_type(&self) -> WireType {
        self.kind().wire_type()
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.pool.ptr_eq(&other.pool) && self.loc == other.loc
    }
}

impl Eq for FieldDescriptor {}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldDescriptor({} = {}: {:?})",
            self.full_name(),
            self.number(),
            self.kind()
        )
    }
}

/// Handle to an enum type
#[derive(Clone)]
pub struct EnumDescriptor {
    pool: DescriptorPool,
    index: usize,
}

impl EnumDescriptor {
    fn inner(&self) -> &EnumInner {
        &self.pool.inner.enums[self.index]
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// True for proto2 enums, which reject numbers they do not declare
    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }

    /// Declared `(name, number)` pairs, in declaration order
    pub fn values(&self) -> &[(String, i32)] {
        &self.inner().values
    }

    /// Name of the first value declared with `number`
    pub fn get_value(&self, number: i32) -> Option<&str> {
        self.inner()
            .values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    /// Number of the value called `name`
    pub fn get_value_by_name(&self, name: &str) -> Option<i32> {
        self.inner()
            .values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, number)| *number)
    }

    /// True if `number` is declared
    pub fn contains(&self, number: i32) -> bool {
        self.get_value(number).is_some()
    }

    /// Number of the first declared value
    pub fn default_number(&self) -> i32 {
        self.inner().values.first().map(|(_, n)| *n).unwrap_or(0)
    }
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.pool.ptr_eq(&other.pool) && self.index == other.index
    }
}

impl Eq for EnumDescriptor {}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}

/// Handle to a oneof
#[derive(Clone, PartialEq, Eq)]
pub struct OneofDescriptor {
    message: MessageDescriptor,
    index: usize,
}

impl OneofDescriptor {
    fn inner(&self) -> &OneofInner {
        &self.message.inner().oneofs[self.index]
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Position among the containing message's oneofs
    pub fn index(&self) -> usize {
        self.index
    }

    /// The message declaring this oneof
    pub fn containing_message(&self) -> &MessageDescriptor {
        &self.message
    }

    /// Member fields in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(move |&index| self.message.field_at(index))
    }
}

impl fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OneofDescriptor({}.{})",
            self.message.full_name(),
            self.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> DescriptorPool {
        DescriptorPool::builder()
            .message(
                MessageDef::new("test.Node")
                    .field(FieldDef::optional("value", 1, FieldType::Int32))
                    .field(FieldDef::optional(
                        "child",
                        2,
                        FieldType::Message("test.Node".into()),
                    ))
                    .field(FieldDef::repeated("tags", 3, FieldType::Uint32).packed(true))
                    .field(FieldDef::optional("name", 4, FieldType::String).oneof("choice"))
                    .field(FieldDef::optional("id", 5, FieldType::Int64).oneof("choice"))
                    .extension_range(100..200),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_proto_syntax() {
        assert_eq!(Syntax::try_from("").unwrap(), Syntax::Proto2);
        assert_eq!(Syntax::try_from("proto2").unwrap(), Syntax::Proto2);
        assert_eq!(Syntax::try_from("proto3").unwrap(), Syntax::Proto3);
        assert!(Syntax::try_from("proto4").is_err());
    }

    #[test]
    fn test_self_referential_message() {
        let pool = pool();
        let node = pool.get_message_by_name("test.Node").unwrap();
        let child = node.get_field_by_name("child").unwrap();
        assert_eq!(child.kind().as_message(), Some(&node));
        assert_eq!(child.containing_message(), node);
    }

    #[test]
    fn test_field_metadata() {
        let pool = pool();
        let node = pool.get_message_by_name(".test.Node").unwrap();
        let tags = node.get_field(3).unwrap();
        assert!(tags.is_packed());
        assert!(tags.is_list());
        assert!(!tags.supports_presence());
        let value = node.get_field(1).unwrap();
        assert!(value.supports_presence());
        assert_eq!(value.wire_type(), WireType::Varint);
        assert_eq!(value.full_name(), "test.Node.value");
        assert!(node.is_extension_number(150));
        assert!(!node.is_extension_number(200));
    }

    #[test]
    fn test_oneof_membership() {
        let pool = pool();
        let node = pool.get_message_by_name("test.Node").unwrap();
        let oneof = node.oneofs().next().unwrap();
        assert_eq!(oneof.name(), "choice");
        let members: Vec<_> = oneof.fields().map(|f| f.number()).collect();
        assert_eq!(members, vec![4, 5]);
        assert_eq!(
            node.get_field(4).unwrap().containing_oneof(),
            Some(oneof.clone())
        );
        assert!(node.get_field(1).unwrap().containing_oneof().is_none());
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let pool = DescriptorPool::builder()
            .message(
                MessageDef::new("test.Shuffled")
                    .field(FieldDef::optional("c", 3, FieldType::Int32))
                    .field(FieldDef::optional("a", 1, FieldType::Int32))
                    .field(FieldDef::optional("b", 2, FieldType::Int32)),
            )
            .build()
            .unwrap();
        let desc = pool.get_message_by_name("test.Shuffled").unwrap();
        let numbers: Vec<u32> = desc.fields().map(|f| f.number()).collect();
        assert_eq!(numbers, vec![3, 1, 2]);

        let mut msg = DynamicMessage::new(desc.clone());
        for field in desc.fields() {
            msg.set_field(&field, Value::I32(1)).unwrap();
        }
        assert_eq!(msg.encode_to_vec(), vec![0x08, 1, 0x10, 1, 0x18, 1]);
    }
}
