//! Programmatic construction of descriptor pools.
//!
//! Definitions refer to each other by fully-qualified name; names are
//! resolved when [`PoolBuilder::build`] runs, so definition order does not
//! matter and types may refer to themselves.

use super::{
    Cardinality, DescriptorPool, EnumInner, FieldInner, KindIndex, MessageInner, OneofInner,
    PoolInner, Syntax,
};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::wire::MAX_FIELD_NUMBER;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// Declared type of a field definition; composite types are named
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
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
    /// Enum, by fully-qualified name
    Enum(String),
    /// Embedded message, by fully-qualified name
    Message(String),
    /// Group, by fully-qualified message name
    Group(String),
}

/// A field or extension definition
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    number: u32,
    ty: FieldType,
    cardinality: Cardinality,
    packed: Option<bool>,
    lazy: bool,
    oneof: Option<String>,
    proto3_optional: bool,
    utf8: Option<bool>,
    default: Option<Value>,
    extendee: Option<String>,
}

impl FieldDef {
    /// Creates a singular optional field
    pub fn optional(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
            cardinality: Cardinality::Optional,
            packed: None,
            lazy: false,
            oneof: None,
            proto3_optional: false,
            utf8: None,
            default: None,
            extendee: None,
        }
    }

    /// Creates a required field
    pub fn required(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self {
            cardinality: Cardinality::Required,
            ..Self::optional(name, number, ty)
        }
    }

    /// Creates a repeated field
    pub fn repeated(name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        Self {
            cardinality: Cardinality::Repeated,
            ..Self::optional(name, number, ty)
        }
    }

    /// Sets the packed encoding explicitly (default: packed in proto3 only)
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    /// Marks a message field `[lazy = true]`
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Places the field in the named oneof
    pub fn oneof(mut self, name: impl Into<String>) -> Self {
        self.oneof = Some(name.into());
        self
    }

    /// Marks a proto3 field `optional`, giving it explicit presence
    pub fn proto3_optional(mut self) -> Self {
        self.proto3_optional = true;
        self
    }

    /// Overrides strict UTF-8 checking (default: on in proto3 only)
    pub fn check_utf8(mut self, check: bool) -> Self {
        self.utf8 = Some(check);
        self
    }

    /// Sets the explicit default value
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Declares the field as an extension of the named message
    pub fn extendee(mut self, name: impl Into<String>) -> Self {
        self.extendee = Some(name.into());
        self
    }
}

/// A message type definition
#[derive(Debug, Clone)]
pub struct MessageDef {
    full_name: String,
    syntax: Option<Syntax>,
    fields: Vec<FieldDef>,
    extension_ranges: Vec<Range<u32>>,
    map_entry: bool,
    message_set: bool,
    nested: Vec<MessageDef>,
}

impl MessageDef {
    /// Creates an empty message definition
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            syntax: None,
            fields: Vec::new(),
            extension_ranges: Vec::new(),
            map_entry: false,
            message_set: false,
            nested: Vec::new(),
        }
    }

    /// Sets the syntax (default: the pool builder's syntax)
    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Adds a field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a map field, synthesizing its `<Name>Entry` type
    pub fn map_field(
        mut self,
        name: impl Into<String>,
        number: u32,
        key: FieldType,
        value: FieldType,
    ) -> Self {
        let name = name.into();
        let entry_name = format!("{}.{}Entry", self.full_name, to_upper_camel_case(&name));
        let mut entry = MessageDef::new(entry_name.clone())
            .field(FieldDef::optional("key", 1, key))
            .field(FieldDef::optional("value", 2, value));
        entry.map_entry = true;
        entry.syntax = self.syntax;
        self.nested.push(entry);
        self.fields
            .push(FieldDef::repeated(name, number, FieldType::Message(entry_name)));
        self
    }

    /// Reserves `range` (end exclusive) for extensions
    pub fn extension_range(mut self, range: Range<u32>) -> Self {
        self.extension_ranges.push(range);
        self
    }

    /// Switches the type to the MessageSet wire format
    pub fn message_set_wire_format(mut self) -> Self {
        self.message_set = true;
        self
    }

    /// Marks the type as a map entry
    pub fn map_entry(mut self) -> Self {
        self.map_entry = true;
        self
    }
}

/// An enum type definition
#[derive(Debug, Clone)]
pub struct EnumDef {
    full_name: String,
    syntax: Option<Syntax>,
    values: Vec<(String, i32)>,
}

impl EnumDef {
    /// Creates an enum definition with no values
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            syntax: None,
            values: Vec::new(),
        }
    }

    /// Sets the syntax; proto2 enums are closed, proto3 enums are open
    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Adds a value
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }
}

/// Collects definitions and resolves them into a [`DescriptorPool`]
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    syntax: Syntax,
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
    extensions: Vec<(String, FieldDef)>,
}

impl PoolBuilder {
    /// Creates an empty builder defaulting to proto2
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the syntax used by definitions that do not set their own
    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Adds a message type (and any map entry types it synthesized)
    pub fn message(mut self, def: MessageDef) -> Self {
        self.messages.push(def);
        self
    }

    /// Adds an enum type
    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    /// Adds an extension declared in `scope` (a package or message name).
    ///
    /// The definition must name its extended type with
    /// [`FieldDef::extendee`].
    pub fn extension(mut self, scope: impl Into<String>, def: FieldDef) -> Self {
        self.extensions.push((scope.into(), def));
        self
    }

    /// Resolves every name and freezes the pool
    pub fn build(self) -> Result<DescriptorPool> {
        let mut messages = Vec::new();
        for def in self.messages {
            flatten(def, &mut messages);
        }

        let mut message_names = HashMap::new();
        for (index, def) in messages.iter().enumerate() {
            if message_names.insert(def.full_name.clone(), index).is_some() {
                return Err(Error::descriptor_build(format!(
                    "duplicate message type '{}'",
                    def.full_name
                )));
            }
        }

        let mut enum_names = HashMap::new();
        let mut enums = Vec::with_capacity(self.enums.len());
        for (index, def) in self.enums.into_iter().enumerate() {
            if enum_names.insert(def.full_name.clone(), index).is_some()
                || message_names.contains_key(&def.full_name)
            {
                return Err(Error::descriptor_build(format!(
                    "duplicate type '{}'",
                    def.full_name
                )));
            }
            if def.values.is_empty() {
                return Err(Error::descriptor_build(format!(
                    "enum '{}' declares no values",
                    def.full_name
                )));
            }
            let syntax = def.syntax.unwrap_or(self.syntax);
            enums.push(EnumInner {
                name: short_name(&def.full_name).to_string(),
                full_name: def.full_name,
                values: def.values,
                closed: syntax == Syntax::Proto2,
            });
        }

        let resolver = Resolver {
            messages: &message_names,
            enums: &enum_names,
        };

        let mut message_inners = Vec::with_capacity(messages.len());
        for def in &messages {
            let syntax = def.syntax.unwrap_or(self.syntax);
            let mut fields = Vec::with_capacity(def.fields.len());
            let mut by_number = HashMap::new();
            let mut by_name = HashMap::new();
            let mut oneofs: Vec<OneofInner> = Vec::new();

            for (index, field) in def.fields.iter().enumerate() {
                let oneof = match &field.oneof {
                    Some(name) => {
                        let position = match oneofs.iter().position(|o| &o.name == name) {
                            Some(position) => position,
                            None => {
                                oneofs.push(OneofInner {
                                    name: name.clone(),
                                    fields: Vec::new(),
                                });
                                oneofs.len() - 1
                            }
                        };
                        oneofs[position].fields.push(index);
                        Some(position)
                    }
                    None => None,
                };
                let inner =
                    resolve_field(field, &def.full_name, syntax, oneof, None, &resolver, &enums)?;
                if by_number.insert(inner.number, index).is_some() {
                    return Err(Error::descriptor_build(format!(
                        "duplicate field number {} in '{}'",
                        inner.number, def.full_name
                    )));
                }
                if def
                    .extension_ranges
                    .iter()
                    .any(|range| range.contains(&inner.number))
                {
                    return Err(Error::descriptor_build(format!(
                        "field '{}' uses a number reserved for extensions",
                        inner.full_name
                    )));
                }
                by_name.insert(inner.name.clone(), index);
                fields.push(inner);
            }

            message_inners.push(MessageInner {
                name: short_name(&def.full_name).to_string(),
                full_name: def.full_name.clone(),
                syntax,
                fields,
                by_number,
                by_name,
                oneofs,
                extension_ranges: def.extension_ranges.clone(),
                map_entry: def.map_entry,
                message_set: def.message_set,
            });
        }

        let mut extension_names = HashMap::new();
        let mut extension_numbers = HashMap::new();
        let mut extensions = Vec::with_capacity(self.extensions.len());
        for (scope, def) in &self.extensions {
            let Some(extendee_name) = &def.extendee else {
                return Err(Error::descriptor_build(format!(
                    "extension '{}.{}' does not name an extended type",
                    scope, def.name
                )));
            };
            let extendee = resolver.message(extendee_name, scope)?;
            let target = &message_inners[extendee];
            if !target
                .extension_ranges
                .iter()
                .any(|range| range.contains(&def.number))
            {
                return Err(Error::descriptor_build(format!(
                    "extension '{}.{}' = {} is outside the extension ranges of '{}'",
                    scope, def.name, def.number, target.full_name
                )));
            }
            let syntax = target.syntax;
            let inner = resolve_field(def, scope, syntax, None, Some(extendee), &resolver, &enums)?;
            if extension_names
                .insert(inner.full_name.clone(), extensions.len())
                .is_some()
            {
                return Err(Error::descriptor_build(format!(
                    "duplicate extension '{}'",
                    inner.full_name
                )));
            }
            if let Some(previous) =
                extension_numbers.insert((extendee, inner.number), inner.full_name.clone())
            {
                return Err(Error::descriptor_build(format!(
                    "extensions '{}' and '{}' both use number {} of '{}'",
                    previous, inner.full_name, inner.number, target.full_name
                )));
            }
            trace!(extension = %inner.full_name, extendee = %target.full_name, "resolved extension");
            extensions.push(inner);
        }

        Ok(DescriptorPool {
            inner: Arc::new(PoolInner {
                messages: message_inners,
                enums,
                extensions,
                message_names,
                enum_names,
                extension_names,
            }),
        })
    }
}

fn flatten(mut def: MessageDef, out: &mut Vec<MessageDef>) {
    let nested = std::mem::take(&mut def.nested);
    out.push(def);
    for child in nested {
        flatten(child, out);
    }
}

struct Resolver<'a> {
    messages: &'a HashMap<String, usize>,
    enums: &'a HashMap<String, usize>,
}

impl Resolver<'_> {
    /// Resolves `name` the way protoc does: absolute names directly,
    /// relative names from the innermost enclosing scope outwards.
    fn lookup(
        map: &HashMap<String, usize>,
        name: &str,
        scope: &str,
    ) -> Option<usize> {
        if let Some(absolute) = name.strip_prefix('.') {
            return map.get(absolute).copied();
        }
        let mut scope = scope;
        loop {
            let candidate = if scope.is_empty() {
                name.to_string()
            } else {
                format!("{scope}.{name}")
            };
            if let Some(&index) = map.get(&candidate) {
                return Some(index);
            }
            if scope.is_empty() {
                return None;
            }
            scope = scope.rfind('.').map(|i| &scope[..i]).unwrap_or("");
        }
    }

    fn message(&self, name: &str, scope: &str) -> Result<usize> {
        Self::lookup(self.messages, name, scope).ok_or_else(|| {
            Error::descriptor_build(format!("unknown message type '{name}' (in '{scope}')"))
        })
    }

    fn enumeration(&self, name: &str, scope: &str) -> Result<usize> {
        Self::lookup(self.enums, name, scope).ok_or_else(|| {
            Error::descriptor_build(format!("unknown enum type '{name}' (in '{scope}')"))
        })
    }
}

fn resolve_field(
    def: &FieldDef,
    scope: &str,
    syntax: Syntax,
    oneof: Option<usize>,
    extendee: Option<usize>,
    resolver: &Resolver<'_>,
    enums: &[EnumInner],
) -> Result<FieldInner> {
    let full_name = if scope.is_empty() {
        def.name.clone()
    } else {
        format!("{scope}.{}", def.name)
    };
    if def.number == 0 || def.number > MAX_FIELD_NUMBER {
        return Err(Error::descriptor_build(format!(
            "invalid field number {} for '{}': must be between 1 and {}",
            def.number, full_name, MAX_FIELD_NUMBER
        )));
    }
    if (19_000..20_000).contains(&def.number) {
        return Err(Error::descriptor_build(format!(
            "field number {} for '{}' is reserved for the protobuf implementation",
            def.number, full_name
        )));
    }

    let kind = match &def.ty {
        FieldType::Double => KindIndex::Double,
        FieldType::Float => KindIndex::Float,
        FieldType::Int32 => KindIndex::Int32,
        FieldType::Int64 => KindIndex::Int64,
        FieldType::Uint32 => KindIndex::Uint32,
        FieldType::Uint64 => KindIndex::Uint64,
        FieldType::Sint32 => KindIndex::Sint32,
        FieldType::Sint64 => KindIndex::Sint64,
        FieldType::Fixed32 => KindIndex::Fixed32,
        FieldType::Fixed64 => KindIndex::Fixed64,
        FieldType::Sfixed32 => KindIndex::Sfixed32,
        FieldType::Sfixed64 => KindIndex::Sfixed64,
        FieldType::Bool => KindIndex::Bool,
        FieldType::String => KindIndex::String,
        FieldType::Bytes => KindIndex::Bytes,
        FieldType::Enum(name) => KindIndex::Enum(resolver.enumeration(name, scope)?),
        FieldType::Message(name) => KindIndex::Message(resolver.message(name, scope)?),
        FieldType::Group(name) => KindIndex::Group(resolver.message(name, scope)?),
    };

    if def.cardinality == Cardinality::Repeated && def.default.is_some() {
        return Err(Error::descriptor_build(format!(
            "repeated field '{full_name}' cannot have a default value"
        )));
    }
    if syntax == Syntax::Proto3 && def.cardinality == Cardinality::Required {
        return Err(Error::descriptor_build(format!(
            "required field '{full_name}' is not allowed in proto3"
        )));
    }
    if def.oneof.is_some() && def.cardinality != Cardinality::Optional {
        return Err(Error::descriptor_build(format!(
            "oneof member '{full_name}' must be singular and optional"
        )));
    }

    if let Some(value) = &def.default {
        if !default_fits(value, kind, enums) {
            return Err(Error::descriptor_build(format!(
                "default value {value:?} does not fit the type of '{full_name}'"
            )));
        }
    }

    let default = match (&def.default, kind) {
        (Some(value), _) => Some(value.clone()),
        (None, KindIndex::Enum(index)) => {
            let number = enums[index].values.first().map(|(_, n)| *n).unwrap_or(0);
            Some(Value::EnumNumber(number))
        }
        _ => None,
    };

    let presence = def.cardinality != Cardinality::Repeated
        && (syntax == Syntax::Proto2
            || extendee.is_some()
            || kind.is_message()
            || oneof.is_some()
            || def.proto3_optional);

    Ok(FieldInner {
        name: def.name.clone(),
        full_name,
        number: def.number,
        kind,
        cardinality: def.cardinality,
        packed: def.packed.unwrap_or(syntax == Syntax::Proto3) && kind.is_packable(),
        lazy: def.lazy,
        oneof,
        presence,
        utf8: def.utf8.unwrap_or(syntax == Syntax::Proto3),
        default,
        extendee,
    })
}

/// True if `value` is a legal default for a singular field of `kind`.
///
/// Message and group fields have no defaults; enum defaults must name a
/// declared value even when the enum is open.
fn default_fits(value: &Value, kind: KindIndex, enums: &[EnumInner]) -> bool {
    match (value, kind) {
        (Value::F64(_), KindIndex::Double)
        | (Value::F32(_), KindIndex::Float)
        | (Value::I32(_), KindIndex::Int32 | KindIndex::Sint32 | KindIndex::Sfixed32)
        | (Value::I64(_), KindIndex::Int64 | KindIndex::Sint64 | KindIndex::Sfixed64)
        | (Value::U32(_), KindIndex::Uint32 | KindIndex::Fixed32)
        | (Value::U64(_), KindIndex::Uint64 | KindIndex::Fixed64)
        | (Value::Bool(_), KindIndex::Bool)
        | (Value::String(_), KindIndex::String)
        | (Value::Bytes(_), KindIndex::Bytes) => true,
        (Value::EnumNumber(n), KindIndex::Enum(index)) => {
            enums[index].values.iter().any(|(_, number)| number == n)
        }
        _ => false,
    }
}

fn short_name(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}

fn to_upper_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}
