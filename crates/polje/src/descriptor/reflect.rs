//! Ingestion of compiled schemas through prost-reflect.
//!
//! The schema compiler hands us a `FileDescriptorSet`. prost-reflect does
//! the heavy lifting of validating and cross-linking it; we then copy the
//! parts the engine needs into our own arena.

use super::{DescriptorPool, EnumDef, FieldDef, FieldType, MessageDef, PoolBuilder, Syntax};
use crate::error::{Error, Result};
use crate::value::Value;
use bytes::Bytes;
use prost::Message;
use prost_types::{FieldDescriptorProto, FileDescriptorSet};
use tracing::debug;

impl DescriptorPool {
    /// Builds a pool from a serialized `FileDescriptorSet`
    pub fn decode(data: &[u8]) -> Result<Self> {
        let fds = FileDescriptorSet::decode(data)?;
        Self::from_file_descriptor_set(fds)
    }

    /// Builds a pool from a `FileDescriptorSet`
    pub fn from_file_descriptor_set(fds: FileDescriptorSet) -> Result<Self> {
        let pool = prost_reflect::DescriptorPool::from_file_descriptor_set(fds).map_err(|e| {
            Error::descriptor_build(format!("failed to link descriptor set: {}", e))
        })?;
        Self::from_reflect(&pool)
    }

    /// Copies every message, enum and extension of a prost-reflect pool
    pub fn from_reflect(pool: &prost_reflect::DescriptorPool) -> Result<Self> {
        let mut builder = PoolBuilder::new();

        for message in pool.all_messages() {
            let file = message.parent_file();
            let syntax = convert_syntax(file.syntax());
            let check_utf8 = file_checks_utf8(file.file_descriptor_proto(), syntax);

            let mut def = MessageDef::new(message.full_name()).syntax(syntax);
            if message.is_map_entry() {
                def = def.map_entry();
            }
            let message_set = message
                .descriptor_proto()
                .options
                .as_ref()
                .and_then(|o| o.message_set_wire_format)
                .unwrap_or(false);
            if message_set {
                def = def.message_set_wire_format();
            }
            for range in message.extension_ranges() {
                def = def.extension_range(range);
            }

            for field in message.fields() {
                let proto = field.field_descriptor_proto();
                let mut field_def = convert_field(
                    field.name(),
                    field.number(),
                    field.kind(),
                    field.cardinality(),
                    field.is_group(),
                    field.is_packed(),
                    proto,
                    check_utf8,
                )?;
                if let Some(oneof) = field.containing_oneof() {
                    if !proto.proto3_optional() {
                        field_def = field_def.oneof(oneof.name());
                    }
                }
                def = def.field(field_def);
            }

            builder = builder.message(def);
        }

        for enum_type in pool.all_enums() {
            let syntax = convert_syntax(enum_type.parent_file().syntax());
            let mut def = EnumDef::new(enum_type.full_name()).syntax(syntax);
            for value in enum_type.values() {
                def = def.value(value.name(), value.number());
            }
            builder = builder.enumeration(def);
        }

        for extension in pool.all_extensions() {
            let file = extension.parent_file();
            let syntax = convert_syntax(file.syntax());
            let check_utf8 = file_checks_utf8(file.file_descriptor_proto(), syntax);
            let scope = match extension.parent_message() {
                Some(parent) => parent.full_name().to_string(),
                None => file.package_name().to_string(),
            };
            let def = convert_field(
                extension.name(),
                extension.number(),
                extension.kind(),
                extension.cardinality(),
                extension.is_group(),
                extension.is_packed(),
                extension.field_descriptor_proto(),
                check_utf8,
            )?
            .extendee(format!(".{}", extension.containing_message().full_name()));
            builder = builder.extension(scope, def);
        }

        let pool = builder.build()?;
        debug!(?pool, "ingested descriptor pool");
        Ok(pool)
    }
}

fn convert_syntax(syntax: prost_reflect::Syntax) -> Syntax {
    if matches!(syntax, prost_reflect::Syntax::Proto3) {
        Syntax::Proto3
    } else {
        Syntax::Proto2
    }
}

fn file_checks_utf8(file: &prost_types::FileDescriptorProto, syntax: Syntax) -> bool {
    syntax == Syntax::Proto3
        || file
            .options
            .as_ref()
            .and_then(|o| o.java_string_check_utf8)
            .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn convert_field(
    name: &str,
    number: u32,
    kind: prost_reflect::Kind,
    cardinality: prost_reflect::Cardinality,
    is_group: bool,
    is_packed: bool,
    proto: &FieldDescriptorProto,
    check_utf8: bool,
) -> Result<FieldDef> {
    use prost_reflect::Kind as K;

    let ty = match &kind {
        K::Double => FieldType::Double,
        K::Float => FieldType::Float,
        K::Int32 => FieldType::Int32,
        K::Int64 => FieldType::Int64,
        K::Uint32 => FieldType::Uint32,
        K::Uint64 => FieldType::Uint64,
        K::Sint32 => FieldType::Sint32,
        K::Sint64 => FieldType::Sint64,
        K::Fixed32 => FieldType::Fixed32,
        K::Fixed64 => FieldType::Fixed64,
        K::Sfixed32 => FieldType::Sfixed32,
        K::Sfixed64 => FieldType::Sfixed64,
        K::Bool => FieldType::Bool,
        K::String => FieldType::String,
        K::Bytes => FieldType::Bytes,
        K::Enum(e) => FieldType::Enum(format!(".{}", e.full_name())),
        K::Message(m) if is_group => FieldType::Group(format!(".{}", m.full_name())),
        K::Message(m) => FieldType::Message(format!(".{}", m.full_name())),
    };

    let mut def = match cardinality {
        prost_reflect::Cardinality::Optional => FieldDef::optional(name, number, ty),
        prost_reflect::Cardinality::Required => FieldDef::required(name, number, ty),
        prost_reflect::Cardinality::Repeated => FieldDef::repeated(name, number, ty),
    }
    .packed(is_packed)
    .check_utf8(check_utf8);

    if proto.proto3_optional() {
        def = def.proto3_optional();
    }
    let lazy = proto
        .options
        .as_ref()
        .and_then(|o| o.lazy)
        .unwrap_or(false);
    if lazy {
        def = def.lazy();
    }
    if let Some(text) = &proto.default_value {
        def = def.default_value(parse_default(&kind, text)?);
    }
    Ok(def)
}

/// Interprets the textual default stored in a `FieldDescriptorProto`
fn parse_default(kind: &prost_reflect::Kind, text: &str) -> Result<Value> {
    use prost_reflect::Kind as K;

    let invalid = || Error::descriptor_build(format!("invalid default value '{text}'"));
    let value = match kind {
        K::Double => Value::F64(parse_float(text).ok_or_else(invalid)?),
        K::Float => Value::F32(parse_float(text).ok_or_else(invalid)? as f32),
        K::Int32 | K::Sint32 | K::Sfixed32 => Value::I32(text.parse().map_err(|_| invalid())?),
        K::Int64 | K::Sint64 | K::Sfixed64 => Value::I64(text.parse().map_err(|_| invalid())?),
        K::Uint32 | K::Fixed32 => Value::U32(text.parse().map_err(|_| invalid())?),
        K::Uint64 | K::Fixed64 => Value::U64(text.parse().map_err(|_| invalid())?),
        K::Bool => Value::Bool(text.parse().map_err(|_| invalid())?),
        K::String => Value::String(text.to_string()),
        K::Bytes => Value::Bytes(Bytes::from(unescape_bytes(text).ok_or_else(invalid)?)),
        K::Enum(e) => Value::EnumNumber(
            e.get_value_by_name(text)
                .map(|v| v.number())
                .ok_or_else(invalid)?,
        ),
        K::Message(_) => return Err(invalid()),
    };
    Ok(value)
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Reverses the C-style escaping protoc applies to `bytes` defaults
fn unescape_bytes(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        let esc = *bytes.get(i)?;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'v' => out.push(0x0B),
            b'\\' | b'\'' | b'"' | b'?' => out.push(esc),
            b'0'..=b'7' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(u8::try_from(value).ok()?);
                continue;
            }
            b'x' => {
                i += 1;
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 2 {
                    match bytes.get(i).and_then(|d| (*d as char).to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            i += 1;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return None;
                }
                out.push(value as u8);
                continue;
            }
            _ => return None,
        }
        i += 1;
    }
    Some(out)
}
