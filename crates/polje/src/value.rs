//! Dynamically-typed field values.

use crate::descriptor::Kind;
use crate::message::DynamicMessage;
use bytes::Bytes;

/// The value of a field, as held by a [`DynamicMessage`].
///
/// Repeated fields hold a [`Value::List`]; map fields hold a list of entry
/// messages. Floating point values compare by bit pattern, so `-0.0` and
/// `+0.0` are different values and a NaN equals itself.
#[derive(Debug, Clone)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32`
    I32(i32),
    /// `int64`, `sint64`, `sfixed64`
    I64(i64),
    /// `uint32`, `fixed32`
    U32(u32),
    /// `uint64`, `fixed64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// `string`
    String(String),
    /// `bytes`
    Bytes(Bytes),
    /// Enum value, by number
    EnumNumber(i32),
    /// Message or group
    Message(DynamicMessage),
    /// Repeated field contents
    List(Vec<Value>),
}

impl Value {
    /// The zero value of a singular field of `kind`
    pub fn zero_for(kind: &Kind) -> Value {
        match kind {
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(0),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
            Kind::Enum(e) => Value::EnumNumber(e.default_number()),
            Kind::Message(m) | Kind::Group(m) => Value::Message(DynamicMessage::new(m.clone())),
        }
    }

    /// True if the value is a single element acceptable for `kind`
    pub fn is_valid_for(&self, kind: &Kind) -> bool {
        match (self, kind) {
            (Value::F64(_), Kind::Double)
            | (Value::F32(_), Kind::Float)
            | (Value::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32)
            | (Value::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64)
            | (Value::U32(_), Kind::Uint32 | Kind::Fixed32)
            | (Value::U64(_), Kind::Uint64 | Kind::Fixed64)
            | (Value::Bool(_), Kind::Bool)
            | (Value::String(_), Kind::String)
            | (Value::Bytes(_), Kind::Bytes) => true,
            (Value::EnumNumber(n), Kind::Enum(e)) => !e.is_closed() || e.contains(*n),
            (Value::Message(m), Kind::Message(d) | Kind::Group(d)) => m.descriptor() == d,
            _ => false,
        }
    }

    /// True if the value is the implicit zero of its type.
    ///
    /// Floats count as zero only for `+0.0`; `-0.0` has a distinct bit
    /// pattern and is still written.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::I32(n) | Value::EnumNumber(n) => *n == 0,
            Value::I64(n) => *n == 0,
            Value::U32(n) => *n == 0,
            Value::U64(n) => *n == 0,
            Value::F32(f) => f.to_bits() == 0,
            Value::F64(f) => f.to_bits() == 0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Message(_) => false,
            Value::List(l) => l.is_empty(),
        }
    }

    /// Returns the `bool`, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the 32-bit signed integer, if this is one
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the 64-bit signed integer, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the 32-bit unsigned integer, if this is one
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the 64-bit unsigned integer, if this is one
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the `float`, if this is one
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the `double`, if this is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a `bytes` value
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the enum number, if this is an enum value
    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            Value::EnumNumber(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the message, if this is one
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the message mutably, if this is one
    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list, if this is a repeated value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the list mutably, if this is a repeated value
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::EnumNumber(a), Value::EnumNumber(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    DynamicMessage => Message,
    Vec<Value> => List,
}

/// Typed view of an enum field.
///
/// Open (proto3) enums keep numbers the schema does not declare; those
/// surface as [`EnumValue::Unrecognized`], which cannot be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue {
    /// A number the enum type declares
    Known(i32),
    /// A number read from the wire that the enum type does not declare
    Unrecognized(i32),
}

impl EnumValue {
    /// The number, if it is declared by the enum type
    pub fn number(&self) -> Option<i32> {
        match self {
            EnumValue::Known(n) => Some(*n),
            EnumValue::Unrecognized(_) => None,
        }
    }
}
