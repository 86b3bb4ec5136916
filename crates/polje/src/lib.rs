//! # polje
//!
//! A schema-driven Protocol Buffers codec: messages are described at run
//! time by descriptors, read and written through reflection, and carried
//! over the standard binary wire format.
//!
//! The crate provides:
//! - A descriptor pool built programmatically or from a `FileDescriptorSet`
//! - [`DynamicMessage`], a message of any type, with field access, merge,
//!   and required-field checking
//! - Round-trip preservation of fields the schema does not know
//! - Extensions resolved through an [`ExtensionRegistry`], including the
//!   legacy MessageSet encoding
//! - Lazily parsed message fields that are safe to read from many threads
//!
//! ## Architecture
//!
//! - [`wire`]: varints, tags, and the low-level reader and writer
//! - [`descriptor`]: schema types and the pool that owns them
//! - [`value`]: the dynamic value model
//! - [`message`]: dynamic messages and their parse/serialize entry points
//! - [`unknown`]: unknown field storage
//! - [`registry`]: extension registries
//! - [`lazy`]: deferred parsing of message fields
//! - [`config`]: parse options
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```
//! use polje::descriptor::{DescriptorPool, FieldDef, FieldType, MessageDef};
//! use polje::{DynamicMessage, Value};
//!
//! let pool = DescriptorPool::builder()
//!     .message(
//!         MessageDef::new("demo.Point")
//!             .field(FieldDef::required("x", 1, FieldType::Int32))
//!             .field(FieldDef::optional("label", 2, FieldType::String)),
//!     )
//!     .build()?;
//! let desc = pool.get_message_by_name("demo.Point").unwrap();
//!
//! let mut point = DynamicMessage::new(desc.clone());
//! point.set_field_by_name("x", Value::I32(150))?;
//! let bytes = point.encode_to_vec();
//! assert_eq!(bytes, [0x08, 0x96, 0x01]);
//!
//! let parsed = DynamicMessage::parse(desc, bytes)?;
//! assert_eq!(parsed, point);
//! # Ok::<(), polje::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod lazy;
pub mod message;
pub mod registry;
pub mod unknown;
pub mod value;
pub mod wire;

mod field_set;

// Re-export primary types for convenience
pub use config::ParseOptions;
pub use descriptor::{
    DescriptorPool, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor,
    Syntax,
};
pub use error::{DecodeError, DecodeErrorKind, Error, Result};
pub use lazy::LazyField;
pub use message::DynamicMessage;
pub use registry::{ExtensionInfo, ExtensionRegistry};
pub use unknown::{UnknownField, UnknownFieldSet};
pub use value::{EnumValue, Value};
pub use wire::MAX_FIELD_NUMBER;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nesting depth at which parsing gives up with
/// [`DecodeErrorKind::TooManyNestedMessages`]
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;
