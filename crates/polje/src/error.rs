//! Error types for the polje library.
//!
//! Everything that can go wrong while reading protobuf data funnels into
//! [`Error::Decode`] (or [`Error::Uninitialized`] for strict parses), so
//! callers can tell "the bytes are bad" apart from "the byte source failed"
//! ([`Error::Io`]) with a single [`Error::is_invalid_data`] check.

use std::fmt;
use thiserror::Error;

/// Result type alias for polje operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all polje operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input is not a valid protocol buffer
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A message is missing required fields
    #[error("message is missing required fields: {}", .missing.join(", "))]
    Uninitialized {
        /// Dotted paths of every missing required field, in traversal order
        missing: Vec<String>,
    },

    /// The underlying byte source or sink failed
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),

    /// A reflection call was given a value or field it cannot accept
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attempt to modify a frozen extension registry
    #[error("extension registry is unmodifiable")]
    UnmodifiableRegistry,

    /// Failed to parse a FileDescriptorSet
    #[error("failed to parse descriptor set: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build the descriptor pool
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),
}

impl Error {
    /// Creates a new decode error
    pub fn decode(kind: DecodeErrorKind, offset: usize) -> Self {
        Self::Decode(DecodeError::new(kind, offset))
    }

    /// Creates a new invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Returns true if the error was caused by invalid protobuf data
    /// rather than by the byte source or by API misuse.
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Uninitialized { .. })
    }

    /// Returns the decode error kind, if this is a data error
    pub fn decode_kind(&self) -> Option<&DecodeErrorKind> {
        match self {
            Self::Decode(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// An invalid protocol buffer, with the offset where reading failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    offset: usize,
}

impl DecodeError {
    /// Creates a new decode error
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// What went wrong
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// Byte offset in the input where the error was detected
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid protocol buffer at offset {}: {}",
            self.offset, self.kind
        )
    }
}

impl std::error::Error for DecodeError {}

/// The specific reason a protocol buffer was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// A varint ran past 10 bytes or did not fit the requested width
    #[error("malformed varint")]
    MalformedVarint,

    /// A tag carried a wire type outside 0..=5
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),

    /// A tag carried field number 0 or one above the maximum
    #[error("invalid tag (field number {0})")]
    InvalidTag(u64),

    /// The input ended inside a field, or a length ran past the input
    #[error("truncated message: input ended unexpectedly or a length exceeded the remaining bytes")]
    TruncatedMessage,

    /// An END_GROUP tag did not match the open START_GROUP
    #[error("end-group tag for field {found} does not match start-group field {expected}")]
    InvalidEndGroupTag {
        /// Field number of the open group
        expected: u32,
        /// Field number found on the END_GROUP tag
        found: u32,
    },

    /// An END_GROUP tag appeared outside of any group
    #[error("unexpected end-group tag for field {0}")]
    UnexpectedEndGroup(u32),

    /// Nesting went deeper than the configured recursion limit
    #[error("message nesting exceeds the recursion limit of {limit}")]
    TooManyNestedMessages {
        /// The configured limit
        limit: u32,
    },

    /// A string field demanding UTF-8 held invalid bytes
    #[error("invalid UTF-8 in string field '{field}'")]
    InvalidUtf8 {
        /// Full name of the offending field
        field: String,
    },

    /// A length prefix decoded to a negative value
    #[error("negative length prefix")]
    NegativeSize,
}
