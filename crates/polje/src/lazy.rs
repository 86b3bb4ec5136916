//! Deferred parsing of embedded messages.

use crate::config::ParseOptions;
use crate::descriptor::MessageDescriptor;
use crate::field_set::decode::{self, DecodeContext};
use crate::message::DynamicMessage;
use crate::registry::ExtensionRegistry;
use bytes::Bytes;
use once_cell::race::OnceBox;
use std::fmt;
use tracing::debug;

/// An embedded message kept as bytes until first read.
///
/// Either the bytes or the parsed value is always present; the other is
/// computed on demand and memoized. The memo cells are written at most
/// once through an atomic pointer swap, so a shared `&LazyField` can be
/// read from many threads at once: concurrent first reads may each parse
/// the bytes, one result wins and the others are dropped.
///
/// A lazy field does not report parse errors. Bytes that fail to parse
/// resolve to an empty message; strict validation has to go through a
/// regular parse of the owning message with lazy fields disabled.
pub struct LazyField {
    descriptor: MessageDescriptor,
    bytes: OnceBox<Bytes>,
    value: OnceBox<DynamicMessage>,
    registry: ExtensionRegistry,
    options: ParseOptions,
    depth: u32,
}

impl LazyField {
    /// Wraps the encoded bytes of one message of type `descriptor`.
    ///
    /// `registry` and `options` are used when the bytes are eventually
    /// parsed.
    pub fn from_bytes(
        descriptor: MessageDescriptor,
        bytes: Bytes,
        registry: ExtensionRegistry,
        options: ParseOptions,
    ) -> Self {
        Self::captured(descriptor, bytes, registry, options, 0)
    }

    /// Lazy field captured by the parser at nesting `depth`
    pub(crate) fn captured(
        descriptor: MessageDescriptor,
        bytes: Bytes,
        registry: ExtensionRegistry,
        options: ParseOptions,
        depth: u32,
    ) -> Self {
        let cell = OnceBox::new();
        let _ = cell.set(Box::new(bytes));
        Self {
            descriptor,
            bytes: cell,
            value: OnceBox::new(),
            registry,
            options,
            depth,
        }
    }

    /// Wraps an already-built message; its bytes are computed when first
    /// needed
    pub fn from_value(value: DynamicMessage) -> Self {
        let cell = OnceBox::new();
        let descriptor = value.descriptor().clone();
        let _ = cell.set(Box::new(value));
        Self {
            descriptor,
            bytes: OnceBox::new(),
            value: cell,
            registry: ExtensionRegistry::empty(),
            options: ParseOptions::default(),
            depth: 0,
        }
    }

    /// Message type of the field
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// True once the parsed value has been computed
    pub fn is_parsed(&self) -> bool {
        self.value.get().is_some()
    }

    /// The parsed message, parsing and memoizing it on first call
    pub fn get(&self) -> &DynamicMessage {
        self.value.get_or_init(|| Box::new(self.parse()))
    }

    fn parse(&self) -> DynamicMessage {
        let mut message = DynamicMessage::new(self.descriptor.clone());
        let Some(bytes) = self.bytes.get() else {
            return message;
        };
        let ctx = DecodeContext {
            registry: &self.registry,
            options: &self.options,
        };
        match decode::merge_from_buf(&mut message, bytes.clone(), self.depth, ctx) {
            Ok(()) => message,
            Err(err) => {
                debug!(
                    message = self.descriptor.full_name(),
                    error = %err,
                    "lazy field failed to parse, using the default instance"
                );
                DynamicMessage::new(self.descriptor.clone())
            }
        }
    }

    /// The encoded message, encoding and memoizing it on first call
    pub fn bytes(&self) -> &Bytes {
        self.bytes
            .get_or_init(|| Box::new(self.get().encode_to_bytes()))
    }

    /// Encoded length without forcing an encode of a parsed value
    pub fn encoded_len(&self) -> usize {
        match (self.bytes.get(), self.value.get()) {
            (Some(bytes), _) => bytes.len(),
            (None, Some(value)) => value.encoded_len(),
            (None, None) => 0,
        }
    }

    /// Replaces the value, dropping any memoized bytes
    pub fn set_value(&mut self, value: DynamicMessage) {
        let registry = std::mem::replace(&mut self.registry, ExtensionRegistry::empty());
        *self = Self {
            registry,
            ..Self::from_value(value)
        };
    }

    /// Consumes the field, returning the parsed message
    pub fn into_value(self) -> DynamicMessage {
        if let Some(value) = self.value.get() {
            return value.clone();
        }
        self.parse()
    }

    /// Merges `other` into this field.
    ///
    /// When neither side has been parsed and this field's registry knows
    /// every extension `other`'s does, the byte spans are concatenated,
    /// which the wire format defines as a merge. Otherwise both sides are
    /// parsed and merged as messages.
    pub fn merge(&mut self, other: &LazyField) {
        if let (None, None, Some(ours), Some(theirs)) = (
            self.value.get(),
            other.value.get(),
            self.bytes.get(),
            other.bytes.get(),
        ) {
            if self.registry.is_superset_of(&other.registry) {
                let mut joined = Vec::with_capacity(ours.len() + theirs.len());
                joined.extend_from_slice(ours);
                joined.extend_from_slice(theirs);
                self.bytes = OnceBox::new();
                let _ = self.bytes.set(Box::new(Bytes::from(joined)));
                return;
            }
        }
        let mut merged = self.get().clone();
        merged.merge_unchecked(other.get());
        self.set_value(merged);
    }
}

impl Clone for LazyField {
    fn clone(&self) -> Self {
        let bytes = OnceBox::new();
        if let Some(b) = self.bytes.get() {
            let _ = bytes.set(Box::new(b.clone()));
        }
        let value = OnceBox::new();
        if let Some(v) = self.value.get() {
            let _ = value.set(Box::new(v.clone()));
        }
        Self {
            descriptor: self.descriptor.clone(),
            bytes,
            value,
            registry: self.registry.clone(),
            options: self.options.clone(),
            depth: self.depth,
        }
    }
}

impl PartialEq for LazyField {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl fmt::Debug for LazyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("LazyField").field(value).finish(),
            None => f
                .debug_struct("LazyField")
                .field("descriptor", &self.descriptor)
                .field("unparsed_len", &self.encoded_len())
                .finish(),
        }
    }
}
