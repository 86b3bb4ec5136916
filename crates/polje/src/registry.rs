//! Extension registry.
//!
//! Maps `(extended type, field number)` to the extension's descriptor so
//! the parser can decode extension data into typed values. Entries are
//! keyed by the extended type's full name rather than by descriptor
//! identity, which lets a registry built from one descriptor pool parse
//! messages described by another pool with the same schema.

use crate::descriptor::{DescriptorPool, FieldDescriptor, MessageDescriptor};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A registered extension
#[derive(Debug, Clone)]
pub struct ExtensionInfo {
    descriptor: FieldDescriptor,
    default_instance: Option<DynamicMessage>,
}

impl ExtensionInfo {
    /// The extension field
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Empty instance of the extension's message type, for message extensions
    pub fn default_instance(&self) -> Option<&DynamicMessage> {
        self.default_instance.as_ref()
    }
}

#[derive(Default, Clone)]
struct RegistryInner {
    // extendee full name -> number -> extension
    by_extendee: HashMap<String, HashMap<u32, ExtensionInfo>>,
    by_name: HashMap<String, (String, u32)>,
    len: usize,
}

/// Lookup table of known extensions.
///
/// Cloning is cheap: clones share storage until one of them is modified.
/// A *lite* registry only answers lookups by number; a registry returned
/// by [`unmodifiable`](Self::unmodifiable) rejects further additions.
#[derive(Clone)]
pub struct ExtensionRegistry {
    inner: Arc<RegistryInner>,
    lite: bool,
    frozen: bool,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    /// Creates an empty registry with name lookup
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner::default()),
            lite: false,
            frozen: false,
        }
    }

    /// Creates an empty registry that only supports lookup by number
    pub fn lite() -> Self {
        Self {
            lite: true,
            ..Self::new()
        }
    }

    /// An empty, unmodifiable registry
    pub fn empty() -> Self {
        Self {
            frozen: true,
            ..Self::new()
        }
    }

    /// Creates a registry holding every extension in `pool`
    pub fn from_pool(pool: &DescriptorPool) -> Result<Self> {
        let mut registry = Self::new();
        for ext in pool.all_extensions() {
            registry.add(ext)?;
        }
        Ok(registry)
    }

    /// Registers an extension
    pub fn add(&mut self, descriptor: FieldDescriptor) -> Result<()> {
        if self.frozen {
            return Err(Error::UnmodifiableRegistry);
        }
        if !descriptor.is_extension() {
            return Err(Error::invalid_argument(format!(
                "'{}' is a regular field, not an extension",
                descriptor.full_name()
            )));
        }
        let extendee = descriptor.containing_message().full_name().to_string();
        let number = descriptor.number();
        let default_instance = descriptor
            .kind()
            .as_message()
            .map(|m| DynamicMessage::new(m.clone()));
        trace!(extension = descriptor.full_name(), "registering extension");

        let inner = Arc::make_mut(&mut self.inner);
        if !self.lite {
            inner
                .by_name
                .insert(descriptor.full_name().to_string(), (extendee.clone(), number));
        }
        let replaced = inner.by_extendee.entry(extendee).or_default().insert(
            number,
            ExtensionInfo {
                descriptor,
                default_instance,
            },
        );
        if replaced.is_none() {
            inner.len += 1;
        }
        Ok(())
    }

    /// Looks up the extension of `containing` numbered `number`
    pub fn find_by_number(
        &self,
        containing: &MessageDescriptor,
        number: u32,
    ) -> Option<&ExtensionInfo> {
        self.inner
            .by_extendee
            .get(containing.full_name())?
            .get(&number)
    }

    /// Looks up an extension by its fully-qualified name.
    ///
    /// Lite registries do not keep names and always return `None`.
    pub fn find_by_name(&self, full_name: &str) -> Option<&ExtensionInfo> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        let (extendee, number) = self.inner.by_name.get(full_name)?;
        self.inner.by_extendee.get(extendee)?.get(number)
    }

    /// A frozen snapshot of this registry
    pub fn unmodifiable(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            lite: self.lite,
            frozen: true,
        }
    }

    /// True if [`add`](Self::add) will fail
    pub fn is_unmodifiable(&self) -> bool {
        self.frozen
    }

    /// True for registries without name lookup
    pub fn is_lite(&self) -> bool {
        self.lite
    }

    /// Number of registered extensions
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// True if every extension `other` knows is also known here.
    ///
    /// Bytes captured under `other` then parse the same way under `self`.
    pub fn is_superset_of(&self, other: &ExtensionRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || other.inner.by_extendee.iter().all(|(extendee, theirs)| {
                let ours = self.inner.by_extendee.get(extendee);
                theirs
                    .keys()
                    .all(|number| ours.is_some_and(|ours| ours.contains_key(number)))
            })
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.len())
            .field("lite", &self.lite)
            .field("unmodifiable", &self.frozen)
            .finish()
    }
}
