//! Field storage shared by every dynamic message.
//!
//! A [`FieldSet`] maps field numbers to values, covering regular fields and
//! extensions alike, and owns the message's [`UnknownFieldSet`]. Entries
//! are kept in ascending number order so encoding is deterministic.
//!
//! The algorithms that walk a field set generically live in submodules:
//! [`decode`], [`encode`], [`merge`] and [`init`], plus the MessageSet
//! item codec in [`message_set`].

pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod init;
pub(crate) mod merge;
pub(crate) mod message_set;

use crate::descriptor::FieldDescriptor;
use crate::lazy::LazyField;
use crate::message::DynamicMessage;
use crate::unknown::UnknownFieldSet;
use crate::value::Value;
use std::collections::BTreeMap;

/// Storage for one field's contents
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Value(Value),
    Lazy(LazyField),
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Slot::Value(a), Slot::Value(b)) => a == b,
            (Slot::Lazy(a), Slot::Lazy(b)) => a == b,
            (Slot::Value(Value::Message(m)), Slot::Lazy(l))
            | (Slot::Lazy(l), Slot::Value(Value::Message(m))) => m == l.get(),
            _ => false,
        }
    }
}

/// A stored field together with its descriptor
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) field: FieldDescriptor,
    pub(crate) slot: Slot,
}

impl Entry {
    /// True if the entry counts as set.
    ///
    /// Empty lists and implicit-presence zeros can sit in storage after a
    /// mutable borrow; they behave exactly like an absent field.
    pub(crate) fn is_present(&self) -> bool {
        match &self.slot {
            Slot::Lazy(_) => true,
            Slot::Value(Value::List(list)) => !list.is_empty(),
            Slot::Value(value) => self.field.supports_presence() || !value.is_zero(),
        }
    }
}

/// Fields of one message, keyed by number
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldSet {
    entries: BTreeMap<u32, Entry>,
    unknown: UnknownFieldSet,
}

impl FieldSet {
    pub(crate) fn get(&self, number: u32) -> Option<&Entry> {
        self.entries.get(&number).filter(|e| e.is_present())
    }

    pub(crate) fn get_mut(&mut self, number: u32) -> Option<&mut Entry> {
        self.entries.get_mut(&number)
    }

    /// Present entries in ascending number order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values().filter(|e| e.is_present())
    }

    pub(crate) fn unknown(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    pub(crate) fn unknown_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.unknown
    }

    /// Stores `slot` for `field`, evicting any other member of its oneof
    pub(crate) fn insert(&mut self, field: &FieldDescriptor, slot: Slot) {
        self.clear_oneof_siblings(field);
        self.entries.insert(
            field.number(),
            Entry {
                field: field.clone(),
                slot,
            },
        );
    }

    pub(crate) fn remove(&mut self, number: u32) -> Option<Entry> {
        self.entries.remove(&number)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.unknown.clear();
    }

    fn clear_oneof_siblings(&mut self, field: &FieldDescriptor) {
        if let Some(oneof) = field.containing_oneof() {
            for sibling in oneof.fields() {
                if sibling.number() != field.number() {
                    self.entries.remove(&sibling.number());
                }
            }
        }
    }

    /// The message stored for a singular message field, inserting an empty
    /// one first if needed.
    ///
    /// A lazy slot is parsed and replaced by its value.
    pub(crate) fn message_mut(&mut self, field: &FieldDescriptor) -> &mut DynamicMessage {
        let number = field.number();
        let needs_insert = !matches!(
            self.entries.get(&number),
            Some(Entry {
                slot: Slot::Value(Value::Message(_)) | Slot::Lazy(_),
                ..
            })
        );
        if needs_insert {
            let Some(message_type) = field.kind().as_message().cloned() else {
                unreachable!("{} is not a message field", field.full_name())
            };
            self.insert(field, Slot::Value(Value::Message(DynamicMessage::new(message_type))));
        }
        let entry = self
            .entries
            .get_mut(&number)
            .unwrap_or_else(|| unreachable!("entry inserted above"));
        if matches!(entry.slot, Slot::Lazy(_)) {
            let placeholder = Slot::Value(Value::Bool(false));
            if let Slot::Lazy(lazy) = std::mem::replace(&mut entry.slot, placeholder) {
                entry.slot = Slot::Value(Value::Message(lazy.into_value()));
            }
        }
        match &mut entry.slot {
            Slot::Value(Value::Message(m)) => m,
            _ => unreachable!("slot holds a message"),
        }
    }

    /// The list stored for a repeated field, inserting an empty one first
    /// if needed
    pub(crate) fn list_mut(&mut self, field: &FieldDescriptor) -> &mut Vec<Value> {
        let number = field.number();
        let entry = self.entries.entry(number).or_insert_with(|| Entry {
            field: field.clone(),
            slot: Slot::Value(Value::List(Vec::new())),
        });
        if !matches!(entry.slot, Slot::Value(Value::List(_))) {
            entry.slot = Slot::Value(Value::List(Vec::new()));
        }
        match &mut entry.slot {
            Slot::Value(Value::List(list)) => list,
            _ => unreachable!("slot holds a list"),
        }
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        let mut ours = self.iter();
        let mut theirs = other.iter();
        loop {
            match (ours.next(), theirs.next()) {
                (None, None) => break,
                (Some(a), Some(b)) => {
                    if a.field.number() != b.field.number() || a.slot != b.slot {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        self.unknown == other.unknown
    }
}
