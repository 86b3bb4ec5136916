//! Storage for wire data the active schema does not recognize.
//!
//! An [`UnknownFieldSet`] keeps fields in the order their number was first
//! seen. Each [`UnknownField`] holds one sequence per wire encoding, so a
//! number that appeared as both a varint and a length-delimited value keeps
//! both. Re-encoding writes every value with its own tag, grouped by field
//! number, which makes a parse/encode pass through a program that only
//! knows part of the schema lossless.

use crate::error::{DecodeErrorKind, Error, Result};
use crate::field_set::message_set;
use crate::wire::{tag_len, varint_len, Tag, WireReader, WireType, WireWriter};
use bytes::{BufMut, Bytes};
use std::collections::HashMap;
use std::fmt;

/// All values seen for one unknown field number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownField {
    varint: Vec<u64>,
    fixed32: Vec<u32>,
    fixed64: Vec<u64>,
    length_delimited: Vec<Bytes>,
    group: Vec<UnknownFieldSet>,
}

static EMPTY_FIELD: UnknownField = UnknownField {
    varint: Vec::new(),
    fixed32: Vec::new(),
    fixed64: Vec::new(),
    length_delimited: Vec::new(),
    group: Vec::new(),
};

impl UnknownField {
    /// Creates a field with no values
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a varint value
    pub fn add_varint(mut self, value: u64) -> Self {
        self.varint.push(value);
        self
    }

    /// Appends a fixed32 value
    pub fn add_fixed32(mut self, value: u32) -> Self {
        self.fixed32.push(value);
        self
    }

    /// Appends a fixed64 value
    pub fn add_fixed64(mut self, value: u64) -> Self {
        self.fixed64.push(value);
        self
    }

    /// Appends a length-delimited value
    pub fn add_length_delimited(mut self, value: impl Into<Bytes>) -> Self {
        self.length_delimited.push(value.into());
        self
    }

    /// Appends a group
    pub fn add_group(mut self, value: UnknownFieldSet) -> Self {
        self.group.push(value);
        self
    }

    /// Varint values, in the order read
    pub fn varint(&self) -> &[u64] {
        &self.varint
    }

    /// Fixed32 values, in the order read
    pub fn fixed32(&self) -> &[u32] {
        &self.fixed32
    }

    /// Fixed64 values, in the order read
    pub fn fixed64(&self) -> &[u64] {
        &self.fixed64
    }

    /// Length-delimited values, in the order read
    pub fn length_delimited(&self) -> &[Bytes] {
        &self.length_delimited
    }

    /// Groups, in the order read
    pub fn group(&self) -> &[UnknownFieldSet] {
        &self.group
    }

    /// True if no value of any kind is stored
    pub fn is_empty(&self) -> bool {
        self.varint.is_empty()
            && self.fixed32.is_empty()
            && self.fixed64.is_empty()
            && self.length_delimited.is_empty()
            && self.group.is_empty()
    }

    /// Appends every value of `other` after this field's own
    pub fn merge(&mut self, other: &UnknownField) {
        self.varint.extend_from_slice(&other.varint);
        self.fixed32.extend_from_slice(&other.fixed32);
        self.fixed64.extend_from_slice(&other.fixed64);
        self.length_delimited
            .extend_from_slice(&other.length_delimited);
        self.group.extend_from_slice(&other.group);
    }

    /// Encoded size of all values under field `number`
    pub fn encoded_len(&self, number: u32) -> usize {
        let tag = tag_len(number);
        let varints: usize = self.varint.iter().map(|v| tag + varint_len(*v)).sum();
        let fixed = (tag + 4) * self.fixed32.len() + (tag + 8) * self.fixed64.len();
        let lens: usize = self
            .length_delimited
            .iter()
            .map(|b| tag + varint_len(b.len() as u64) + b.len())
            .sum();
        let groups: usize = self.group.iter().map(|g| 2 * tag + g.encoded_len()).sum();
        varints + fixed + lens + groups
    }

    pub(crate) fn encode_to<B: BufMut>(&self, number: u32, w: &mut WireWriter<'_, B>) {
        for v in &self.varint {
            w.write_tag(number, WireType::Varint);
            w.write_varint(*v);
        }
        for v in &self.fixed32 {
            w.write_tag(number, WireType::I32);
            w.write_fixed32(*v);
        }
        for v in &self.fixed64 {
            w.write_tag(number, WireType::I64);
            w.write_fixed64(*v);
        }
        for v in &self.length_delimited {
            w.write_tag(number, WireType::Len);
            w.write_bytes(v);
        }
        for g in &self.group {
            w.write_tag(number, WireType::StartGroup);
            g.encode_to(w);
            w.write_tag(number, WireType::EndGroup);
        }
    }

    /// Size when the length-delimited values are written as MessageSet
    /// items with type id `number`
    fn message_set_len(&self, number: u32) -> usize {
        let items: usize = self
            .length_delimited
            .iter()
            .map(|b| message_set::item_len(number, b.len()))
            .sum();
        let rest = UnknownField {
            length_delimited: Vec::new(),
            ..self.clone()
        };
        items + rest.encoded_len(number)
    }

    fn encode_message_set_to<B: BufMut>(&self, number: u32, w: &mut WireWriter<'_, B>) {
        for v in &self.length_delimited {
            message_set::write_item(w, number, v);
        }
        let rest = UnknownField {
            length_delimited: Vec::new(),
            ..self.clone()
        };
        rest.encode_to(number, w);
    }
}

/// Ordered collection of unknown fields
#[derive(Clone, Default)]
pub struct UnknownFieldSet {
    fields: Vec<(u32, UnknownField)>,
    // number -> position in `fields`
    index: HashMap<u32, usize>,
}

impl UnknownFieldSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole buffer as unknown fields
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let mut set = Self::new();
        set.merge_from_bytes(data)?;
        Ok(set)
    }

    /// Parses `data` and appends every field it holds
    pub fn merge_from_bytes(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let mut r = WireReader::new(data);
        while !r.is_at_end() {
            let tag = r.read_tag()?;
            self.merge_field_from(tag, &mut r)?;
        }
        Ok(())
    }

    /// Number of distinct field numbers
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the set holds no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if any value is stored under `number`
    pub fn has_field(&self, number: u32) -> bool {
        self.position(number).is_some()
    }

    /// The values stored under `number`; an empty field if there are none
    pub fn get_field(&self, number: u32) -> &UnknownField {
        match self.position(number) {
            Some(i) => &self.fields[i].1,
            None => &EMPTY_FIELD,
        }
    }

    /// Iterates `(number, field)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields.iter().map(|(n, f)| (*n, f))
    }

    fn position(&self, number: u32) -> Option<usize> {
        self.index.get(&number).copied()
    }

    fn entry(&mut self, number: u32) -> &mut UnknownField {
        let next = self.fields.len();
        let i = *self.index.entry(number).or_insert(next);
        if i == next {
            self.fields.push((number, UnknownField::new()));
        }
        &mut self.fields[i].1
    }

    /// Stores `field` under `number`, replacing whatever was there.
    ///
    /// A replaced field keeps its position; adding an empty field removes
    /// the number.
    pub fn add_field(&mut self, number: u32, field: UnknownField) {
        if field.is_empty() {
            self.clear_field(number);
            return;
        }
        *self.entry(number) = field;
    }

    /// Appends the values of `field` after those already under `number`
    pub fn merge_field(&mut self, number: u32, field: &UnknownField) {
        if field.is_empty() {
            return;
        }
        self.entry(number).merge(field);
    }

    /// Appends a varint under `number`
    pub fn add_varint(&mut self, number: u32, value: u64) {
        self.entry(number).varint.push(value);
    }

    /// Appends a fixed32 under `number`
    pub fn add_fixed32(&mut self, number: u32, value: u32) {
        self.entry(number).fixed32.push(value);
    }

    /// Appends a fixed64 under `number`
    pub fn add_fixed64(&mut self, number: u32, value: u64) {
        self.entry(number).fixed64.push(value);
    }

    /// Appends a length-delimited value under `number`
    pub fn add_length_delimited(&mut self, number: u32, value: impl Into<Bytes>) {
        self.entry(number).length_delimited.push(value.into());
    }

    /// Appends a group under `number`
    pub fn add_group(&mut self, number: u32, value: UnknownFieldSet) {
        self.entry(number).group.push(value);
    }

    /// Removes every value stored under `number`
    pub fn clear_field(&mut self, number: u32) {
        let Some(removed) = self.index.remove(&number) else {
            return;
        };
        self.fields.remove(removed);
        for (i, (n, _)) in self.fields.iter().enumerate().skip(removed) {
            self.index.insert(*n, i);
        }
    }

    /// Removes all fields
    pub fn clear(&mut self) {
        self.fields.clear();
        self.index.clear();
    }

    /// Appends every field of `other`, field by field
    pub fn merge(&mut self, other: &UnknownFieldSet) {
        for (number, field) in other.iter() {
            self.merge_field(number, field);
        }
    }

    /// Reads the value following `tag` and stores it.
    ///
    /// Groups are read recursively into nested sets; a bare END_GROUP is
    /// left for the caller, which knows whether a group is open.
    pub(crate) fn merge_field_from(&mut self, tag: Tag, r: &mut WireReader) -> Result<()> {
        match tag.wire_type {
            WireType::Varint => {
                let v = r.read_varint()?;
                self.add_varint(tag.number, v);
            }
            WireType::I64 => {
                let v = r.read_fixed64()?;
                self.add_fixed64(tag.number, v);
            }
            WireType::Len => {
                let v = r.read_bytes()?;
                self.add_length_delimited(tag.number, v);
            }
            WireType::I32 => {
                let v = r.read_fixed32()?;
                self.add_fixed32(tag.number, v);
            }
            WireType::StartGroup => {
                let group = Self::read_group(tag.number, r)?;
                self.add_group(tag.number, group);
            }
            WireType::EndGroup => {
                return Err(Error::decode(
                    DecodeErrorKind::UnexpectedEndGroup(tag.number),
                    r.position(),
                ));
            }
        }
        Ok(())
    }

    fn read_group(number: u32, r: &mut WireReader) -> Result<UnknownFieldSet> {
        r.enter_nested()?;
        let mut group = UnknownFieldSet::new();
        loop {
            if r.is_at_end() {
                return Err(Error::decode(
                    DecodeErrorKind::TruncatedMessage,
                    r.position(),
                ));
            }
            let tag = r.read_tag()?;
            if tag.wire_type == WireType::EndGroup {
                r.check_end_group(number, tag)?;
                break;
            }
            group.merge_field_from(tag, r)?;
        }
        r.exit_nested();
        Ok(group)
    }

    /// Encoded size of the whole set
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|(n, f)| f.encoded_len(*n)).sum()
    }

    /// Writes the whole set
    pub fn encode(&self, buf: &mut impl BufMut) {
        self.encode_to(&mut WireWriter::new(buf));
    }

    /// Writes the whole set into a new vector
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    pub(crate) fn encode_to<B: BufMut>(&self, w: &mut WireWriter<'_, B>) {
        for (number, field) in &self.fields {
            field.encode_to(*number, w);
        }
    }

    /// Encoded size when written in MessageSet form
    pub(crate) fn message_set_len(&self) -> usize {
        self.fields.iter().map(|(n, f)| f.message_set_len(*n)).sum()
    }

    /// Writes the set in MessageSet form: each length-delimited value
    /// becomes an item whose type id is its field number
    pub(crate) fn encode_message_set_to<B: BufMut>(&self, w: &mut WireWriter<'_, B>) {
        for (number, field) in &self.fields {
            field.encode_message_set_to(*number, w);
        }
    }
}

impl PartialEq for UnknownFieldSet {
    /// Two sets are equal when they hold the same values per field number,
    /// whatever order the numbers were first seen in.
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(n, f)| other.position(*n).is_some_and(|i| &other.fields[i].1 == f))
    }
}

impl fmt::Debug for UnknownFieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(n, field)| (n, field)))
            .finish()
    }
}
