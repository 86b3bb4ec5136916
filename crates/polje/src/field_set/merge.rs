//! Field-by-field message merge.

use super::{decode, Slot};
use crate::message::DynamicMessage;
use crate::value::Value;

/// Merges every present field of `src` into `dest`.
///
/// Singular scalars overwrite, singular messages merge recursively,
/// repeated fields (maps included) append `src`'s elements after `dest`'s,
/// and a oneof member from `src` evicts whatever member `dest` had set.
/// Unknown fields are appended. Fields `src` does not have are left alone,
/// so merging an empty message changes nothing.
pub(crate) fn merge(dest: &mut DynamicMessage, src: &DynamicMessage) {
    for entry in src.field_set().iter() {
        let field = &entry.field;
        let fields = dest.field_set_mut();
        match &entry.slot {
            Slot::Lazy(lazy) => decode::merge_lazy(fields, field, lazy.clone()),
            Slot::Value(Value::List(list)) => fields.list_mut(field).extend(list.iter().cloned()),
            Slot::Value(Value::Message(message)) => {
                fields.message_mut(field).merge_unchecked(message);
            }
            Slot::Value(value) => fields.insert(field, Slot::Value(value.clone())),
        }
    }
    dest.field_set_mut()
        .unknown_mut()
        .merge(src.field_set().unknown());
}
