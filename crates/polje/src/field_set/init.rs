//! Required-field checking.

use super::Slot;
use crate::message::DynamicMessage;
use crate::value::Value;

/// Appends the path of every missing required field under `msg`.
///
/// Direct misses come first, in declaration order, then the misses inside
/// each present message field in field number order. Paths are dotted,
/// repeated elements carry their index (`outer.inner[1].a`) and extensions
/// are written as `(full.name)`.
pub(crate) fn find_missing(msg: &DynamicMessage, prefix: &str, out: &mut Vec<String>) {
    let fields = msg.field_set();
    for field in msg.descriptor().fields() {
        if field.is_required() && fields.get(field.number()).is_none() {
            out.push(format!("{prefix}{}", field.name()));
        }
    }

    for entry in fields.iter() {
        let field = &entry.field;
        if !field.kind().is_message() {
            continue;
        }
        let name = if field.is_extension() {
            format!("({})", field.full_name())
        } else {
            field.name().to_string()
        };
        match &entry.slot {
            Slot::Lazy(lazy) => find_missing(lazy.get(), &format!("{prefix}{name}."), out),
            Slot::Value(Value::Message(message)) => {
                find_missing(message, &format!("{prefix}{name}."), out);
            }
            Slot::Value(Value::List(list)) => {
                for (index, element) in list.iter().enumerate() {
                    if let Value::Message(message) = element {
                        find_missing(message, &format!("{prefix}{name}[{index}]."), out);
                    }
                }
            }
            Slot::Value(_) => {}
        }
    }
}
