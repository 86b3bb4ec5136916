//! Schema fixture shared by the integration tests.

#![allow(dead_code)]

use once_cell::sync::Lazy;
use polje::descriptor::{EnumDef, FieldDef, FieldType, MessageDef};
use polje::{
    DescriptorPool, DynamicMessage, ExtensionRegistry, FieldDescriptor, MessageDescriptor,
    Syntax, Value,
};

const MAX_EXTENSION: u32 = polje::MAX_FIELD_NUMBER + 1;

pub const MESSAGE_SET_EXTENSION1: u32 = 1_545_008;
pub const MESSAGE_SET_EXTENSION2: u32 = 1_547_769;

pub static POOL: Lazy<DescriptorPool> = Lazy::new(|| build().expect("fixture schema is valid"));

fn t(name: &str) -> String {
    format!("unittest.{name}")
}

fn build() -> polje::Result<DescriptorPool> {
    DescriptorPool::builder()
        .enumeration(
            EnumDef::new(t("NestedEnum"))
                .value("FOO", 1)
                .value("BAR", 2)
                .value("BAZ", 3)
                .value("NEG", -1),
        )
        .enumeration(
            EnumDef::new("proto3_unittest.NestedEnum")
                .syntax(Syntax::Proto3)
                .value("ZERO", 0)
                .value("FOO", 1)
                .value("BAR", 2)
                .value("BAZ", 3),
        )
        .message(MessageDef::new(t("NestedMessage")).field(FieldDef::optional(
            "bb",
            1,
            FieldType::Int32,
        )))
        .message(
            MessageDef::new(t("TestAllTypes.OptionalGroup"))
                .field(FieldDef::optional("a", 17, FieldType::Int32)),
        )
        .message(
            MessageDef::new(t("TestAllTypes"))
                .field(FieldDef::optional("optional_int32", 1, FieldType::Int32))
                .field(FieldDef::optional("optional_int64", 2, FieldType::Int64))
                .field(FieldDef::optional("optional_uint32", 3, FieldType::Uint32))
                .field(FieldDef::optional("optional_uint64", 4, FieldType::Uint64))
                .field(FieldDef::optional("optional_sint32", 5, FieldType::Sint32))
                .field(FieldDef::optional("optional_sint64", 6, FieldType::Sint64))
                .field(FieldDef::optional("optional_fixed32", 7, FieldType::Fixed32))
                .field(FieldDef::optional("optional_fixed64", 8, FieldType::Fixed64))
                .field(FieldDef::optional("optional_sfixed32", 9, FieldType::Sfixed32))
                .field(FieldDef::optional("optional_sfixed64", 10, FieldType::Sfixed64))
                .field(FieldDef::optional("optional_float", 11, FieldType::Float))
                .field(FieldDef::optional("optional_double", 12, FieldType::Double))
                .field(FieldDef::optional("optional_bool", 13, FieldType::Bool))
                .field(FieldDef::optional("optional_string", 14, FieldType::String))
                .field(FieldDef::optional("optional_bytes", 15, FieldType::Bytes))
                .field(FieldDef::optional(
                    "optionalgroup",
                    16,
                    FieldType::Group(t("TestAllTypes.OptionalGroup")),
                ))
                .field(FieldDef::optional(
                    "optional_nested_message",
                    18,
                    FieldType::Message(t("NestedMessage")),
                ))
                .field(FieldDef::optional(
                    "optional_nested_enum",
                    21,
                    FieldType::Enum(t("NestedEnum")),
                ))
                .field(
                    FieldDef::optional(
                        "optional_lazy_message",
                        27,
                        FieldType::Message(t("NestedMessage")),
                    )
                    .lazy(),
                )
                .field(FieldDef::repeated("repeated_int32", 31, FieldType::Int32))
                .field(FieldDef::repeated("repeated_string", 44, FieldType::String))
                .field(FieldDef::repeated(
                    "repeated_nested_message",
                    48,
                    FieldType::Message(t("NestedMessage")),
                ))
                .field(FieldDef::repeated(
                    "repeated_nested_enum",
                    51,
                    FieldType::Enum(t("NestedEnum")),
                ))
                .field(FieldDef::optional("oneof_uint32", 111, FieldType::Uint32).oneof("oneof_field"))
                .field(
                    FieldDef::optional(
                        "oneof_nested_message",
                        112,
                        FieldType::Message(t("NestedMessage")),
                    )
                    .oneof("oneof_field"),
                )
                .field(FieldDef::optional("oneof_string", 113, FieldType::String).oneof("oneof_field"))
                .map_field("map_string_int32", 200, FieldType::String, FieldType::Int32),
        )
        // Knows two of TestAllTypes' fields; everything else stays unknown
        .message(
            MessageDef::new(t("TestPartialTypes"))
                .field(FieldDef::optional("optional_int32", 1, FieldType::Int32))
                .field(FieldDef::optional("optional_string", 14, FieldType::String)),
        )
        .message(MessageDef::new(t("TestEmptyMessage")))
        .message(
            MessageDef::new(t("TestPackedTypes"))
                .field(FieldDef::repeated("packed_int32", 90, FieldType::Int32).packed(true))
                .field(FieldDef::repeated("packed_sint64", 96, FieldType::Sint64).packed(true))
                .field(FieldDef::repeated("packed_double", 102, FieldType::Double).packed(true))
                .field(
                    FieldDef::repeated("packed_enum", 103, FieldType::Enum(t("NestedEnum")))
                        .packed(true),
                ),
        )
        .message(
            MessageDef::new(t("TestUnpackedTypes"))
                .field(FieldDef::repeated("unpacked_int32", 90, FieldType::Int32).packed(false))
                .field(FieldDef::repeated("unpacked_sint64", 96, FieldType::Sint64).packed(false))
                .field(FieldDef::repeated("unpacked_double", 102, FieldType::Double).packed(false))
                .field(
                    FieldDef::repeated("unpacked_enum", 103, FieldType::Enum(t("NestedEnum")))
                        .packed(false),
                ),
        )
        .message(
            MessageDef::new(t("TestRequired"))
                .field(FieldDef::required("a", 1, FieldType::Int32))
                .field(FieldDef::optional("dummy2", 2, FieldType::Int32))
                .field(FieldDef::required("b", 3, FieldType::Int32))
                .field(FieldDef::required("c", 33, FieldType::Int32)),
        )
        .message(
            MessageDef::new(t("TestRequiredForeign"))
                .field(FieldDef::optional(
                    "optional_message",
                    1,
                    FieldType::Message(t("TestRequired")),
                ))
                .field(FieldDef::repeated(
                    "repeated_message",
                    2,
                    FieldType::Message(t("TestRequired")),
                ))
                .field(FieldDef::optional("dummy", 3, FieldType::Int32)),
        )
        .message(
            MessageDef::new(t("TestRecursive"))
                .field(FieldDef::optional("a", 1, FieldType::Message(t("TestRecursive"))))
                .field(FieldDef::optional("i", 2, FieldType::Int32)),
        )
        .message(MessageDef::new(t("TestAllExtensions")).extension_range(1..MAX_EXTENSION))
        .extension(
            "unittest",
            FieldDef::optional("optional_int32_extension", 1, FieldType::Int32)
                .extendee(t("TestAllExtensions")),
        )
        .extension(
            "unittest",
            FieldDef::optional("optional_string_extension", 14, FieldType::String)
                .extendee(t("TestAllExtensions")),
        )
        .extension(
            "unittest",
            FieldDef::optional(
                "optional_nested_message_extension",
                18,
                FieldType::Message(t("NestedMessage")),
            )
            .extendee(t("TestAllExtensions")),
        )
        .extension(
            "unittest",
            FieldDef::repeated("repeated_int32_extension", 31, FieldType::Int32)
                .extendee(t("TestAllExtensions")),
        )
        .extension(
            t("TestRequired"),
            FieldDef::optional("single", 1000, FieldType::Message(t("TestRequired")))
                .extendee(t("TestAllExtensions")),
        )
        .message(
            MessageDef::new(t("TestMessageSet"))
                .message_set_wire_format()
                .extension_range(4..MAX_EXTENSION),
        )
        .message(
            MessageDef::new(t("TestMessageSetContainer")).field(FieldDef::optional(
                "message_set",
                1,
                FieldType::Message(t("TestMessageSet")),
            )),
        )
        .message(
            MessageDef::new(t("TestMessageSetExtension1"))
                .field(FieldDef::optional("i", 15, FieldType::Int32)),
        )
        .message(
            MessageDef::new(t("TestMessageSetExtension2"))
                .field(FieldDef::optional("str", 25, FieldType::String)),
        )
        .extension(
            t("TestMessageSetExtension1"),
            FieldDef::optional(
                "message_set_extension",
                MESSAGE_SET_EXTENSION1,
                FieldType::Message(t("TestMessageSetExtension1")),
            )
            .extendee(t("TestMessageSet")),
        )
        .extension(
            t("TestMessageSetExtension2"),
            FieldDef::optional(
                "message_set_extension",
                MESSAGE_SET_EXTENSION2,
                FieldType::Message(t("TestMessageSetExtension2")),
            )
            .extendee(t("TestMessageSet")),
        )
        .message(
            MessageDef::new("proto3_unittest.TestAllTypes")
                .syntax(Syntax::Proto3)
                .field(FieldDef::optional("optional_int32", 1, FieldType::Int32))
                .field(FieldDef::optional("optional_float", 11, FieldType::Float))
                .field(FieldDef::optional("optional_double", 12, FieldType::Double))
                .field(FieldDef::optional("optional_string", 14, FieldType::String))
                .field(FieldDef::optional(
                    "optional_nested_enum",
                    21,
                    FieldType::Enum("proto3_unittest.NestedEnum".into()),
                ))
                .field(FieldDef::repeated("repeated_int32", 31, FieldType::Int32))
                .field(FieldDef::repeated(
                    "repeated_nested_enum",
                    51,
                    FieldType::Enum("proto3_unittest.NestedEnum".into()),
                )),
        )
        .build()
}

/// A message type of the fixture, by name relative to `unittest`
pub fn message(name: &str) -> MessageDescriptor {
    POOL.get_message_by_name(&t(name))
        .or_else(|| POOL.get_message_by_name(name))
        .unwrap_or_else(|| panic!("no message {name}"))
}

pub fn field(desc: &MessageDescriptor, name: &str) -> FieldDescriptor {
    desc.get_field_by_name(name)
        .unwrap_or_else(|| panic!("{} has no field {name}", desc.full_name()))
}

/// An extension of the fixture, by full name
pub fn extension(full_name: &str) -> FieldDescriptor {
    POOL.get_extension_by_name(full_name)
        .unwrap_or_else(|| panic!("no extension {full_name}"))
}

/// Registry with every fixture extension
pub fn registry() -> ExtensionRegistry {
    ExtensionRegistry::from_pool(&POOL).expect("fixture extensions register")
}

pub fn nested(bb: i32) -> Value {
    let desc = message("NestedMessage");
    let mut msg = DynamicMessage::new(desc.clone());
    msg.set_field(&field(&desc, "bb"), Value::I32(bb)).unwrap();
    Value::Message(msg)
}

/// TestAllTypes with every field set to a distinct value
pub fn all_types() -> DynamicMessage {
    let desc = message("TestAllTypes");
    let mut msg = DynamicMessage::new(desc.clone());
    let mut set = |name: &str, value: Value| msg.set_field(&field(&desc, name), value).unwrap();

    set("optional_int32", Value::I32(101));
    set("optional_int64", Value::I64(102));
    set("optional_uint32", Value::U32(103));
    set("optional_uint64", Value::U64(104));
    set("optional_sint32", Value::I32(-105));
    set("optional_sint64", Value::I64(-106));
    set("optional_fixed32", Value::U32(107));
    set("optional_fixed64", Value::U64(108));
    set("optional_sfixed32", Value::I32(-109));
    set("optional_sfixed64", Value::I64(-110));
    set("optional_float", Value::F32(111.5));
    set("optional_double", Value::F64(112.5));
    set("optional_bool", Value::Bool(true));
    set("optional_string", Value::from("115"));
    set("optional_bytes", Value::from(b"116".to_vec()));

    let group_desc = message("TestAllTypes.OptionalGroup");
    let mut group = DynamicMessage::new(group_desc.clone());
    group
        .set_field(&field(&group_desc, "a"), Value::I32(117))
        .unwrap();
    set("optionalgroup", Value::Message(group));

    set("optional_nested_message", nested(118));
    set("optional_nested_enum", Value::EnumNumber(3));
    set("optional_lazy_message", nested(127));
    set("repeated_int32", Value::List(vec![Value::I32(201), Value::I32(301)]));
    set(
        "repeated_string",
        Value::List(vec![Value::from("215"), Value::from("315")]),
    );
    set(
        "repeated_nested_message",
        Value::List(vec![nested(218), nested(318)]),
    );
    set(
        "repeated_nested_enum",
        Value::List(vec![Value::EnumNumber(2), Value::EnumNumber(-1)]),
    );
    set("oneof_string", Value::from("603"));
    drop(set);

    let map = field(&desc, "map_string_int32");
    let entry_desc = map.kind().as_message().unwrap().clone();
    let mut entry = DynamicMessage::new(entry_desc.clone());
    entry
        .set_field(&field(&entry_desc, "key"), Value::from("k"))
        .unwrap();
    entry
        .set_field(&field(&entry_desc, "value"), Value::I32(7))
        .unwrap();
    msg.add_repeated(&map, Value::Message(entry)).unwrap();
    msg
}

/// A TestRequired with the given fields set
pub fn required(a: Option<i32>, b: Option<i32>, c: Option<i32>) -> DynamicMessage {
    let desc = message("TestRequired");
    let mut msg = DynamicMessage::new(desc.clone());
    for (name, value) in [("a", a), ("b", b), ("c", c)] {
        if let Some(value) = value {
            msg.set_field(&field(&desc, name), Value::I32(value)).unwrap();
        }
    }
    msg
}
