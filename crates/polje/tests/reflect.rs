//! Interop with schemas and messages from prost-reflect.

use prost::Message;
use prost_reflect::{DescriptorPool as ReflectPool, DynamicMessage as ReflectMessage};
use prost_types::{
    field_descriptor_proto::{Label, Type},
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
};
use polje::{DescriptorPool, DynamicMessage, Value};
use pretty_assertions::assert_eq;

fn field(name: &str, number: i32, label: Label, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn file_set() -> FileDescriptorSet {
    let mut child = field("child", 4, Label::Optional, Type::Message);
    child.type_name = Some(".interop.Order".to_string());
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("interop.proto".to_string()),
            package: Some("interop".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Order".to_string()),
                field: vec![
                    field("id", 1, Label::Optional, Type::Uint64),
                    field("item", 2, Label::Optional, Type::String),
                    field("quantities", 3, Label::Repeated, Type::Sint32),
                    child,
                ],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

#[test]
fn test_reads_what_prost_reflect_writes() {
    let reflect_pool = ReflectPool::from_file_descriptor_set(file_set()).unwrap();
    let reflect_desc = reflect_pool.get_message_by_name("interop.Order").unwrap();
    let mut theirs = ReflectMessage::new(reflect_desc.clone());
    theirs.set_field_by_name("id", prost_reflect::Value::U64(7));
    theirs.set_field_by_name("item", prost_reflect::Value::String("bolt".into()));
    theirs.set_field_by_name(
        "quantities",
        prost_reflect::Value::List(vec![
            prost_reflect::Value::I32(-1),
            prost_reflect::Value::I32(40),
        ]),
    );
    let mut child = ReflectMessage::new(reflect_desc);
    child.set_field_by_name("id", prost_reflect::Value::U64(8));
    theirs.set_field_by_name("child", prost_reflect::Value::Message(child));
    let bytes = theirs.encode_to_vec();

    let pool = DescriptorPool::from_reflect(&reflect_pool).unwrap();
    let desc = pool.get_message_by_name("interop.Order").unwrap();
    let ours = DynamicMessage::parse(desc.clone(), bytes.clone()).unwrap();

    assert_eq!(ours.get_field_by_name("id").as_deref(), Some(&Value::U64(7)));
    assert_eq!(
        ours.get_field_by_name("item").as_deref(),
        Some(&Value::from("bolt"))
    );
    assert_eq!(
        ours.get_field_by_name("quantities").as_deref(),
        Some(&Value::List(vec![Value::I32(-1), Value::I32(40)]))
    );
    let child = ours
        .get_message(&desc.get_field_by_name("child").unwrap())
        .unwrap();
    assert_eq!(child.get_field_by_name("id").as_deref(), Some(&Value::U64(8)));
    assert_eq!(ours.encode_to_vec(), bytes);
}

#[test]
fn test_prost_reflect_reads_what_we_write() {
    let bytes = file_set().encode_to_vec();
    let pool = DescriptorPool::decode(&bytes).unwrap();
    let desc = pool.get_message_by_name("interop.Order").unwrap();

    let mut ours = DynamicMessage::new(desc);
    ours.set_field_by_name("id", Value::U64(u64::MAX)).unwrap();
    ours.set_field_by_name("quantities", Value::List(vec![Value::I32(i32::MIN)]))
        .unwrap();

    let reflect_pool = ReflectPool::decode(bytes.as_slice()).unwrap();
    let reflect_desc = reflect_pool.get_message_by_name("interop.Order").unwrap();
    let theirs = ReflectMessage::decode(reflect_desc, ours.encode_to_vec().as_slice()).unwrap();

    assert_eq!(
        theirs.get_field_by_name("id").unwrap().as_u64(),
        Some(u64::MAX)
    );
    assert_eq!(
        theirs
            .get_field_by_name("quantities")
            .unwrap()
            .as_list()
            .map(|l| l.to_vec()),
        Some(vec![prost_reflect::Value::I32(i32::MIN)])
    );
}
