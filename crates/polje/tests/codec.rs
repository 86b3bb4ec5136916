//! Wire round trips, unknown field preservation and encoding edge cases.

mod common;

use common::{all_types, field, message, nested};
use polje::{DecodeErrorKind, DynamicMessage, EnumValue, ParseOptions, UnknownFieldSet, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::{Duration, Instant};

#[test]
fn test_round_trip_all_types() {
    let msg = all_types();
    let bytes = msg.encode_to_vec();
    assert_eq!(bytes.len(), msg.encoded_len());
    assert_eq!(bytes, msg.encode_to_vec(), "encoding is deterministic");

    let parsed = DynamicMessage::parse(message("TestAllTypes"), bytes.clone()).unwrap();
    assert_eq!(parsed, msg);
    assert_eq!(parsed.encode_to_vec(), bytes);
    assert!(parsed.unknown_fields().is_empty());
}

#[test]
fn test_scalar_encodings() {
    let desc = message("TestAllTypes");
    let mut msg = DynamicMessage::new(desc.clone());
    msg.set_field(&field(&desc, "optional_int32"), Value::I32(-1))
        .unwrap();
    msg.set_field(&field(&desc, "optional_sint32"), Value::I32(-1))
        .unwrap();
    msg.set_field(&field(&desc, "optional_fixed32"), Value::U32(1))
        .unwrap();
    assert_eq!(
        msg.encode_to_vec(),
        vec![
            0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, // int32 -1
            0x28, 0x01, // sint32 -1
            0x3D, 0x01, 0x00, 0x00, 0x00, // fixed32 1
        ]
    );
}

#[test]
fn test_unknown_fields_survive_a_subset_schema() {
    let original = all_types();
    let bytes = original.encode_to_vec();

    let partial = DynamicMessage::parse(message("TestPartialTypes"), bytes).unwrap();
    assert_eq!(
        partial.get_field_by_name("optional_int32").as_deref(),
        Some(&Value::I32(101))
    );
    assert!(partial.unknown_fields().has_field(2));
    assert!(!partial.unknown_fields().has_field(1));

    let back = DynamicMessage::parse(message("TestAllTypes"), partial.encode_to_vec()).unwrap();
    assert_eq!(back, original);
}

#[test]
fn test_empty_schema_reencodes_identically() {
    let bytes = all_types().encode_to_vec();
    let empty = DynamicMessage::parse(message("TestEmptyMessage"), bytes.clone()).unwrap();
    assert_eq!(empty.fields().count(), 0);
    assert_eq!(empty.encode_to_vec(), bytes);

    let group = empty.unknown_fields().get_field(16).group();
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].get_field(17).varint(), &[117]);
}

#[test]
fn test_many_distinct_unknown_numbers_parse_quickly() {
    let count = 100_000u32;
    let mut bytes = Vec::new();
    for number in 1..=count {
        let mut key = u64::from(number) << 3;
        while key >= 0x80 {
            bytes.push((key as u8 & 0x7F) | 0x80);
            key >>= 7;
        }
        bytes.push(key as u8);
        bytes.push(0x01);
    }

    let started = Instant::now();
    let unknown = UnknownFieldSet::parse(bytes.clone()).unwrap();
    let msg = DynamicMessage::parse(message("TestEmptyMessage"), bytes.clone()).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(unknown.len(), count as usize);
    assert_eq!(msg.unknown_fields(), &unknown);
    assert_eq!(msg.encode_to_vec(), bytes);
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
}

#[test]
fn test_wire_type_mismatch_goes_to_unknown() {
    // optional_int32 = 1 sent as fixed32
    let bytes = vec![0x0D, 0x01, 0x00, 0x00, 0x00];
    let msg = DynamicMessage::parse(message("TestAllTypes"), bytes.clone()).unwrap();
    assert!(!msg.has_field(&field(&message("TestAllTypes"), "optional_int32")));
    assert_eq!(msg.unknown_fields().get_field(1).fixed32(), &[1]);
    assert_eq!(msg.encode_to_vec(), bytes);
}

#[test]
fn test_packed_and_unpacked_interchange() {
    let packed_desc = message("TestPackedTypes");
    let mut packed = DynamicMessage::new(packed_desc.clone());
    let ints = Value::List(vec![Value::I32(1), Value::I32(-2), Value::I32(300)]);
    let sints = Value::List(vec![Value::I64(-1), Value::I64(5)]);
    let doubles = Value::List(vec![Value::F64(1.5), Value::F64(-0.0)]);
    let enums = Value::List(vec![Value::EnumNumber(1), Value::EnumNumber(3)]);
    packed
        .set_field(&field(&packed_desc, "packed_int32"), ints.clone())
        .unwrap();
    packed
        .set_field(&field(&packed_desc, "packed_sint64"), sints.clone())
        .unwrap();
    packed
        .set_field(&field(&packed_desc, "packed_double"), doubles.clone())
        .unwrap();
    packed
        .set_field(&field(&packed_desc, "packed_enum"), enums.clone())
        .unwrap();

    let packed_bytes = packed.encode_to_vec();
    // field 90, LEN, 1 + 10 + 2 bytes of varints
    assert_eq!(&packed_bytes[..3], &[0xD2, 0x05, 0x0D]);

    let unpacked_desc = message("TestUnpackedTypes");
    let unpacked = DynamicMessage::parse(unpacked_desc.clone(), packed_bytes.clone()).unwrap();
    assert_eq!(
        unpacked
            .get_field(&field(&unpacked_desc, "unpacked_int32"))
            .as_ref(),
        &ints
    );
    assert_eq!(
        unpacked
            .get_field(&field(&unpacked_desc, "unpacked_sint64"))
            .as_ref(),
        &sints
    );
    assert_eq!(
        unpacked
            .get_field(&field(&unpacked_desc, "unpacked_double"))
            .as_ref(),
        &doubles
    );
    assert_eq!(
        unpacked
            .get_field(&field(&unpacked_desc, "unpacked_enum"))
            .as_ref(),
        &enums
    );

    let unpacked_bytes = unpacked.encode_to_vec();
    assert!(unpacked_bytes.len() > packed_bytes.len());
    let back = DynamicMessage::parse(packed_desc, unpacked_bytes).unwrap();
    assert_eq!(back, packed);
    assert_eq!(back.encode_to_vec(), packed_bytes);
}

#[test]
fn test_negative_zero_is_distinct() {
    let desc = message("TestAllTypes");
    let float = field(&desc, "optional_float");
    let double = field(&desc, "optional_double");

    let mut negative = DynamicMessage::new(desc.clone());
    negative.set_field(&float, Value::F32(-0.0)).unwrap();
    negative.set_field(&double, Value::F64(-0.0)).unwrap();
    let mut positive = DynamicMessage::new(desc.clone());
    positive.set_field(&float, Value::F32(0.0)).unwrap();
    positive.set_field(&double, Value::F64(0.0)).unwrap();

    assert_ne!(negative, positive);

    let bytes = negative.encode_to_vec();
    assert_eq!(&bytes[..5], &[0x5D, 0x00, 0x00, 0x00, 0x80]);
    let parsed = DynamicMessage::parse(desc, bytes).unwrap();
    assert_eq!(parsed, negative);
    let value = parsed.get_field(&double).as_f64().unwrap();
    assert_eq!(value.to_bits(), (-0.0f64).to_bits());
}

#[test]
fn test_proto3_negative_zero_is_serialized() {
    let desc = message("proto3_unittest.TestAllTypes");
    let double = field(&desc, "optional_double");
    let mut msg = DynamicMessage::new(desc.clone());
    msg.set_field(&double, Value::F64(0.0)).unwrap();
    assert!(!msg.has_field(&double));
    msg.set_field(&double, Value::F64(-0.0)).unwrap();
    assert!(msg.has_field(&double));
    assert_eq!(msg.encoded_len(), 9);
}

#[test]
fn test_proto3_defaults_encode_to_nothing() {
    let desc = message("proto3_unittest.TestAllTypes");
    let mut msg = DynamicMessage::new(desc.clone());
    msg.set_field(&field(&desc, "optional_int32"), Value::I32(0))
        .unwrap();
    msg.set_field(&field(&desc, "optional_string"), Value::from(""))
        .unwrap();
    msg.set_field(&field(&desc, "optional_nested_enum"), Value::EnumNumber(0))
        .unwrap();

    assert_eq!(msg.encoded_len(), 0);
    assert!(msg.encode_to_vec().is_empty());
    assert_eq!(msg, DynamicMessage::new(desc));
}

#[test]
fn test_closed_enum_out_of_range_singular() {
    let desc = message("TestAllTypes");
    let enum_field = field(&desc, "optional_nested_enum");
    // optional_nested_enum = 1000
    let bytes = vec![0xA8, 0x01, 0xE8, 0x07];
    let msg = DynamicMessage::parse(desc, bytes.clone()).unwrap();
    assert!(!msg.has_field(&enum_field));
    assert_eq!(msg.unknown_fields().get_field(21).varint(), &[1000]);
    assert_eq!(msg.encode_to_vec(), bytes);
}

#[test]
fn test_closed_enum_out_of_range_repeated() {
    let desc = message("TestAllTypes");
    let enum_field = field(&desc, "repeated_nested_enum");
    // repeated_nested_enum: 2, 1000, 3 (unpacked)
    let bytes = vec![0x98, 0x03, 0x02, 0x98, 0x03, 0xE8, 0x07, 0x98, 0x03, 0x03];
    let msg = DynamicMessage::parse(desc, bytes).unwrap();
    assert_eq!(
        msg.get_field(&enum_field).as_ref(),
        &Value::List(vec![Value::EnumNumber(2), Value::EnumNumber(3)])
    );
    assert_eq!(msg.unknown_fields().get_field(51).varint(), &[1000]);
}

#[test]
fn test_closed_enum_out_of_range_packed() {
    let desc = message("TestPackedTypes");
    let enum_field = field(&desc, "packed_enum");
    // packed_enum: [1, 1000, 3]
    let bytes = vec![0xBA, 0x06, 0x04, 0x01, 0xE8, 0x07, 0x03];
    let msg = DynamicMessage::parse(desc, bytes).unwrap();
    assert_eq!(
        msg.get_field(&enum_field).as_ref(),
        &Value::List(vec![Value::EnumNumber(1), Value::EnumNumber(3)])
    );
    assert_eq!(msg.unknown_fields().get_field(103).varint(), &[1000]);
}

#[test]
fn test_open_enum_keeps_raw_number() {
    let desc = message("proto3_unittest.TestAllTypes");
    let enum_field = field(&desc, "optional_nested_enum");
    let bytes = vec![0xA8, 0x01, 0xE8, 0x07];
    let mut msg = DynamicMessage::parse(desc, bytes.clone()).unwrap();
    assert_eq!(
        msg.get_enum(&enum_field).unwrap(),
        EnumValue::Unrecognized(1000)
    );
    assert!(msg.unknown_fields().is_empty());
    assert_eq!(msg.encode_to_vec(), bytes);
    assert!(msg
        .set_enum(&enum_field, EnumValue::Unrecognized(1000))
        .is_err());
}

fn chain(depth: usize) -> DynamicMessage {
    let desc = message("TestRecursive");
    let a = field(&desc, "a");
    let mut msg = DynamicMessage::new(desc.clone());
    for _ in 0..depth {
        let mut outer = DynamicMessage::new(desc.clone());
        outer.set_field(&a, Value::Message(msg)).unwrap();
        msg = outer;
    }
    msg
}

#[test]
fn test_recursion_limit() {
    let desc = message("TestRecursive");
    let ok = chain(100).encode_to_vec();
    assert!(DynamicMessage::parse(desc.clone(), ok).is_ok());

    let deep = chain(101).encode_to_vec();
    let err = DynamicMessage::parse(desc.clone(), deep).unwrap_err();
    assert!(err.is_invalid_data());
    assert_eq!(
        err.decode_kind(),
        Some(&DecodeErrorKind::TooManyNestedMessages { limit: 100 })
    );

    let shallow = chain(20).encode_to_vec();
    let options = ParseOptions::new().recursion_limit(10);
    let err = DynamicMessage::parse_with(
        desc,
        shallow,
        &polje::ExtensionRegistry::empty(),
        &options,
    )
    .unwrap_err();
    assert_eq!(
        err.decode_kind(),
        Some(&DecodeErrorKind::TooManyNestedMessages { limit: 10 })
    );
}

#[test]
fn test_lazy_fields_count_toward_the_recursion_limit() {
    // optional_lazy_message { bb: 1 }
    let bytes = vec![0xDA, 0x01, 0x02, 0x08, 0x01];
    let registry = polje::ExtensionRegistry::empty();
    for lazy in [true, false] {
        let at_limit = ParseOptions::new().recursion_limit(0).lazy_fields(lazy);
        let err = DynamicMessage::parse_with(
            message("TestAllTypes"),
            bytes.clone(),
            &registry,
            &at_limit,
        )
        .unwrap_err();
        assert_eq!(
            err.decode_kind(),
            Some(&DecodeErrorKind::TooManyNestedMessages { limit: 0 }),
            "lazy_fields({lazy})"
        );

        let within = ParseOptions::new().recursion_limit(1).lazy_fields(lazy);
        let msg = DynamicMessage::parse_with(
            message("TestAllTypes"),
            bytes.clone(),
            &registry,
            &within,
        )
        .unwrap();
        assert_eq!(msg.encode_to_vec(), bytes);
    }
}

#[test]
fn test_truncated_and_malformed_input() {
    let desc = message("TestAllTypes");
    // optional_string claims 5 bytes, has 2
    let err = DynamicMessage::parse(desc.clone(), vec![0x72, 0x05, b'a', b'b']).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::TruncatedMessage));

    // optional_int32 with eleven continuation bytes
    let mut data = vec![0x08];
    data.extend([0xFF; 11]);
    let err = DynamicMessage::parse(desc.clone(), data).unwrap_err();
    assert_eq!(err.decode_kind(), Some(&DecodeErrorKind::MalformedVarint));

    // optionalgroup closed by field 17's END_GROUP
    let err = DynamicMessage::parse(desc, vec![0x83, 0x01, 0x8C, 0x01]).unwrap_err();
    assert_eq!(
        err.decode_kind(),
        Some(&DecodeErrorKind::InvalidEndGroupTag {
            expected: 16,
            found: 17
        })
    );
}

#[test]
fn test_nested_messages_merge_when_repeated_on_the_wire() {
    let desc = message("TestAllTypes");
    let nested_field = field(&desc, "optional_nested_message");
    // optional_nested_message { bb: 1 } twice, second time with bb: 2
    let bytes = vec![0x92, 0x01, 0x02, 0x08, 0x01, 0x92, 0x01, 0x02, 0x08, 0x02];
    let msg = DynamicMessage::parse(desc, bytes).unwrap();
    assert_eq!(msg.get_field(&nested_field).as_ref(), &nested(2));
}

proptest! {
    #[test]
    fn prop_scalars_round_trip(
        int32 in any::<i32>(),
        sint64 in any::<i64>(),
        double in any::<f64>(),
        text in ".*",
        list in proptest::collection::vec(any::<i32>(), 0..8),
    ) {
        let desc = message("TestAllTypes");
        let mut msg = DynamicMessage::new(desc.clone());
        msg.set_field(&field(&desc, "optional_int32"), Value::I32(int32)).unwrap();
        msg.set_field(&field(&desc, "optional_sint64"), Value::I64(sint64)).unwrap();
        msg.set_field(&field(&desc, "optional_double"), Value::F64(double)).unwrap();
        msg.set_field(&field(&desc, "optional_string"), Value::String(text)).unwrap();
        msg.set_field(
            &field(&desc, "repeated_int32"),
            Value::List(list.into_iter().map(Value::I32).collect()),
        ).unwrap();

        let bytes = msg.encode_to_vec();
        prop_assert_eq!(bytes.len(), msg.encoded_len());
        let parsed = DynamicMessage::parse(desc, bytes).unwrap();
        prop_assert_eq!(parsed, msg);
    }

    #[test]
    fn prop_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = DynamicMessage::parse_partial(message("TestAllTypes"), data);
    }
}
