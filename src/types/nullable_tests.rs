//! Unit tests for the `Nullable` wrapper: descriptor properties, per-format sentinels,
//! binary codecs, stream enumeration and the bulk protocol's failure modes.

use std::sync::Arc;

use crate::column::{self, Column, NullableColumn, NumberColumn, StringColumn};
use crate::config::{FormatSettings, PresenceEncoding};
use crate::error::NullableError;
use crate::io::{MemoryStreams, ProtobufWriter, ReadBuffer};
use crate::types::substream::stream_name;
use crate::types::{
    make_nullable, parse_type, remove_nullable, DataType, DataTypePtr, DeserializeBulkSettings,
    Field, Int32Type, NothingType, NullableType, SerializeBulkSettings, StringType,
    SubstreamPath, TypeIndex,
};

fn ty(name: &str) -> DataTypePtr {
    parse_type(name).unwrap()
}

fn nullable_column(ty: &DataTypePtr, values: &[Field]) -> Box<dyn Column> {
    let mut col = ty.create_column();
    for value in values {
        col.push_field(value).unwrap();
    }
    col
}

fn as_nullable(col: &dyn Column) -> &NullableColumn {
    column::downcast_ref::<NullableColumn>(col, "Nullable").unwrap()
}

fn stream_names(ty: &DataTypePtr) -> Vec<String> {
    let mut names = Vec::new();
    ty.enumerate_streams(
        &mut |path: &SubstreamPath| names.push(stream_name("x", path)),
        &mut SubstreamPath::new(),
    );
    names
}

/// Writes `col` in chunks of `write_chunk` rows and returns the streams.
fn write_bulk(
    ty: &DataTypePtr,
    col: &dyn Column,
    write_chunk: usize,
    encoding: PresenceEncoding,
) -> MemoryStreams {
    let mut streams = MemoryStreams::new();
    {
        let mut settings = SerializeBulkSettings::new(&mut streams, "x", encoding);
        let mut state = ty.serialize_bulk_state_prefix(&mut settings).unwrap();
        let mut offset = 0;
        while offset < col.len() {
            ty.serialize_bulk_with_multiple_streams(col, offset, write_chunk, &mut settings, &mut state)
                .unwrap();
            offset += write_chunk;
        }
        ty.serialize_bulk_state_suffix(&mut settings, &mut state).unwrap();
    }
    streams.rewind();
    streams
}

/// Reads everything back in chunks of `read_chunk` rows.
fn read_bulk(
    ty: &DataTypePtr,
    streams: &mut MemoryStreams,
    read_chunk: usize,
    encoding: PresenceEncoding,
) -> crate::error::Result<Box<dyn Column>> {
    let mut col = ty.create_column();
    let mut settings = DeserializeBulkSettings::new(streams, "x", encoding);
    let mut state = ty.deserialize_bulk_state_prefix(&mut settings)?;
    while ty.deserialize_bulk_with_multiple_streams(col.as_mut(), read_chunk, &mut settings, &mut state)?
        > 0
    {}
    Ok(col)
}

//==================================================================================
// Descriptor properties
//==================================================================================

#[test]
fn test_name_tag_and_fixed_predicates() {
    let t = ty("Nullable(Int32)");
    assert_eq!(t.name(), "Nullable(Int32)");
    assert_eq!(t.family_name(), "Nullable");
    assert_eq!(t.type_id(), TypeIndex::Nullable);
    assert!(t.is_nullable());
    assert!(t.is_parametric());
    assert!(t.have_subtypes());
    assert!(!t.can_be_inside_nullable());
    assert!(!t.can_be_used_as_version());
    assert_eq!(t.default_value(), Field::Null);
}

#[test]
fn test_predicates_are_delegated() {
    let int = ty("Nullable(Int32)");
    assert!(int.is_comparable());
    assert!(int.is_summable());
    assert!(int.can_be_used_in_boolean_context());
    assert!(int.text_can_contain_only_valid_utf8());
    assert!(int.should_align_right_in_pretty_formats());
    assert!(int.can_be_inside_low_cardinality());
    assert!(!int.can_be_compared_with_collation());

    let string = ty("Nullable(String)");
    assert!(string.can_be_compared_with_collation());
    assert!(!string.is_summable());
    assert!(!string.should_align_right_in_pretty_formats());

    assert!(ty("Nullable(Nothing)").cannot_be_stored_in_tables());
    assert!(!int.cannot_be_stored_in_tables());
}

#[test]
fn test_size_accounting_adds_presence_byte() {
    assert_eq!(ty("Nullable(Int32)").size_of_value_in_memory(), Some(5));
    assert_eq!(ty("Nullable(UInt64)").maximum_size_of_value_in_memory(), Some(9));
    assert!(ty("Nullable(Float32)").have_maximum_size_of_value());
    assert_eq!(ty("Nullable(String)").size_of_value_in_memory(), None);
    assert!(!ty("Nullable(String)").have_maximum_size_of_value());
    assert_eq!(ty("Nullable(Tuple(Int8, Int16))").size_of_value_in_memory(), Some(4));
}

#[test]
fn test_structural_equality() {
    let same = |a: &str, b: &str| ty(a).equals(ty(b).as_ref());
    assert!(same("Nullable(Int32)", "Nullable(Int32)"));
    assert!(!same("Nullable(Int32)", "Nullable(Int64)"));
    assert!(!same("Nullable(Int32)", "Int32"));
    assert!(!same("Int32", "Nullable(Int32)"));
    assert!(same("Nullable(Array(String))", "Nullable(Array(String))"));
    assert!(!same("Nullable(Array(String))", "Nullable(Array(Int8))"));
    assert!(*ty("Nullable(String)") == *ty("Nullable(String)"));
}

#[test]
fn test_only_null_is_computed() {
    assert!(ty("Nullable(Nothing)").only_null());
    assert!(!ty("Nullable(Int32)").only_null());
    assert!(!ty("Nullable(Tuple(Nothing))").only_null());
}

#[test]
fn test_wrap_and_unwrap_are_idempotent() {
    let int: DataTypePtr = Arc::new(Int32Type::new());
    let once = make_nullable(&int).unwrap();
    let twice = make_nullable(&once).unwrap();
    assert!(once.equals(twice.as_ref()));
    assert!(Arc::ptr_eq(&once, &twice));
    assert_eq!(once.name(), "Nullable(Int32)");

    assert!(remove_nullable(&once).equals(int.as_ref()));
    assert!(remove_nullable(&remove_nullable(&once)).equals(remove_nullable(&once).as_ref()));
    assert!(remove_nullable(&int).equals(int.as_ref()));
}

#[test]
fn test_nullable_inside_nullable_is_rejected_at_construction() {
    let inner = ty("Nullable(String)");
    assert!(matches!(
        NullableType::new(inner),
        Err(NullableError::ContractViolation(_))
    ));
}

#[test]
fn test_create_column_is_empty_pair() {
    let col = ty("Nullable(String)").create_column();
    let nullable = as_nullable(col.as_ref());
    assert!(nullable.null_map().is_empty());
    assert!(nullable.nested().is_empty());
    assert!(nullable.nested().as_any().is::<StringColumn>());
}

//==================================================================================
// Text sentinels
//==================================================================================

#[test]
fn test_escaped_sentinel_read_and_write() {
    let settings = FormatSettings::default();
    let t = ty("Nullable(Int32)");
    let mut col = t.create_column();

    let mut r = ReadBuffer::new(b"\\N\t42");
    t.deserialize_text_escaped(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(r.position(), 2);
    r.advance(1);
    t.deserialize_text_escaped(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(column::to_fields(col.as_ref()), vec![Field::Null, Field::Int64(42)]);

    let mut out = Vec::new();
    t.serialize_text_escaped(col.as_ref(), 0, &mut out, &settings).unwrap();
    out.push(b'\t');
    t.serialize_text_escaped(col.as_ref(), 1, &mut out, &settings).unwrap();
    assert_eq!(out, b"\\N\t42");
}

#[test]
fn test_escaped_sentinel_precedence_over_string_literal() {
    let settings = FormatSettings::default();
    let t = ty("Nullable(String)");
    let mut col = t.create_column();

    // A bare `\N` is always NULL.
    let mut r = ReadBuffer::new(b"\\N");
    t.deserialize_text_escaped(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(col.get(0), Some(Field::Null));

    // `\Nabc` is not a truncated sentinel; escaped strings have no `\N` escape.
    let mut r = ReadBuffer::new(b"\\Nabc");
    let err = t.deserialize_text_escaped(col.as_mut(), &mut r, &settings);
    assert!(matches!(err, Err(NullableError::MalformedInput { .. })));
    assert_eq!(r.position(), 0);
    assert_eq!(col.len(), 1);
    assert_eq!(as_nullable(col.as_ref()).nested().len(), 1);
}

#[test]
fn test_csv_sentinel_requires_whole_field() {
    let settings = FormatSettings::default();
    let t = ty("Nullable(String)");
    let mut col = t.create_column();

    let mut r = ReadBuffer::new(b"\\Nabc,\\N,\"\\N\"");
    t.deserialize_text_csv(col.as_mut(), &mut r, &settings).unwrap();
    r.expect_byte(b',', 0).unwrap();
    t.deserialize_text_csv(col.as_mut(), &mut r, &settings).unwrap();
    r.expect_byte(b',', 0).unwrap();
    t.deserialize_text_csv(col.as_mut(), &mut r, &settings).unwrap();

    assert_eq!(
        column::to_fields(col.as_ref()),
        vec![Field::from("\\Nabc"), Field::Null, Field::from("\\N")]
    );

    // The non-null `\N` string is quoted on the way out, so it cannot turn into NULL.
    let mut out = Vec::new();
    t.serialize_text_csv(col.as_ref(), 2, &mut out, &settings).unwrap();
    assert_eq!(out, b"\"\\N\"");
}

#[test]
fn test_csv_unquoted_null_literal_setting() {
    let t = ty("Nullable(Int32)");
    let mut settings = FormatSettings::default();

    let mut col = t.create_column();
    let mut r = ReadBuffer::new(b"NULL");
    assert!(t.deserialize_text_csv(col.as_mut(), &mut r, &settings).is_err());
    assert!(col.is_empty());

    settings.csv.unquoted_null_literal_as_null = true;
    let mut r = ReadBuffer::new(b"null;");
    settings.csv.delimiter = ';';
    t.deserialize_text_csv(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(col.get(0), Some(Field::Null));
    assert_eq!(r.peek(), Some(b';'));
}

#[test]
fn test_quoted_sentinel_is_case_insensitive_and_bounded() {
    let settings = FormatSettings::default();
    let t = ty("Nullable(String)");
    let mut col = t.create_column();

    let mut r = ReadBuffer::new(b"null");
    t.deserialize_text_quoted(col.as_mut(), &mut r, &settings).unwrap();
    let mut r = ReadBuffer::new(b"'NULL'");
    t.deserialize_text_quoted(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(column::to_fields(col.as_ref()), vec![Field::Null, Field::from("NULL")]);

    let int = ty("Nullable(Int32)");
    let mut col = int.create_column();
    let mut r = ReadBuffer::new(b"NULLABLE");
    assert!(int.deserialize_text_quoted(col.as_mut(), &mut r, &settings).is_err());
    assert_eq!(r.position(), 0);

    let mut col = nullable_column(&t, &[Field::Null, Field::from("it's")]);
    let mut out = Vec::new();
    t.serialize_text_quoted(col.as_ref(), 0, &mut out, &settings).unwrap();
    out.push(b',');
    t.serialize_text_quoted(col.as_ref(), 1, &mut out, &settings).unwrap();
    assert_eq!(out, b"NULL,'it\\'s'");
    col.pop_back(2);
    assert!(col.is_empty());
}

#[test]
fn test_json_sentinel() {
    let settings = FormatSettings::default();
    let t = ty("Nullable(Int64)");
    let mut col = t.create_column();

    let mut r = ReadBuffer::new(b"null");
    t.deserialize_text_json(col.as_mut(), &mut r, &settings).unwrap();
    let mut r = ReadBuffer::new(b"\"17\"");
    t.deserialize_text_json(col.as_mut(), &mut r, &settings).unwrap();
    let mut r = ReadBuffer::new(b"nullx");
    assert!(t.deserialize_text_json(col.as_mut(), &mut r, &settings).is_err());
    assert_eq!(col.len(), 2);

    let mut out = Vec::new();
    t.serialize_text_json(col.as_ref(), 0, &mut out, &settings).unwrap();
    out.push(b' ');
    t.serialize_text_json(col.as_ref(), 1, &mut out, &settings).unwrap();
    assert_eq!(out, b"null \"17\"");

    let s = ty("Nullable(String)");
    let mut col = s.create_column();
    let mut r = ReadBuffer::new(b"\"null\"");
    s.deserialize_text_json(col.as_mut(), &mut r, &settings).unwrap();
    assert_eq!(col.get(0), Some(Field::from("null")));
}

#[test]
fn test_xml_and_plain_text_write_sentinels() {
    let mut settings = FormatSettings::default();
    let t = ty("Nullable(String)");
    let col = nullable_column(&t, &[Field::Null, Field::from("a<b")]);

    let mut out = Vec::new();
    t.serialize_text_xml(col.as_ref(), 0, &mut out, &settings).unwrap();
    assert_eq!(out, b"\\N");

    settings.xml.null_text = "<null/>".to_string();
    let mut out = Vec::new();
    t.serialize_text_xml(col.as_ref(), 0, &mut out, &settings).unwrap();
    assert_eq!(out, b"&lt;null/&gt;");

    let mut out = Vec::new();
    t.serialize_text_xml(col.as_ref(), 1, &mut out, &settings).unwrap();
    assert_eq!(out, b"a&lt;b");

    let mut out = Vec::new();
    t.serialize_text(col.as_ref(), 0, &mut out, &settings).unwrap();
    assert_eq!(out, b"NULL");
}

#[test]
fn test_protobuf_null_is_absent_field() {
    let t = ty("Nullable(Int32)");
    let col = nullable_column(&t, &[Field::Null, Field::Int64(-1)]);

    let mut writer = ProtobufWriter::new();
    t.serialize_protobuf(col.as_ref(), 0, &mut writer).unwrap();
    assert!(writer.as_bytes().is_empty());

    t.serialize_protobuf(col.as_ref(), 1, &mut writer).unwrap();
    assert_eq!(writer.as_bytes(), &[0x08, 0x01]);
}

#[test]
fn test_nothing_nested_has_no_text_form() {
    let settings = FormatSettings::default();
    let t: DataTypePtr = Arc::new(NullableType::new(Arc::new(NothingType::new())).unwrap());
    let mut col = t.create_column();
    let mut r = ReadBuffer::new(b"\\N");
    t.deserialize_text_escaped(col.as_mut(), &mut r, &settings).unwrap();
    let mut r = ReadBuffer::new(b"1");
    assert!(matches!(
        t.deserialize_text_escaped(col.as_mut(), &mut r, &settings),
        Err(NullableError::UnsupportedType(_))
    ));
    assert_eq!(col.len(), 1);
}

//==================================================================================
// Binary codecs
//==================================================================================

#[test]
fn test_field_binary_codec_carries_no_marker() {
    let t = ty("Nullable(Int32)");
    let mut out = Vec::new();
    t.serialize_binary_field(&Field::Int64(7), &mut out).unwrap();
    assert_eq!(out, 7i32.to_le_bytes());

    let mut out = Vec::new();
    t.serialize_binary_field(&Field::Null, &mut out).unwrap();
    assert_eq!(out, 0i32.to_le_bytes());

    let mut r = ReadBuffer::new(&out);
    assert_eq!(t.deserialize_binary_field(&mut r).unwrap(), Field::Int64(0));
}

#[test]
fn test_row_binary_codec_carries_presence_flag() {
    let t = ty("Nullable(String)");
    let col = nullable_column(&t, &[Field::Null, Field::from("hi")]);

    let mut out = Vec::new();
    t.serialize_binary(col.as_ref(), 0, &mut out).unwrap();
    t.serialize_binary(col.as_ref(), 1, &mut out).unwrap();
    assert_eq!(out, vec![1, 0, 2, b'h', b'i']);

    let mut back = t.create_column();
    let mut r = ReadBuffer::new(&out);
    t.deserialize_binary(back.as_mut(), &mut r).unwrap();
    t.deserialize_binary(back.as_mut(), &mut r).unwrap();
    assert!(r.eof());
    assert_eq!(column::to_fields(back.as_ref()), column::to_fields(col.as_ref()));

    let mut r = ReadBuffer::new(&[2]);
    assert!(matches!(
        t.deserialize_binary(back.as_mut(), &mut r),
        Err(NullableError::MalformedInput { .. })
    ));
    let mut r = ReadBuffer::new(&[0, 5, b'a']);
    assert!(t.deserialize_binary(back.as_mut(), &mut r).is_err());
    assert_eq!(r.position(), 0);
    assert_eq!(back.len(), 2);
}

//==================================================================================
// Stream enumeration
//==================================================================================

#[test]
fn test_enumerate_streams_names() {
    assert_eq!(stream_names(&ty("Nullable(Int32)")), vec!["x.null", "x"]);
    assert_eq!(
        stream_names(&ty("Array(Nullable(String))")),
        vec!["x.size0", "x.null", "x"]
    );
    assert_eq!(
        stream_names(&ty("Nullable(Array(Int8))")),
        vec!["x.null", "x.size0", "x"]
    );
    assert_eq!(
        stream_names(&ty("Tuple(Int32, Nullable(String))")),
        vec!["x.1", "x.2.null", "x.2"]
    );
    assert_eq!(
        stream_names(&ty("Nullable(Array(Nullable(Int8)))")),
        vec!["x.null", "x.size0", "x.null1", "x"]
    );
}

#[test]
fn test_written_streams_match_enumeration() {
    let t = ty("Nullable(Array(Nullable(Int8)))");
    let col = nullable_column(
        &t,
        &[
            Field::Array(vec![Field::Int64(1), Field::Null]),
            Field::Null,
        ],
    );
    let streams = write_bulk(&t, col.as_ref(), 10, PresenceEncoding::Bytes);
    let mut expected = stream_names(&t);
    expected.sort();
    expected.dedup();
    assert_eq!(streams.names(), expected);
}

//==================================================================================
// Bulk protocol
//==================================================================================

#[test]
fn test_bulk_round_trip_bytes_layout() {
    let t = ty("Nullable(Int32)");
    let col = nullable_column(&t, &[Field::Int64(1), Field::Null, Field::Int64(3)]);
    let mut streams = write_bulk(&t, col.as_ref(), 2, PresenceEncoding::Bytes);

    assert_eq!(streams.bytes("x.null"), Some(&[0u8, 1, 0][..]));
    assert_eq!(streams.bytes("x").map(|b| b.len()), Some(12));

    let back = read_bulk(&t, &mut streams, 2, PresenceEncoding::Bytes).unwrap();
    assert_eq!(as_nullable(back.as_ref()).null_map(), &[0, 1, 0]);
    assert_eq!(
        column::to_fields(back.as_ref()),
        vec![Field::Int64(1), Field::Null, Field::Int64(3)]
    );
}

#[test]
fn test_bulk_packed_bits_with_unaligned_chunks() {
    let t = ty("Nullable(String)");
    let values: Vec<Field> = (0..11)
        .map(|i| if i % 4 == 1 { Field::Null } else { Field::from(format!("v{}", i)) })
        .collect();
    let col = nullable_column(&t, &values);
    let mut streams = write_bulk(&t, col.as_ref(), 3, PresenceEncoding::PackedBits);
    // Two data bytes plus the trailer holding 3 valid bits.
    assert_eq!(streams.bytes("x.null").map(|b| b.len()), Some(3));
    assert_eq!(streams.bytes("x.null").and_then(|b| b.last().copied()), Some(3));

    let back = read_bulk(&t, &mut streams, 5, PresenceEncoding::PackedBits).unwrap();
    assert_eq!(column::to_fields(back.as_ref()), values);
}

#[test]
fn test_bulk_limit_is_clamped_and_offset_checked() {
    let t = ty("Nullable(Int32)");
    let col = nullable_column(&t, &[Field::Int64(1), Field::Null]);
    let mut streams = MemoryStreams::new();
    let mut settings = SerializeBulkSettings::new(&mut streams, "x", PresenceEncoding::Bytes);
    let mut state = t.serialize_bulk_state_prefix(&mut settings).unwrap();
    t.serialize_bulk_with_multiple_streams(col.as_ref(), 1, 100, &mut settings, &mut state)
        .unwrap();
    t.serialize_bulk_with_multiple_streams(col.as_ref(), 2, 5, &mut settings, &mut state)
        .unwrap();
    assert!(matches!(
        t.serialize_bulk_with_multiple_streams(col.as_ref(), 3, 1, &mut settings, &mut state),
        Err(NullableError::ContractViolation(_))
    ));
    assert_eq!(state.rows(), 1);
}

#[test]
fn test_bulk_state_cannot_be_mixed_or_reused() {
    let nullable_int = ty("Nullable(Int32)");
    let nullable_string = ty("Nullable(String)");
    let col = nullable_column(&nullable_int, &[Field::Int64(1)]);

    let mut streams = MemoryStreams::new();
    let mut settings = SerializeBulkSettings::new(&mut streams, "x", PresenceEncoding::Bytes);
    let mut state = nullable_string.serialize_bulk_state_prefix(&mut settings).unwrap();
    assert!(matches!(
        nullable_int.serialize_bulk_with_multiple_streams(col.as_ref(), 0, 1, &mut settings, &mut state),
        Err(NullableError::StateMismatch { .. })
    ));

    let mut state = nullable_int.serialize_bulk_state_prefix(&mut settings).unwrap();
    nullable_int
        .serialize_bulk_state_suffix(&mut settings, &mut state)
        .unwrap();
    assert!(matches!(
        nullable_int.serialize_bulk_with_multiple_streams(col.as_ref(), 0, 1, &mut settings, &mut state),
        Err(NullableError::StateFinished(_))
    ));
    assert!(nullable_int
        .serialize_bulk_state_suffix(&mut settings, &mut state)
        .is_err());
}

#[test]
fn test_bulk_encoding_must_match_state() {
    let t = ty("Nullable(Int32)");
    let col = nullable_column(&t, &[Field::Int64(1)]);
    let mut streams = MemoryStreams::new();
    let mut settings = SerializeBulkSettings::new(&mut streams, "x", PresenceEncoding::Bytes);
    let mut state = t.serialize_bulk_state_prefix(&mut settings).unwrap();
    settings.presence_encoding = PresenceEncoding::PackedBits;
    assert!(matches!(
        t.serialize_bulk_with_multiple_streams(col.as_ref(), 0, 1, &mut settings, &mut state),
        Err(NullableError::StateMismatch { .. })
    ));
}

#[test]
fn test_short_nested_stream_desynchronizes_and_poisons() {
    let t = ty("Nullable(Int32)");
    let col = nullable_column(
        &t,
        &[Field::Int64(1), Field::Null, Field::Int64(3), Field::Int64(4)],
    );
    let mut streams = write_bulk(&t, col.as_ref(), 4, PresenceEncoding::Bytes);
    let nested = streams.bytes("x").map(|b| b[..8].to_vec()).unwrap();
    streams.insert("x", nested);

    let mut back = t.create_column();
    let mut settings = DeserializeBulkSettings::new(&mut streams, "x", PresenceEncoding::Bytes);
    let mut state = t.deserialize_bulk_state_prefix(&mut settings).unwrap();
    let err = t
        .deserialize_bulk_with_multiple_streams(back.as_mut(), 4, &mut settings, &mut state)
        .unwrap_err();
    assert!(err.is_fatal());
    match err {
        NullableError::Desynchronized {
            stream,
            null_map_len,
            nested_len,
        } => {
            assert_eq!(stream, "x.null");
            assert_eq!(null_map_len, 4);
            assert_eq!(nested_len, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(as_nullable(back.as_ref()).is_poisoned());
    assert!(matches!(
        t.deserialize_bulk_with_multiple_streams(back.as_mut(), 4, &mut settings, &mut state),
        Err(NullableError::Desynchronized { .. })
    ));
    assert!(back.push_field(&Field::Null).is_err());
}

#[test]
fn test_packed_presence_short_nested_stream_is_not_padding() {
    let t = ty("Nullable(Int32)");
    let values = [Field::Int64(1), Field::Int64(2), Field::Int64(3)];
    let col = nullable_column(&t, &values);
    let mut streams = write_bulk(&t, col.as_ref(), 3, PresenceEncoding::PackedBits);
    let nested = streams.bytes("x").map(|b| b[..8].to_vec()).unwrap();
    streams.insert("x", nested);

    let err = read_bulk(&t, &mut streams, 1 << 20, PresenceEncoding::PackedBits).unwrap_err();
    assert!(matches!(
        err,
        NullableError::Desynchronized {
            null_map_len: 3,
            nested_len: 2,
            ..
        }
    ));
}

#[test]
fn test_huge_read_limit_stays_bounded() {
    let t = ty("Nullable(Int32)");
    let values = [Field::Int64(7), Field::Null, Field::Int64(9)];
    let col = nullable_column(&t, &values);
    for encoding in [PresenceEncoding::Bytes, PresenceEncoding::PackedBits] {
        let mut streams = write_bulk(&t, col.as_ref(), 3, encoding);
        let back = read_bulk(&t, &mut streams, 1 << 62, encoding).unwrap();
        assert_eq!(column::to_fields(back.as_ref()), values);
    }

    let nothing: DataTypePtr = Arc::new(NullableType::new(Arc::new(NothingType::new())).unwrap());
    let col = nullable_column(&nothing, &[Field::Null, Field::Null]);
    let mut streams = write_bulk(&nothing, col.as_ref(), 2, PresenceEncoding::PackedBits);
    let back = read_bulk(&nothing, &mut streams, 1 << 62, PresenceEncoding::PackedBits).unwrap();
    assert_eq!(back.len(), 2);

    let bare: DataTypePtr = Arc::new(NothingType::new());
    let mut streams = MemoryStreams::new();
    streams.insert("x", vec![0; 3]);
    let back = read_bulk(&bare, &mut streams, 1 << 62, PresenceEncoding::Bytes).unwrap();
    assert_eq!(back.len(), 3);
}

#[test]
fn test_corrupt_array_sizes_are_malformed() {
    let t = ty("Nullable(Array(Int8))");
    let mut streams = MemoryStreams::new();
    streams.insert("x.null", vec![0, 0]);
    let sizes: Vec<u8> = [u64::MAX, 2].iter().flat_map(|s| s.to_le_bytes()).collect();
    streams.insert("x.size0", sizes);
    streams.insert("x", vec![1, 2]);
    let err = read_bulk(&t, &mut streams, 2, PresenceEncoding::Bytes).unwrap_err();
    assert!(matches!(err, NullableError::MalformedInput { .. }));

    // Sizes that add up but promise far more elements than the stream holds.
    let mut streams = MemoryStreams::new();
    streams.insert("x.null", vec![0]);
    streams.insert("x.size0", (u64::MAX / 2).to_le_bytes().to_vec());
    streams.insert("x", vec![1, 2]);
    let err = read_bulk(&t, &mut streams, 1, PresenceEncoding::Bytes).unwrap_err();
    assert!(matches!(err, NullableError::UnexpectedEof(_)));
}

#[test]
fn test_missing_presence_stream_is_reported() {
    let t = ty("Nullable(Int32)");
    let mut streams = MemoryStreams::new();
    streams.insert("x", vec![0; 4]);
    let err = read_bulk(&t, &mut streams, 10, PresenceEncoding::Bytes).unwrap_err();
    assert!(matches!(err, NullableError::MissingStream(name) if name == "x.null"));
}

#[test]
fn test_only_null_column_rejects_present_rows() {
    let t: DataTypePtr = Arc::new(NullableType::new(Arc::new(NothingType::new())).unwrap());
    let col = nullable_column(&t, &[Field::Null, Field::Null, Field::Null]);
    let mut streams = write_bulk(&t, col.as_ref(), 2, PresenceEncoding::PackedBits);
    let back = read_bulk(&t, &mut streams, 2, PresenceEncoding::PackedBits).unwrap();
    assert_eq!(as_nullable(back.as_ref()).null_map(), &[1, 1, 1]);

    let mut streams = MemoryStreams::new();
    streams.insert("x.null", vec![1, 0]);
    streams.insert("x", vec![0, 0]);
    let err = read_bulk(&t, &mut streams, 2, PresenceEncoding::Bytes).unwrap_err();
    assert!(matches!(err, NullableError::MalformedInput { row: 1, .. }));
}

#[test]
fn test_nested_string_column_is_typed() {
    let t: DataTypePtr = Arc::new(NullableType::new(Arc::new(StringType::new())).unwrap());
    let wrong = NumberColumn::from_vec(vec![1i32]);
    let mut out = Vec::new();
    assert!(matches!(
        t.serialize_binary(&wrong, 0, &mut out),
        Err(NullableError::TypeMismatch { .. })
    ));
}
