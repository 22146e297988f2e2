use super::*;
use crate::column::{to_fields, MutableColumn};
use crate::config::{BulkConfig, PresenceEncoding};
use crate::error::NullableError;
use crate::io::{DirectoryStreams, MemoryStreams};
use crate::types::{parse_type, DataTypePtr, Field};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ROWS: usize = 1000;

/// A nullable column of `ROWS` random values, roughly a third of them NULL.
fn random_column(ty: &DataTypePtr, rng: &mut StdRng) -> MutableColumn {
    let mut column = ty.create_column();
    for row in 0..ROWS {
        let field = if rng.random_bool(0.3) {
            Field::Null
        } else {
            match ty.name().as_str() {
                "Nullable(Int32)" => Field::Int64(rng.random_range(-1000..1000)),
                "Nullable(Float64)" => Field::Float64(rng.random_range(-1.0..1.0)),
                "Nullable(String)" => Field::from(format!("s{}", row)),
                "Nullable(Array(Nullable(UInt8)))" => Field::Array(
                    (0..rng.random_range(0..4u64))
                        .map(|i| if i == 1 { Field::Null } else { Field::UInt64(i) })
                        .collect(),
                ),
                "Nullable(Tuple(Int8, Nullable(String)))" => Field::Tuple(vec![
                    Field::Int64(rng.random_range(-5..5)),
                    if row % 7 == 0 { Field::Null } else { Field::from("t") },
                ]),
                other => panic!("no generator for {other}"),
            }
        };
        column.push_field(&field).unwrap();
    }
    column
}

fn round_trip(
    ty: &DataTypePtr,
    column: &MutableColumn,
    write_chunk: usize,
    read_chunk: usize,
    encoding: PresenceEncoding,
) -> MutableColumn {
    let write_config = BulkConfig {
        chunk_size_rows: write_chunk,
        presence_encoding: encoding,
    };
    let read_config = BulkConfig {
        chunk_size_rows: read_chunk,
        presence_encoding: encoding,
    };
    let mut streams = serialize_column(ty, column.as_ref(), "c", &write_config).unwrap();
    deserialize_column(ty, "c", &mut streams, &read_config).unwrap()
}

#[test]
fn test_round_trip_over_chunk_sizes() {
    let mut rng = StdRng::seed_from_u64(7);
    for name in [
        "Nullable(Int32)",
        "Nullable(Float64)",
        "Nullable(String)",
        "Nullable(Array(Nullable(UInt8)))",
        "Nullable(Tuple(Int8, Nullable(String)))",
    ] {
        let ty = parse_type(name).unwrap();
        let column = random_column(&ty, &mut rng);
        let expected = to_fields(column.as_ref());
        for chunk in [1, ROWS, ROWS.div_ceil(3)] {
            for encoding in [PresenceEncoding::Bytes, PresenceEncoding::PackedBits] {
                let back = round_trip(&ty, &column, chunk, chunk, encoding);
                assert_eq!(
                    to_fields(back.as_ref()),
                    expected,
                    "{name}, chunk {chunk}, {encoding:?}"
                );
            }
        }
    }
}

#[test]
fn test_read_chunking_is_independent_of_write_chunking() {
    let mut rng = StdRng::seed_from_u64(11);
    let ty = parse_type("Nullable(String)").unwrap();
    let column = random_column(&ty, &mut rng);
    let expected = to_fields(column.as_ref());
    for (write_chunk, read_chunk) in [(3, 17), (64, 5), (999, 2)] {
        for encoding in [PresenceEncoding::Bytes, PresenceEncoding::PackedBits] {
            let back = round_trip(&ty, &column, write_chunk, read_chunk, encoding);
            assert_eq!(to_fields(back.as_ref()), expected);
        }
    }
}

#[test]
fn test_presence_stream_layout() {
    let ty = parse_type("Nullable(UInt16)").unwrap();
    let mut column = ty.create_column();
    for i in 0..10u64 {
        let field = if i % 3 == 0 { Field::Null } else { Field::UInt64(i) };
        column.push_field(&field).unwrap();
    }
    let bytes = serialize_column(&ty, column.as_ref(), "c", &BulkConfig::default()).unwrap();
    assert_eq!(
        bytes.bytes("c.null"),
        Some(&[1u8, 0, 0, 1, 0, 0, 1, 0, 0, 1][..])
    );
    assert_eq!(bytes.bytes("c").map(|b| b.len()), Some(20));

    let packed = BulkConfig {
        chunk_size_rows: 4,
        presence_encoding: PresenceEncoding::PackedBits,
    };
    let bits = serialize_column(&ty, column.as_ref(), "c", &packed).unwrap();
    // Data bytes, then the count of valid bits in the last one.
    assert_eq!(bits.bytes("c.null"), Some(&[0b0100_1001u8, 0b0000_0010, 2][..]));
}

#[test]
fn test_block_round_trip_in_memory() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut block = Block::new();
    for (name, ty_name) in [("id", "Nullable(Int32)"), ("label", "Nullable(String)")] {
        let ty = parse_type(ty_name).unwrap();
        let column = random_column(&ty, &mut rng);
        block
            .insert(ColumnWithTypeAndName::new(name, ty, column))
            .unwrap();
    }

    let config = BulkConfig {
        chunk_size_rows: 128,
        presence_encoding: PresenceEncoding::PackedBits,
    };
    let mut writer = BlockWriter::new(MemoryStreams::new(), config);
    let manifest = writer.write(&block).unwrap();
    assert_eq!(manifest.rows, ROWS as u64);
    assert_eq!(manifest.columns[1].streams, vec!["label.null", "label"]);

    let mut streams = writer.into_inner();
    streams.rewind();
    let read_config = BulkConfig {
        chunk_size_rows: 100,
        ..BulkConfig::default()
    };
    let back = BlockReader::new(streams, read_config).read().unwrap();
    assert_eq!(back.rows(), ROWS);
    for (original, read) in block.columns().iter().zip(back.columns()) {
        assert_eq!(original.name, read.name);
        assert!(original.ty.equals(read.ty.as_ref()));
        assert_eq!(to_fields(original.column.as_ref()), to_fields(read.column.as_ref()));
    }
}

#[test]
fn test_block_round_trip_in_directory() {
    let dir = tempfile::tempdir().unwrap();
    let ty = parse_type("Nullable(Array(Nullable(UInt8)))").unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let column = random_column(&ty, &mut rng);
    let expected = to_fields(column.as_ref());

    let mut block = Block::new();
    block
        .insert(ColumnWithTypeAndName::new("arr", ty.clone(), column))
        .unwrap();
    {
        let streams = DirectoryStreams::open(dir.path()).unwrap();
        BlockWriter::new(streams, BulkConfig::default())
            .write(&block)
            .unwrap();
    }
    for name in ["arr.null", "arr.size0", "arr.null1", "arr"] {
        let path = DirectoryStreams::open(dir.path()).unwrap().file_path(name);
        assert!(path.exists(), "missing {}", path.display());
    }

    let streams = DirectoryStreams::open(dir.path()).unwrap();
    let back = BlockReader::new(streams, BulkConfig::default()).read().unwrap();
    let read = back.get("arr").unwrap();
    assert!(read.ty.equals(ty.as_ref()));
    assert_eq!(to_fields(read.column.as_ref()), expected);
}

#[test]
fn test_empty_block_and_reserved_names() {
    let ty = parse_type("Nullable(Int32)").unwrap();
    let mut block = Block::new();
    block
        .insert(ColumnWithTypeAndName::empty("empty", ty.clone()))
        .unwrap();
    let mut writer = BlockWriter::new(MemoryStreams::new(), BulkConfig::default());
    writer.write(&block).unwrap();
    let mut streams = writer.into_inner();
    streams.rewind();
    let back = BlockReader::new(streams, BulkConfig::default()).read().unwrap();
    assert_eq!(back.rows(), 0);
    assert_eq!(back.columns().len(), 1);

    let mut reserved = Block::new();
    reserved
        .insert(ColumnWithTypeAndName::empty("__manifest", ty))
        .unwrap();
    let mut writer = BlockWriter::new(MemoryStreams::new(), BulkConfig::default());
    assert!(matches!(
        writer.write(&reserved),
        Err(NullableError::ContractViolation(_))
    ));
}

#[test]
fn test_truncated_column_stream_is_reported() {
    let ty = parse_type("Nullable(Int64)").unwrap();
    let mut block = Block::new();
    let mut column = ty.create_column();
    for v in 0..8 {
        column.push_field(&Field::Int64(v)).unwrap();
    }
    block
        .insert(ColumnWithTypeAndName::new("v", ty, column))
        .unwrap();
    let mut writer = BlockWriter::new(MemoryStreams::new(), BulkConfig::default());
    writer.write(&block).unwrap();
    let mut streams = writer.into_inner();

    // Drop the last two rows from both sub-streams: the streams agree with each
    // other but not with the manifest.
    let nulls = streams.bytes("v.null").unwrap()[..6].to_vec();
    let values = streams.bytes("v").unwrap()[..48].to_vec();
    streams.insert("v.null", nulls);
    streams.insert("v", values);
    streams.rewind();

    let err = BlockReader::new(streams, BulkConfig::default())
        .read()
        .unwrap_err();
    assert!(matches!(err, NullableError::UnexpectedEof(_)));
}

#[test]
fn test_block_rejects_mismatched_lengths() {
    let ty = parse_type("Nullable(Int8)").unwrap();
    let mut block = Block::new();
    let mut one = ty.create_column();
    one.push_field(&Field::Null).unwrap();
    block
        .insert(ColumnWithTypeAndName::new("a", ty.clone(), one))
        .unwrap();
    assert!(block
        .insert(ColumnWithTypeAndName::empty("b", ty.clone()))
        .is_err());
    assert!(block
        .insert(ColumnWithTypeAndName::empty("a", ty))
        .is_err());
}
