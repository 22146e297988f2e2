// In: src/bridge/stateless_api.rs

//! Single-column bulk passes, without any block or manifest around them.
//!
//! These drive the three-phase protocol of a `DataType` over a stream set, one
//! `chunk_size_rows` chunk at a time. The block writer and reader are built on them.

use log::{debug, trace};

use crate::column::{Column, MutableColumn};
use crate::config::BulkConfig;
use crate::error::{NullableError, Result};
use crate::io::{InputStreams, MemoryStreams, OutputStreams};
use crate::types::substream::stream_name;
use crate::types::{DataTypePtr, DeserializeBulkSettings, SerializeBulkSettings, SubstreamPath};

/// Every sub-stream name a column of `ty` called `column_name` writes, in write order.
/// The same name can appear more than once.
pub fn list_streams(ty: &DataTypePtr, column_name: &str) -> Vec<String> {
    let mut names = Vec::new();
    ty.enumerate_streams(
        &mut |path: &SubstreamPath| names.push(stream_name(column_name, path)),
        &mut SubstreamPath::new(),
    );
    names
}

fn chunk_size(config: &BulkConfig) -> Result<usize> {
    if config.chunk_size_rows == 0 {
        return Err(NullableError::ContractViolation(
            "chunk_size_rows must be at least 1".to_string(),
        ));
    }
    Ok(config.chunk_size_rows)
}

/// Writes all of `column` into `streams` and ends the pass. Returns the row count.
pub fn serialize_column_into(
    ty: &DataTypePtr,
    column: &dyn Column,
    column_name: &str,
    streams: &mut dyn OutputStreams,
    config: &BulkConfig,
) -> Result<usize> {
    let chunk = chunk_size(config)?;
    let mut settings = SerializeBulkSettings::new(streams, column_name, config.presence_encoding);
    let mut state = ty.serialize_bulk_state_prefix(&mut settings)?;
    let mut offset = 0;
    while offset < column.len() {
        ty.serialize_bulk_with_multiple_streams(column, offset, chunk, &mut settings, &mut state)?;
        offset += chunk;
    }
    ty.serialize_bulk_state_suffix(&mut settings, &mut state)?;
    debug!(
        "Serialized column '{}' of {}: {} rows in chunks of {}",
        column_name,
        ty.name(),
        column.len(),
        chunk
    );
    Ok(column.len())
}

/// Appends rows from `streams` to `column` until the streams are exhausted or
/// `max_rows` rows were read. Returns the number of rows read.
pub fn deserialize_column_from(
    ty: &DataTypePtr,
    column: &mut dyn Column,
    column_name: &str,
    streams: &mut dyn InputStreams,
    max_rows: Option<usize>,
    config: &BulkConfig,
) -> Result<usize> {
    let chunk = chunk_size(config)?;
    let mut settings =
        DeserializeBulkSettings::new(streams, column_name, config.presence_encoding);
    let mut state = ty.deserialize_bulk_state_prefix(&mut settings)?;
    let mut total = 0;
    loop {
        let limit = match max_rows {
            Some(max) => chunk.min(max - total),
            None => chunk,
        };
        if limit == 0 {
            break;
        }
        let rows = ty.deserialize_bulk_with_multiple_streams(column, limit, &mut settings, &mut state)?;
        trace!("Read chunk of {} rows for column '{}'", rows, column_name);
        total += rows;
        if rows < limit {
            break;
        }
    }
    debug!(
        "Deserialized column '{}' of {}: {} rows",
        column_name,
        ty.name(),
        total
    );
    Ok(total)
}

/// Serializes `column` into a fresh in-memory stream set, ready to be read back.
pub fn serialize_column(
    ty: &DataTypePtr,
    column: &dyn Column,
    column_name: &str,
    config: &BulkConfig,
) -> Result<MemoryStreams> {
    let mut streams = MemoryStreams::new();
    serialize_column_into(ty, column, column_name, &mut streams, config)?;
    streams.rewind();
    Ok(streams)
}

/// Reads a whole column of `ty` back from `streams`.
pub fn deserialize_column(
    ty: &DataTypePtr,
    column_name: &str,
    streams: &mut dyn InputStreams,
    config: &BulkConfig,
) -> Result<MutableColumn> {
    let mut column = ty.create_column();
    deserialize_column_from(ty, column.as_mut(), column_name, streams, None, config)?;
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_type;

    #[test]
    fn test_list_streams_for_nested_types() {
        let ty = parse_type("Tuple(Nullable(String), Array(Nullable(Int32)))").unwrap();
        assert_eq!(
            list_streams(&ty, "t"),
            vec!["t.1.null", "t.1", "t.2.size0", "t.2.null", "t.2"]
        );
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let ty = parse_type("Nullable(Int8)").unwrap();
        let column = ty.create_column();
        let config = BulkConfig {
            chunk_size_rows: 0,
            ..BulkConfig::default()
        };
        assert!(matches!(
            serialize_column(&ty, column.as_ref(), "c", &config),
            Err(NullableError::ContractViolation(_))
        ));
    }
}
