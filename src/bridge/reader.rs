// In: src/bridge/reader.rs

use log::{debug, warn};
use std::io::Read;

use crate::bridge::block::{Block, ColumnWithTypeAndName};
use crate::bridge::format::{BlockManifest, MANIFEST_STREAM};
use crate::bridge::stateless_api;
use crate::config::BulkConfig;
use crate::error::{NullableError, Result};
use crate::io::InputStreams;
use crate::log_metric;
use crate::types::parse_type;

/// Reads back a block written by `BlockWriter`.
///
/// Column types and the presence encoding come from the stored manifest. Only
/// `chunk_size_rows` is taken from the reader's own config, so a block can be read
/// with a different chunking than it was written with.
#[derive(Debug)]
pub struct BlockReader<S: InputStreams> {
    streams: S,
    config: BulkConfig,
}

impl<S: InputStreams> BlockReader<S> {
    pub fn new(streams: S, config: BulkConfig) -> Self {
        Self { streams, config }
    }

    pub fn read_manifest(&mut self) -> Result<BlockManifest> {
        let mut bytes = Vec::new();
        self.streams.input(MANIFEST_STREAM)?.read_to_end(&mut bytes)?;
        BlockManifest::from_bytes(&bytes)
    }

    pub fn read(&mut self) -> Result<Block> {
        let manifest = self.read_manifest()?;
        if manifest.presence_encoding != self.config.presence_encoding {
            warn!(
                "Block was written with {:?} presence encoding, reader is configured for {:?}; using the block's",
                manifest.presence_encoding, self.config.presence_encoding
            );
        }
        let config = BulkConfig {
            presence_encoding: manifest.presence_encoding,
            ..self.config.clone()
        };
        let rows = usize::try_from(manifest.rows).map_err(|_| {
            NullableError::ContractViolation(format!("block of {} rows is too large", manifest.rows))
        })?;

        let mut block = Block::new();
        for entry in &manifest.columns {
            let ty = parse_type(&entry.type_name)?;
            let mut column = ColumnWithTypeAndName::empty(entry.name.clone(), ty);
            if rows > 0 {
                let read = stateless_api::deserialize_column_from(
                    &column.ty,
                    column.column.as_mut(),
                    &entry.name,
                    &mut self.streams,
                    Some(rows),
                    &config,
                )?;
                if read != rows {
                    return Err(NullableError::UnexpectedEof(format!(
                        "column '{}': {} of {} rows",
                        entry.name, read, rows
                    )));
                }
            }
            log_metric!(
                "event" = "read_column",
                "column" = &entry.name,
                "type" = &entry.type_name,
                "rows" = rows
            );
            block.insert(column)?;
        }

        debug!(
            "Read block of {} rows, {} columns (writer {})",
            rows,
            manifest.columns.len(),
            manifest.writer_version
        );
        Ok(block)
    }

    pub fn into_inner(self) -> S {
        self.streams
    }
}
