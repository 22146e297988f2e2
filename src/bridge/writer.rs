// In: src/bridge/writer.rs

use log::debug;
use std::io::Write;

use crate::bridge::block::Block;
use crate::bridge::format::{
    BlockManifest, ColumnManifestEntry, BLOCK_FORMAT_VERSION, MANIFEST_STREAM,
};
use crate::bridge::stateless_api;
use crate::config::BulkConfig;
use crate::error::{NullableError, Result};
use crate::io::OutputStreams;
use crate::log_metric;

/// Writes one block into a stream set: every column through its type's bulk protocol,
/// then the manifest.
#[derive(Debug)]
pub struct BlockWriter<S: OutputStreams> {
    streams: S,
    config: BulkConfig,
}

impl<S: OutputStreams> BlockWriter<S> {
    pub fn new(streams: S, config: BulkConfig) -> Self {
        Self { streams, config }
    }

    /// Writes `block` and flushes the stream set. Returns the manifest that was stored.
    pub fn write(&mut self, block: &Block) -> Result<BlockManifest> {
        let mut entries = Vec::with_capacity(block.columns().len());

        for entry in block.columns() {
            if entry.name.starts_with("__") {
                return Err(NullableError::ContractViolation(format!(
                    "column name '{}' is reserved",
                    entry.name
                )));
            }
            stateless_api::serialize_column_into(
                &entry.ty,
                entry.column.as_ref(),
                &entry.name,
                &mut self.streams,
                &self.config,
            )?;
            log_metric!(
                "event" = "write_column",
                "column" = &entry.name,
                "type" = entry.ty.name(),
                "rows" = entry.column.len(),
                "chunk_size_rows" = self.config.chunk_size_rows
            );

            let mut streams: Vec<String> = Vec::new();
            for name in stateless_api::list_streams(&entry.ty, &entry.name) {
                if !streams.contains(&name) {
                    streams.push(name);
                }
            }
            entries.push(ColumnManifestEntry {
                name: entry.name.clone(),
                type_name: entry.ty.name(),
                streams,
            });
        }

        let manifest = BlockManifest {
            format_version: BLOCK_FORMAT_VERSION,
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
            rows: block.rows() as u64,
            presence_encoding: self.config.presence_encoding,
            columns: entries,
        };
        let bytes = manifest.to_bytes()?;
        self.streams.output(MANIFEST_STREAM)?.write_all(&bytes)?;
        self.streams.flush_all()?;

        debug!(
            "Wrote block of {} rows, {} columns, {} manifest bytes",
            manifest.rows,
            manifest.columns.len(),
            bytes.len()
        );
        Ok(manifest)
    }

    pub fn into_inner(self) -> S {
        self.streams
    }
}
