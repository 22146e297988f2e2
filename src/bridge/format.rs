// In: src/bridge/format.rs

//! On-disk structures for a block written through a stream set.
//!
//! The column data lives in the sub-streams the bulk protocol writes. Next to them the
//! block writer stores one extra stream, `MANIFEST_STREAM`, holding a JSON manifest:
//! the column names and type names, the row count and the presence encoding the
//! streams were written with. The reader rebuilds every descriptor from the manifest.

use serde::{Deserialize, Serialize};

use crate::config::PresenceEncoding;
use crate::error::{NullableError, Result};

/// Name of the manifest stream. The block writer rejects column names starting with
/// `__`, so no column sub-stream can take this name.
pub const MANIFEST_STREAM: &str = "__manifest";
/// The current version of the block manifest.
pub const BLOCK_FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnManifestEntry {
    pub name: String,
    /// Full type name, parsed back with `types::parse_type`.
    pub type_name: String,
    /// The sub-streams this column writes, in write order.
    pub streams: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockManifest {
    pub format_version: u16,
    pub writer_version: String,
    pub rows: u64,
    pub presence_encoding: PresenceEncoding,
    pub columns: Vec<ColumnManifestEntry>,
}

impl BlockManifest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)?;
        if manifest.format_version != BLOCK_FORMAT_VERSION {
            return Err(NullableError::ContractViolation(format!(
                "unsupported block format version {} (expected {})",
                manifest.format_version, BLOCK_FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }
}
