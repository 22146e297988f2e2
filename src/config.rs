// In: src/config.rs

//! The single source of truth for all nullable-core configuration.
//!
//! `NullableConfig` is created once at the application boundary (for example from a
//! JSON document) and then passed down by reference. Text codecs only see the
//! `FormatSettings` part; bulk passes only see `BulkConfig`.

use serde::{Deserialize, Serialize};

use crate::error::Result;

//==================================================================================
// I. Bulk (binary, multi-stream) settings
//==================================================================================

/// Physical layout of the presence (`.null`) sub-stream.
///
/// This is a compatibility-sensitive choice: a reader must be configured with the
/// same encoding as the writer that produced the stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceEncoding {
    /// **Default:** One byte per row, nonzero meaning the row is NULL.
    #[default]
    Bytes,

    /// One bit per row, least-significant bit first. Partial bytes are carried in the
    /// bulk state across chunks and flushed when the pass ends, followed by one byte
    /// holding the number of valid bits in the last data byte.
    PackedBits,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BulkConfig {
    /// The number of rows handed to a single `write_chunk` / `read_chunk` call by the
    /// block writer and reader.
    #[serde(default = "default_chunk_size_rows")]
    pub chunk_size_rows: usize,

    #[serde(default)]
    pub presence_encoding: PresenceEncoding,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            chunk_size_rows: default_chunk_size_rows(),
            presence_encoding: PresenceEncoding::default(),
        }
    }
}

fn default_chunk_size_rows() -> usize {
    65_536
}

//==================================================================================
// II. Text format settings
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CsvSettings {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,

    /// Also read a bare, unquoted `NULL` field as NULL (`\N` is always accepted).
    #[serde(default)]
    pub unquoted_null_literal_as_null: bool,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: default_csv_delimiter(),
            unquoted_null_literal_as_null: false,
        }
    }
}

fn default_csv_delimiter() -> char {
    ','
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct JsonSettings {
    /// Write 64-bit integers as JSON strings, since many JSON readers lose precision
    /// past 2^53. Reading accepts both forms regardless.
    #[serde(default = "default_true")]
    pub quote_64bit_integers: bool,
}

impl Default for JsonSettings {
    fn default() -> Self {
        Self {
            quote_64bit_integers: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct XmlSettings {
    /// Text written inside the value element for a NULL row.
    #[serde(default = "default_xml_null_text")]
    pub null_text: String,
}

impl Default for XmlSettings {
    fn default() -> Self {
        Self {
            null_text: default_xml_null_text(),
        }
    }
}

fn default_xml_null_text() -> String {
    "\\N".to_string()
}

/// Settings consulted by the single-row text codecs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FormatSettings {
    #[serde(default)]
    pub csv: CsvSettings,
    #[serde(default)]
    pub json: JsonSettings,
    #[serde(default)]
    pub xml: XmlSettings,
}

//==================================================================================
// III. The Unified NullableConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NullableConfig {
    #[serde(default)]
    pub format: FormatSettings,

    #[serde(default)]
    pub bulk: BulkConfig,
}

impl NullableConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}
