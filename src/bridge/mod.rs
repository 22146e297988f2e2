// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing surface over the type system. Everything below it
// (`types`, `column`, `io`) works one column and one protocol call at a time; the
// bridge strings those calls together into whole passes.
//
// Data Flow (Write):
//
//   1. [Stateful Facade (BlockWriter)]          -> Receives a `Block`
//         |
//         `-> for each column ->
//
//   2. [Stateless API (serialize_column_into)]  -> begin, chunk * ceil(rows / chunk_size_rows), end
//         |
//         `-> `DataType::serialize_bulk_*` writes the column's sub-streams
//
//   3. [BlockWriter]                            -> Stores the JSON `BlockManifest`, flushes
//
//
// Data Flow (Read):
//
//   1. [Stateful Facade (BlockReader)]          -> Loads the `BlockManifest`
//         |
//         `-> for each column: `parse_type(type_name)` ->
//
//   2. [Stateless API (deserialize_column_from)] -> begin, chunk until `rows` are read
//
//   3. [BlockReader]                            -> Assembles and returns the `Block`
//
// `arrow_impl` converts single columns to and from Arrow arrays and is independent of
// the stream passes.
// ====================================================================================
pub mod arrow_impl;
pub mod block;
pub mod format;
pub mod reader;
pub mod stateless_api;
pub mod writer;

// --- High-Level Stateful API ---
pub use block::{Block, ColumnWithTypeAndName};
pub use reader::BlockReader;
pub use writer::BlockWriter;

// --- Low-Level Stateless API ---
pub use arrow_impl::{arrow_to_column, column_to_arrow, to_arrow_field};
pub use stateless_api::{
    deserialize_column, deserialize_column_from, list_streams, serialize_column,
    serialize_column_into,
};

// --- Format Constants and Structs ---
pub use format::{BlockManifest, ColumnManifestEntry, BLOCK_FORMAT_VERSION, MANIFEST_STREAM};

#[cfg(test)]
mod tests;
