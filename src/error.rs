// In: src/error.rs

//! This module defines the single, unified error type for the entire nullable-core library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! No variant is retried at this layer. Every error that can be tied to a position in a
//! column carries the row offset and, for bulk passes, the sub-stream name, so the caller
//! (storage or transport) can decide whether to retry, skip or abort.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NullableError {
    // =========================================================================
    // === Semantic Errors (Specific to the nullable wrapper)
    // =========================================================================
    /// Input matched neither the null sentinel nor a valid encoding of the nested type.
    /// No partial row has been committed when this is returned.
    #[error("Malformed input at row {row} (stream '{stream}'): {message}")]
    MalformedInput {
        row: usize,
        stream: String,
        message: String,
    },

    /// The presence map and the nested column diverged. The column instance is unusable.
    #[error(
        "Column desynchronized on stream '{stream}': null map has {null_map_len} rows, nested column has {nested_len}"
    )]
    Desynchronized {
        stream: String,
        null_map_len: usize,
        nested_len: usize,
    },

    /// A type was composed in a way the wrapper cannot support. Raised at construction.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A bulk state produced for one type was threaded into a pass for another.
    #[error("Bulk state mismatch: state belongs to '{actual}', but was used with '{expected}'")]
    StateMismatch { expected: String, actual: String },

    /// A bulk pass was continued after its `end` call.
    #[error("Bulk state for '{0}' was already finished")]
    StateFinished(String),

    #[error("Sub-stream '{0}' does not exist")]
    MissingStream(String),

    #[error("Unexpected end of stream while reading {0}")]
    UnexpectedEof(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Unknown data type name: {0}")]
    UnknownType(String),

    // =========================================================================
    // === Low-Level Kernel Errors
    // =========================================================================
    #[error("LEB128 decoding error: {0}")]
    Leb128DecodeError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during config or JSON text handling.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NullableError>;

impl NullableError {
    /// Shorthand for a `MalformedInput` raised by a single-row text or binary decoder,
    /// where no sub-stream is involved.
    pub fn malformed(row: usize, message: impl Into<String>) -> Self {
        NullableError::MalformedInput {
            row,
            stream: String::new(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors that leave a column in an unusable state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NullableError::Desynchronized { .. })
    }
}
