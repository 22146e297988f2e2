//! Value-type descriptors.
//!
//! A descriptor (`DataType`) describes one value kind: its name, its structural
//! predicates, its sizes and every codec it supports, from single values up to the
//! multi-stream bulk protocol. Descriptors are immutable and shared behind
//! `DataTypePtr`; they never own data and operate on the columns they create.
//!
//! `NullableType` composes onto any other descriptor by delegation. Everything it does
//! not override behaves exactly like the wrapped type.

use std::any::Any;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::column::{Column, MutableColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};

pub mod array;
pub mod bulk;
pub mod factory;
pub mod field;
pub mod nothing;
pub mod nullable;
pub mod number;
pub mod string;
pub mod substream;
pub mod text;
pub mod tuple;

#[cfg(test)]
mod nullable_tests;

pub use array::ArrayType;
pub use bulk::{
    DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings, SerializeBulkState,
};
pub use factory::parse_type;
pub use field::Field;
pub use nothing::NothingType;
pub use nullable::{make_nullable, remove_nullable, NullableType};
pub use number::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, NumberType,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
pub use string::StringType;
pub use substream::{Substream, SubstreamPath};
pub use tuple::TupleType;

/// Shared, immutable handle to a descriptor.
pub type DataTypePtr = Arc<dyn DataType>;

/// The kind tag of a descriptor, independent of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeIndex {
    Nothing,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Array,
    Tuple,
    Nullable,
}

pub trait DataType: fmt::Debug + Send + Sync {
    //==============================================================================
    // Identity
    //==============================================================================

    /// Full type name including parameters, e.g. `Nullable(Array(Int32))`.
    fn name(&self) -> String;

    /// Name without parameters, e.g. `Nullable`.
    fn family_name(&self) -> &'static str;

    fn type_id(&self) -> TypeIndex;

    fn as_any(&self) -> &dyn Any;

    /// Structural equality. Names are canonical, so comparing tag and name suffices
    /// unless a type overrides this.
    fn equals(&self, other: &dyn DataType) -> bool {
        self.type_id() == other.type_id() && self.name() == other.name()
    }

    fn default_value(&self) -> Field;

    fn create_column(&self) -> MutableColumn;

    //==============================================================================
    // Structural predicates
    //==============================================================================

    fn is_parametric(&self) -> bool {
        false
    }

    fn have_subtypes(&self) -> bool {
        false
    }

    fn is_comparable(&self) -> bool {
        false
    }

    fn can_be_compared_with_collation(&self) -> bool {
        false
    }

    fn is_summable(&self) -> bool {
        false
    }

    fn can_be_used_in_boolean_context(&self) -> bool {
        false
    }

    fn can_be_used_as_version(&self) -> bool {
        false
    }

    fn text_can_contain_only_valid_utf8(&self) -> bool {
        false
    }

    fn should_align_right_in_pretty_formats(&self) -> bool {
        false
    }

    fn cannot_be_stored_in_tables(&self) -> bool {
        false
    }

    fn can_be_inside_nullable(&self) -> bool {
        false
    }

    fn can_be_inside_low_cardinality(&self) -> bool {
        false
    }

    fn is_nullable(&self) -> bool {
        false
    }

    /// True if the only value this type can hold is NULL.
    fn only_null(&self) -> bool {
        false
    }

    //==============================================================================
    // Sizes
    //==============================================================================

    /// In-memory size of one value, if fixed.
    fn size_of_value_in_memory(&self) -> Option<usize> {
        None
    }

    /// Upper bound of the in-memory size of one value, if bounded.
    fn maximum_size_of_value_in_memory(&self) -> Option<usize> {
        self.size_of_value_in_memory()
    }

    fn have_maximum_size_of_value(&self) -> bool {
        self.maximum_size_of_value_in_memory().is_some()
    }

    //==============================================================================
    // Bulk, multi-stream protocol (see `bulk`)
    //==============================================================================

    /// Visits the path of every sub-stream this type writes, in write order.
    fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        callback(path);
    }

    /// Begins a write pass. Writes nothing.
    fn serialize_bulk_state_prefix(
        &self,
        _settings: &mut SerializeBulkSettings,
    ) -> Result<SerializeBulkState> {
        Ok(SerializeBulkState::leaf(self.name()))
    }

    /// Ends a write pass, flushing anything the state still buffers.
    fn serialize_bulk_state_suffix(
        &self,
        _settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        state.finish(&self.name())
    }

    /// Begins a read pass. Reads nothing.
    fn deserialize_bulk_state_prefix(
        &self,
        _settings: &mut DeserializeBulkSettings,
    ) -> Result<DeserializeBulkState> {
        Ok(DeserializeBulkState::leaf(self.name()))
    }

    /// Writes rows `[offset, offset + limit)` of `column`. `limit` is clamped to the
    /// rows available; an `offset` past the end is a contract violation.
    fn serialize_bulk_with_multiple_streams(
        &self,
        column: &dyn Column,
        offset: usize,
        limit: usize,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()>;

    /// Appends up to `limit` rows to `column` and returns how many were read. Fewer
    /// than `limit` means the streams are exhausted.
    fn deserialize_bulk_with_multiple_streams(
        &self,
        column: &mut dyn Column,
        limit: usize,
        settings: &mut DeserializeBulkSettings,
        state: &mut DeserializeBulkState,
    ) -> Result<usize>;

    //==============================================================================
    // Single values, binary
    //==============================================================================

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()>;

    fn deserialize_binary_field(&self, r: &mut ReadBuffer) -> Result<Field>;

    /// Writes the value at `row` of `column`.
    fn serialize_binary(&self, column: &dyn Column, row: usize, w: &mut dyn Write) -> Result<()> {
        let field = row_field(column, row)?;
        self.serialize_binary_field(&field, w)
    }

    /// Reads one value and appends it to `column`.
    fn deserialize_binary(&self, column: &mut dyn Column, r: &mut ReadBuffer) -> Result<()> {
        let field = self.deserialize_binary_field(r)?;
        column.push_field(&field)
    }

    //==============================================================================
    // Single rows, text
    //==============================================================================

    /// Human-readable rendering, used by pretty and debug output.
    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn serialize_text_escaped(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn deserialize_text_escaped(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn serialize_text_quoted(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn serialize_text_csv(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn deserialize_text_csv(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn serialize_text_json(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()>;

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()>;

    /// XML text content. Defaults to the entity-escaped plain text rendering.
    fn serialize_text_xml(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        let mut plain = Vec::new();
        self.serialize_text(column, row, &mut plain, settings)?;
        text::write_xml_escaped(&plain, w)
    }

    //==============================================================================
    // External interchange
    //==============================================================================

    fn serialize_protobuf(
        &self,
        _column: &dyn Column,
        _row: usize,
        _writer: &mut ProtobufWriter,
    ) -> Result<()> {
        Err(NullableError::UnsupportedType(format!(
            "{} cannot be written as protobuf",
            self.name()
        )))
    }
}

impl PartialEq for dyn DataType {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// The value at `row`, or a contract violation if the row does not exist.
pub(crate) fn row_field(column: &dyn Column, row: usize) -> Result<Field> {
    crate::column::check_row(column, row)?;
    column.get(row).ok_or_else(|| {
        NullableError::ContractViolation(format!("row {} has no value", row))
    })
}

/// Clamps a bulk write range to the column. Returns the effective row count.
pub(crate) fn clamp_range(column_len: usize, offset: usize, limit: usize) -> Result<usize> {
    if offset > column_len {
        return Err(NullableError::ContractViolation(format!(
            "bulk write offset {} is past the end of a column of {} rows",
            offset, column_len
        )));
    }
    Ok(limit.min(column_len - offset))
}
