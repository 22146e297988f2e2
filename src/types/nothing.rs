//! `Nothing`, the type whose only value is NULL.
//!
//! It is never stored on its own; it exists as the nested type of `Nullable(Nothing)`,
//! the type of a bare `NULL` literal. Bulk passes write one zero byte per row so the
//! sub-stream still carries the row count.

use std::any::Any;
use std::io::Write;

use crate::column::{self, Column, MutableColumn, NothingColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::ReadBuffer;
use crate::kernels::bitpack::read_up_to;
use crate::types::number::READ_BLOCK_ROWS;
use crate::types::bulk::{
    DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings, SerializeBulkState,
};
use crate::types::{clamp_range, DataType, Field, TypeIndex};

const NAME: &str = "Nothing";

#[derive(Debug, Clone, Copy, Default)]
pub struct NothingType;

impl NothingType {
    pub fn new() -> Self {
        NothingType
    }

    fn no_text<T>(&self, format: &str) -> Result<T> {
        Err(NullableError::UnsupportedType(format!(
            "{} values have no {} representation",
            NAME, format
        )))
    }
}

impl DataType for NothingType {
    fn name(&self) -> String {
        NAME.to_string()
    }

    fn family_name(&self) -> &'static str {
        NAME
    }

    fn type_id(&self) -> TypeIndex {
        TypeIndex::Nothing
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn default_value(&self) -> Field {
        Field::Null
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(NothingColumn::new())
    }

    fn is_comparable(&self) -> bool {
        true
    }

    fn cannot_be_stored_in_tables(&self) -> bool {
        true
    }

    fn can_be_inside_nullable(&self) -> bool {
        true
    }

    fn size_of_value_in_memory(&self) -> Option<usize> {
        Some(0)
    }

    fn serialize_bulk_with_multiple_streams(
        &self,
        column: &dyn Column,
        offset: usize,
        limit: usize,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        state.check(NAME)?;
        let rows = clamp_range(column.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }
        settings.output()?.write_all(&vec![0u8; rows])?;
        state.advance(rows);
        Ok(())
    }

    fn deserialize_bulk_with_multiple_streams(
        &self,
        column: &mut dyn Column,
        limit: usize,
        settings: &mut DeserializeBulkSettings,
        state: &mut DeserializeBulkState,
    ) -> Result<usize> {
        state.check(NAME)?;
        let col = column::downcast_mut::<NothingColumn>(column, NAME)?;
        let r = settings.input()?;
        let mut buf = vec![0u8; limit.min(READ_BLOCK_ROWS)];
        let mut rows = 0;
        while rows < limit {
            let want = (limit - rows).min(READ_BLOCK_ROWS);
            let got = read_up_to(r, &mut buf[..want])?;
            rows += got;
            if got < want {
                break;
            }
        }
        col.extend(rows);
        state.advance(rows);
        Ok(rows)
    }

    fn serialize_binary_field(&self, field: &Field, _w: &mut dyn Write) -> Result<()> {
        if !field.is_null() {
            return Err(NullableError::TypeMismatch {
                expected: "Null".to_string(),
                actual: field.kind_name().to_string(),
            });
        }
        Ok(())
    }

    fn deserialize_binary_field(&self, _r: &mut ReadBuffer) -> Result<Field> {
        Ok(Field::Null)
    }

    fn serialize_text(
        &self,
        _column: &dyn Column,
        _row: usize,
        _w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("text")
    }

    fn serialize_text_escaped(
        &self,
        _column: &dyn Column,
        _row: usize,
        _w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("escaped")
    }

    fn deserialize_text_escaped(
        &self,
        _column: &mut dyn Column,
        _r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("escaped")
    }

    fn serialize_text_quoted(
        &self,
        _column: &dyn Column,
        _row: usize,
        _w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("quoted")
    }

    fn deserialize_text_quoted(
        &self,
        _column: &mut dyn Column,
        _r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("quoted")
    }

    fn serialize_text_csv(
        &self,
        _column: &dyn Column,
        _row: usize,
        _w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("CSV")
    }

    fn deserialize_text_csv(
        &self,
        _column: &mut dyn Column,
        _r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("CSV")
    }

    fn serialize_text_json(
        &self,
        _column: &dyn Column,
        _row: usize,
        _w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("JSON")
    }

    fn deserialize_text_json(
        &self,
        _column: &mut dyn Column,
        _r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.no_text("JSON")
    }
}
