//! `Tuple(T1, ..., Tn)`: one independent sub-column per element.
//!
//! Element `i` (1-based) writes its sub-streams under `TupleElement(i)`, named `.i`.

use std::any::Any;
use std::io::Write;

use crate::column::{self, Column, MutableColumn, TupleColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};
use crate::types::bulk::{
    in_substream, DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings,
    SerializeBulkState,
};
use crate::types::substream::{Substream, SubstreamPath};
use crate::types::text;
use crate::types::{clamp_range, DataType, DataTypePtr, Field, TypeIndex};

#[derive(Debug, Clone)]
pub struct TupleType {
    elements: Vec<DataTypePtr>,
}

impl TupleType {
    pub fn new(elements: Vec<DataTypePtr>) -> Result<Self> {
        if elements.is_empty() {
            return Err(NullableError::ContractViolation(
                "Tuple must have at least one element".to_string(),
            ));
        }
        Ok(Self { elements })
    }

    pub fn elements(&self) -> &[DataTypePtr] {
        &self.elements
    }

    fn tuple_column<'a>(&self, column: &'a dyn Column, row: usize) -> Result<&'a TupleColumn> {
        let col = column::downcast_ref::<TupleColumn>(column, &self.name())?;
        column::check_row(column, row)?;
        Ok(col)
    }

    /// Writes `(a,b,...)` with every element rendered by `write_one`.
    fn write_row(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        brackets: (&[u8], &[u8]),
        write_one: impl Fn(&dyn DataType, &dyn Column, &mut dyn Write) -> Result<()>,
    ) -> Result<()> {
        let col = self.tuple_column(column, row)?;
        w.write_all(brackets.0)?;
        for (i, (ty, element)) in self.elements.iter().zip(col.elements()).enumerate() {
            if i > 0 {
                w.write_all(b",")?;
            }
            write_one(ty.as_ref(), element.as_ref(), w)?;
        }
        w.write_all(brackets.1)?;
        Ok(())
    }

    /// Parses one row. On failure every element column is rolled back.
    fn read_row(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        brackets: (u8, u8),
        read_one: impl Fn(&dyn DataType, &mut dyn Column, &mut ReadBuffer) -> Result<()>,
    ) -> Result<()> {
        let name = self.name();
        let col = column::downcast_mut::<TupleColumn>(column, &name)?;
        let row = col.len();
        let mut done = 0;
        let parsed = (|| -> Result<()> {
            r.expect_byte(brackets.0, row)?;
            for (i, ty) in self.elements.iter().enumerate() {
                r.skip_ascii_whitespace();
                if i > 0 {
                    r.expect_byte(b',', row)?;
                    r.skip_ascii_whitespace();
                }
                read_one(ty.as_ref(), col.elements_mut()[i].as_mut(), r)?;
                done += 1;
            }
            r.skip_ascii_whitespace();
            r.expect_byte(brackets.1, row)
        })();
        if let Err(e) = parsed {
            for element in &mut col.elements_mut()[..done] {
                element.pop_back(1);
            }
            return Err(e);
        }
        Ok(())
    }
}

impl DataType for TupleType {
    fn name(&self) -> String {
        let names: Vec<String> = self.elements.iter().map(|e| e.name()).collect();
        format!("Tuple({})", names.join(", "))
    }

    fn family_name(&self) -> &'static str {
        "Tuple"
    }

    fn type_id(&self) -> TypeIndex {
        TypeIndex::Tuple
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DataType) -> bool {
        other.as_any().downcast_ref::<TupleType>().is_some_and(|o| {
            self.elements.len() == o.elements.len()
                && self
                    .elements
                    .iter()
                    .zip(&o.elements)
                    .all(|(a, b)| a.equals(b.as_ref()))
        })
    }

    fn default_value(&self) -> Field {
        Field::Tuple(self.elements.iter().map(|e| e.default_value()).collect())
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(TupleColumn::new(
            self.elements.iter().map(|e| e.create_column()).collect(),
        ))
    }

    fn is_parametric(&self) -> bool {
        true
    }

    fn have_subtypes(&self) -> bool {
        true
    }

    fn is_comparable(&self) -> bool {
        self.elements.iter().all(|e| e.is_comparable())
    }

    fn text_can_contain_only_valid_utf8(&self) -> bool {
        self.elements.iter().all(|e| e.text_can_contain_only_valid_utf8())
    }

    fn cannot_be_stored_in_tables(&self) -> bool {
        self.elements.iter().any(|e| e.cannot_be_stored_in_tables())
    }

    fn can_be_inside_nullable(&self) -> bool {
        true
    }

    fn size_of_value_in_memory(&self) -> Option<usize> {
        self.elements
            .iter()
            .map(|e| e.size_of_value_in_memory())
            .sum()
    }

    fn maximum_size_of_value_in_memory(&self) -> Option<usize> {
        self.elements
            .iter()
            .map(|e| e.maximum_size_of_value_in_memory())
            .sum()
    }

    fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        for (i, element) in self.elements.iter().enumerate() {
            path.push(Substream::TupleElement(i + 1));
            element.enumerate_streams(callback, path);
            path.pop();
        }
    }

    fn serialize_bulk_state_prefix(
        &self,
        settings: &mut SerializeBulkSettings,
    ) -> Result<SerializeBulkState> {
        let mut children = Vec::with_capacity(self.elements.len());
        for (i, element) in self.elements.iter().enumerate() {
            children.push(in_substream(settings, Substream::TupleElement(i + 1), |s| {
                element.serialize_bulk_state_prefix(s)
            })?);
        }
        Ok(SerializeBulkState::with_children(self.name(), children))
    }

    fn serialize_bulk_state_suffix(
        &self,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        let name = self.name();
        state.check(&name)?;
        for (i, element) in self.elements.iter().enumerate() {
            let child = state.child_mut(i)?;
            in_substream(settings, Substream::TupleElement(i + 1), |s| {
                element.serialize_bulk_state_suffix(s, child)
            })?;
        }
        state.finish(&name)
    }

    fn deserialize_bulk_state_prefix(
        &self,
        settings: &mut DeserializeBulkSettings,
    ) -> Result<DeserializeBulkState> {
        let mut children = Vec::with_capacity(self.elements.len());
        for (i, element) in self.elements.iter().enumerate() {
            children.push(in_substream(settings, Substream::TupleElement(i + 1), |s| {
                element.deserialize_bulk_state_prefix(s)
            })?);
        }
        Ok(DeserializeBulkState::with_children(self.name(), children))
    }

    fn serialize_bulk_with_multiple_streams(
        &self,
        column: &dyn Column,
        offset: usize,
        limit: usize,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        let name = self.name();
        state.check(&name)?;
        let col = column::downcast_ref::<TupleColumn>(column, &name)?;
        let rows = clamp_range(col.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }
        for (i, (element, data)) in self.elements.iter().zip(col.elements()).enumerate() {
            let child = state.child_mut(i)?;
            in_substream(settings, Substream::TupleElement(i + 1), |s| {
                element.serialize_bulk_with_multiple_streams(data.as_ref(), offset, rows, s, child)
            })?;
        }
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
        let name = self.name();
        state.check(&name)?;
        let col = column::downcast_mut::<TupleColumn>(column, &name)?;
        let row = col.len();

        let mut counts = Vec::with_capacity(self.elements.len());
        let mut failure = None;
        for (i, element) in self.elements.iter().enumerate() {
            let child = state.child_mut(i)?;
            let data = col.elements_mut()[i].as_mut();
            let before = data.len();
            let result = in_substream(settings, Substream::TupleElement(i + 1), |s| {
                element.deserialize_bulk_with_multiple_streams(data, limit, s, child)
            });
            counts.push(data.len() - before);
            if let Err(e) = result {
                failure = Some(e);
                break;
            }
        }

        let rows = counts.first().copied().unwrap_or(0);
        if failure.is_none() && counts.iter().any(|&n| n != rows) {
            failure = Some(NullableError::MalformedInput {
                row,
                stream: settings.current_stream_name(),
                message: format!("elements of {} have different row counts: {:?}", name, counts),
            });
        }
        if let Some(e) = failure {
            for (data, added) in col.elements_mut().iter_mut().zip(&counts) {
                data.pop_back(*added);
            }
            return Err(e);
        }
        state.advance(rows);
        Ok(rows)
    }

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()> {
        match field {
            Field::Tuple(items) if items.len() == self.elements.len() => {
                for (ty, item) in self.elements.iter().zip(items) {
                    ty.serialize_binary_field(item, w)?;
                }
                Ok(())
            }
            other => Err(NullableError::TypeMismatch {
                expected: self.name(),
                actual: other.kind_name().to_string(),
            }),
        }
    }

    fn deserialize_binary_field(&self, r: &mut ReadBuffer) -> Result<Field> {
        let items = self
            .elements
            .iter()
            .map(|ty| ty.deserialize_binary_field(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Field::Tuple(items))
    }

    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.serialize_text_quoted(column, row, w, settings)
    }

    fn serialize_text_escaped(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        let mut rendered = Vec::new();
        self.serialize_text_quoted(column, row, &mut rendered, settings)?;
        let rendered = String::from_utf8(rendered)
            .map_err(|e| NullableError::malformed(row, e.to_string()))?;
        text::write_escaped_string(&rendered, w)
    }

    fn deserialize_text_escaped(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let unescaped = text::read_escaped_string(r, column.len())?;
        let mut inner = ReadBuffer::new(unescaped.as_bytes());
        self.deserialize_text_quoted(column, &mut inner, settings)
    }

    fn serialize_text_quoted(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.write_row(column, row, w, (b"(", b")"), |ty, col, w| {
            ty.serialize_text_quoted(col, row, w, settings)
        })
    }

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.read_row(column, r, (b'(', b')'), |ty, col, r| {
            ty.deserialize_text_quoted(col, r, settings)
        })
    }

    fn serialize_text_csv(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        let mut rendered = Vec::new();
        self.serialize_text_quoted(column, row, &mut rendered, settings)?;
        let rendered = String::from_utf8(rendered)
            .map_err(|e| NullableError::malformed(row, e.to_string()))?;
        text::write_csv_string(&rendered, w)
    }

    fn deserialize_text_csv(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let delimiter = text::csv_delimiter(&settings.csv)?;
        let field = text::read_csv_string(r, delimiter, column.len())?;
        let mut inner = ReadBuffer::new(field.as_bytes());
        self.deserialize_text_quoted(column, &mut inner, settings)
    }

    fn serialize_text_json(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.write_row(column, row, w, (b"[", b"]"), |ty, col, w| {
            ty.serialize_text_json(col, row, w, settings)
        })
    }

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.read_row(column, r, (b'[', b']'), |ty, col, r| {
            ty.deserialize_text_json(col, r, settings)
        })
    }

    /// Each row becomes a nested message, element `i` as field `i`.
    fn serialize_protobuf(
        &self,
        column: &dyn Column,
        row: usize,
        writer: &mut ProtobufWriter,
    ) -> Result<()> {
        let col = self.tuple_column(column, row)?;
        writer.write_message(|message| {
            for (i, (ty, data)) in self.elements.iter().zip(col.elements()).enumerate() {
                message.set_field_number(i as u32 + 1);
                ty.serialize_protobuf(data.as_ref(), row, message)?;
            }
            Ok(())
        })
    }
}
