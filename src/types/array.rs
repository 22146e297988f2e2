//! `Array(T)`: per-row element counts plus the flattened elements.
//!
//! Sub-streams: `ArraySizes` (one little-endian `u64` per row, named `.size<level>`)
//! followed by whatever `T` writes under `ArrayElements`.

use std::any::Any;
use std::io::Write;

use crate::column::composite::total_size;
use crate::column::{self, ArrayColumn, Column, MutableColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};
use crate::kernels::leb128;
use crate::types::bulk::{
    in_substream, DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings,
    SerializeBulkState,
};
use crate::types::number::read_pod_values;
use crate::types::substream::{Substream, SubstreamPath};
use crate::types::text;
use crate::types::{clamp_range, DataType, DataTypePtr, Field, TypeIndex};

#[derive(Debug, Clone)]
pub struct ArrayType {
    nested: DataTypePtr,
}

/// Elements handed to the nested bulk reader per call.
const ELEMENT_BLOCK_ROWS: usize = 1 << 16;

type WriteOne<'a> =
    dyn Fn(&dyn DataType, &dyn Column, usize, &mut dyn Write) -> Result<()> + 'a;
type ReadOne<'a> =
    dyn Fn(&dyn DataType, &mut dyn Column, &mut ReadBuffer) -> Result<()> + 'a;

impl ArrayType {
    pub fn new(nested: DataTypePtr) -> Self {
        Self { nested }
    }

    pub fn nested(&self) -> &DataTypePtr {
        &self.nested
    }

    fn write_elements(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        write_one: &WriteOne<'_>,
    ) -> Result<()> {
        let col = column::downcast_ref::<ArrayColumn>(column, &self.name())?;
        column::check_row(column, row)?;
        let start = col.offset_at(row) as usize;
        let end = start + col.size_at(row) as usize;
        w.write_all(b"[")?;
        for i in start..end {
            if i > start {
                w.write_all(b",")?;
            }
            write_one(self.nested.as_ref(), col.data(), i, w)?;
        }
        w.write_all(b"]")?;
        Ok(())
    }

    /// Parses `[e1,e2,...]`. On failure no element and no row is appended.
    fn read_elements(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        read_one: &ReadOne<'_>,
    ) -> Result<()> {
        let name = self.name();
        let col = column::downcast_mut::<ArrayColumn>(column, &name)?;
        let row = col.len();
        let before = col.data().len();
        let parsed = (|| -> Result<()> {
            r.expect_byte(b'[', row)?;
            r.skip_ascii_whitespace();
            if r.peek() == Some(b']') {
                r.advance(1);
                return Ok(());
            }
            loop {
                r.skip_ascii_whitespace();
                read_one(self.nested.as_ref(), col.data_mut(), r)?;
                r.skip_ascii_whitespace();
                match r.next_byte() {
                    Some(b',') => continue,
                    Some(b']') => return Ok(()),
                    _ => {
                        return Err(NullableError::malformed(
                            row,
                            format!("expected ',' or ']' in {}", name),
                        ))
                    }
                }
            }
        })();
        let added = col.data().len() - before;
        if let Err(e) = parsed {
            col.data_mut().pop_back(added);
            return Err(e);
        }
        col.push_sizes(&[added as u64])
    }

    fn write_csv(
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
}

fn write_quoted(
    ty: &dyn DataType,
    col: &dyn Column,
    row: usize,
    w: &mut dyn Write,
    settings: &FormatSettings,
) -> Result<()> {
    ty.serialize_text_quoted(col, row, w, settings)
}

impl DataType for ArrayType {
    fn name(&self) -> String {
        format!("Array({})", self.nested.name())
    }

    fn family_name(&self) -> &'static str {
        "Array"
    }

    fn type_id(&self) -> TypeIndex {
        TypeIndex::Array
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DataType) -> bool {
        other
            .as_any()
            .downcast_ref::<ArrayType>()
            .is_some_and(|o| self.nested.equals(o.nested.as_ref()))
    }

    fn default_value(&self) -> Field {
        Field::Array(Vec::new())
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(ArrayColumn::new(self.nested.create_column()))
    }

    fn is_parametric(&self) -> bool {
        true
    }

    fn have_subtypes(&self) -> bool {
        true
    }

    fn is_comparable(&self) -> bool {
        self.nested.is_comparable()
    }

    fn text_can_contain_only_valid_utf8(&self) -> bool {
        self.nested.text_can_contain_only_valid_utf8()
    }

    fn cannot_be_stored_in_tables(&self) -> bool {
        self.nested.cannot_be_stored_in_tables()
    }

    fn can_be_inside_nullable(&self) -> bool {
        true
    }

    fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        path.push(Substream::ArraySizes);
        callback(path);
        path.replace_last(Substream::ArrayElements);
        self.nested.enumerate_streams(callback, path);
        path.pop();
    }

    fn serialize_bulk_state_prefix(
        &self,
        settings: &mut SerializeBulkSettings,
    ) -> Result<SerializeBulkState> {
        let child = in_substream(settings, Substream::ArrayElements, |s| {
            self.nested.serialize_bulk_state_prefix(s)
        })?;
        Ok(SerializeBulkState::with_children(self.name(), vec![child]))
    }

    fn serialize_bulk_state_suffix(
        &self,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        let name = self.name();
        state.check(&name)?;
        let child = state.child_mut(0)?;
        in_substream(settings, Substream::ArrayElements, |s| {
            self.nested.serialize_bulk_state_suffix(s, child)
        })?;
        state.finish(&name)
    }

    fn deserialize_bulk_state_prefix(
        &self,
        settings: &mut DeserializeBulkSettings,
    ) -> Result<DeserializeBulkState> {
        let child = in_substream(settings, Substream::ArrayElements, |s| {
            self.nested.deserialize_bulk_state_prefix(s)
        })?;
        Ok(DeserializeBulkState::with_children(self.name(), vec![child]))
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
        let col = column::downcast_ref::<ArrayColumn>(column, &name)?;
        let rows = clamp_range(col.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }

        let sizes: Vec<u64> = (offset..offset + rows).map(|row| col.size_at(row)).collect();
        in_substream(settings, Substream::ArraySizes, |s| {
            s.output()?.write_all(bytemuck::cast_slice(&sizes))?;
            Ok(())
        })?;

        let start = col.offset_at(offset) as usize;
        let end = col.offset_at(offset + rows) as usize;
        let child = state.child_mut(0)?;
        in_substream(settings, Substream::ArrayElements, |s| {
            self.nested
                .serialize_bulk_with_multiple_streams(col.data(), start, end - start, s, child)
        })?;
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
        let col = column::downcast_mut::<ArrayColumn>(column, &name)?;

        let sizes = in_substream(settings, Substream::ArraySizes, |s| {
            let what = format!("array sizes in '{}'", s.current_stream_name());
            read_pod_values::<u64>(s.input()?, limit, &what)
        })?;
        if sizes.is_empty() {
            return Ok(0);
        }

        let total = total_size(&sizes)
            .and_then(|total| usize::try_from(total).ok())
            .ok_or_else(|| {
                NullableError::malformed(col.len(), format!("array sizes of {} overflow", name))
            })?;
        let before = col.data().len();
        let child = state.child_mut(0)?;
        // A run of empty arrays may have no element sub-stream at all.
        let mut read = 0;
        let mut outcome = Ok(());
        while read < total {
            let want = (total - read).min(ELEMENT_BLOCK_ROWS);
            let data = col.data_mut();
            match in_substream(settings, Substream::ArrayElements, |s| {
                self.nested
                    .deserialize_bulk_with_multiple_streams(data, want, s, child)
            }) {
                Ok(got) => {
                    read += got;
                    if got < want {
                        break;
                    }
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        let read = outcome.map(|()| read);
        let appended = col.data().len() - before;
        match read {
            Ok(read) if read == total => {}
            Ok(read) => {
                col.data_mut().pop_back(appended);
                return Err(NullableError::UnexpectedEof(format!(
                    "{} elements of {}, got {}",
                    total, name, read
                )));
            }
            Err(e) => {
                col.data_mut().pop_back(appended);
                return Err(e);
            }
        }
        col.push_sizes(&sizes)?;
        state.advance(sizes.len());
        Ok(sizes.len())
    }

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()> {
        match field {
            Field::Array(items) => {
                leb128::write_u64(items.len() as u64, w)?;
                for item in items {
                    self.nested.serialize_binary_field(item, w)?;
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
        let (count, consumed) = leb128::decode_one::<u64>(r.remaining())?;
        r.advance(consumed);
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(self.nested.deserialize_binary_field(r)?);
        }
        Ok(Field::Array(items))
    }

    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.write_elements(column, row, w, &|ty, col, i, w| write_quoted(ty, col, i, w, settings))
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
        self.write_elements(column, row, w, &|ty, col, i, w| write_quoted(ty, col, i, w, settings))
    }

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.read_elements(column, r, &|ty, col, r| ty.deserialize_text_quoted(col, r, settings))
    }

    fn serialize_text_csv(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.write_csv(column, row, w, settings)
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
        self.write_elements(column, row, w, &|ty, col, i, w| {
            ty.serialize_text_json(col, i, w, settings)
        })
    }

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.read_elements(column, r, &|ty, col, r| ty.deserialize_text_json(col, r, settings))
    }

    fn serialize_protobuf(
        &self,
        column: &dyn Column,
        row: usize,
        writer: &mut ProtobufWriter,
    ) -> Result<()> {
        let col = column::downcast_ref::<ArrayColumn>(column, &self.name())?;
        column::check_row(column, row)?;
        let start = col.offset_at(row) as usize;
        let end = start + col.size_at(row) as usize;
        for i in start..end {
            self.nested.serialize_protobuf(col.data(), i, writer)?;
        }
        Ok(())
    }
}
