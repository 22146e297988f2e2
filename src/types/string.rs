//! The variable-length `String` type.
//!
//! Bulk layout: for every row, the byte length as a LEB128 varint followed by the bytes.

use std::any::Any;
use std::io::{Read, Write};

use crate::column::{self, Column, MutableColumn, StringColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};
use crate::kernels::leb128;
use crate::types::bulk::{
    DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings, SerializeBulkState,
};
use crate::types::text;
use crate::types::{clamp_range, DataType, Field, TypeIndex};

const NAME: &str = "String";

#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl StringType {
    pub fn new() -> Self {
        StringType
    }

    fn value_at<'a>(&self, column: &'a dyn Column, row: usize) -> Result<&'a str> {
        let col = column::downcast_ref::<StringColumn>(column, NAME)?;
        column::check_row(column, row)?;
        Ok(&col.data[row])
    }

    fn push(&self, column: &mut dyn Column, value: String) -> Result<()> {
        column::downcast_mut::<StringColumn>(column, NAME)?
            .data
            .push(value);
        Ok(())
    }
}

impl DataType for StringType {
    fn name(&self) -> String {
        NAME.to_string()
    }

    fn family_name(&self) -> &'static str {
        NAME
    }

    fn type_id(&self) -> TypeIndex {
        TypeIndex::String
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn default_value(&self) -> Field {
        Field::String(String::new())
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(StringColumn::new())
    }

    fn is_comparable(&self) -> bool {
        true
    }

    fn can_be_compared_with_collation(&self) -> bool {
        true
    }

    fn can_be_inside_nullable(&self) -> bool {
        true
    }

    fn can_be_inside_low_cardinality(&self) -> bool {
        true
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
        let col = column::downcast_ref::<StringColumn>(column, NAME)?;
        let rows = clamp_range(col.data.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }
        let mut buf = Vec::new();
        for value in &col.data[offset..offset + rows] {
            leb128::encode_one(value.len() as u64, &mut buf)?;
            buf.extend_from_slice(value.as_bytes());
        }
        settings.output()?.write_all(&buf)?;
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
        let stream = settings.current_stream_name();
        let col = column::downcast_mut::<StringColumn>(column, NAME)?;
        let r = settings.input()?;
        let mut values = Vec::new();
        while values.len() < limit {
            let len = match leb128::read_u64(r)? {
                Some(len) => len,
                None => break,
            };
            let mut bytes = Vec::new();
            (&mut *r).take(len).read_to_end(&mut bytes)?;
            if (bytes.len() as u64) < len {
                return Err(NullableError::UnexpectedEof(format!(
                    "String value in '{}'",
                    stream
                )));
            }
            let value = String::from_utf8(bytes).map_err(|e| NullableError::MalformedInput {
                row: col.data.len() + values.len(),
                stream: stream.clone(),
                message: e.to_string(),
            })?;
            values.push(value);
        }
        let rows = values.len();
        col.data.extend(values);
        state.advance(rows);
        Ok(rows)
    }

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()> {
        match field {
            Field::String(value) => {
                leb128::write_u64(value.len() as u64, w)?;
                w.write_all(value.as_bytes())?;
                Ok(())
            }
            other => Err(NullableError::TypeMismatch {
                expected: NAME.to_string(),
                actual: other.kind_name().to_string(),
            }),
        }
    }

    fn deserialize_binary_field(&self, r: &mut ReadBuffer) -> Result<Field> {
        let (len, consumed) = leb128::decode_one::<u64>(r.remaining())?;
        r.advance(consumed);
        let bytes = r.read_exact(len as usize, NAME)?;
        let value = std::str::from_utf8(bytes).map_err(|e| NullableError::malformed(0, e.to_string()))?;
        Ok(Field::String(value.to_string()))
    }

    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        w.write_all(self.value_at(column, row)?.as_bytes())?;
        Ok(())
    }

    fn serialize_text_escaped(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        text::write_escaped_string(self.value_at(column, row)?, w)
    }

    fn deserialize_text_escaped(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        let value = text::read_escaped_string(r, column.len())?;
        self.push(column, value)
    }

    fn serialize_text_quoted(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        text::write_quoted_string(self.value_at(column, row)?, w)
    }

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        let value = text::read_quoted_string(r, column.len())?;
        self.push(column, value)
    }

    fn serialize_text_csv(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        text::write_csv_string(self.value_at(column, row)?, w)
    }

    fn deserialize_text_csv(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let delimiter = text::csv_delimiter(&settings.csv)?;
        let value = text::read_csv_string(r, delimiter, column.len())?;
        self.push(column, value)
    }

    fn serialize_text_json(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        text::write_json_string(self.value_at(column, row)?, w)
    }

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        let value = text::read_json_string(r, column.len())?;
        self.push(column, value)
    }

    fn serialize_protobuf(
        &self,
        column: &dyn Column,
        row: usize,
        writer: &mut ProtobufWriter,
    ) -> Result<()> {
        writer.write_bytes(self.value_at(column, row)?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenceEncoding;
    use crate::io::MemoryStreams;

    #[test]
    fn test_string_bulk_layout() {
        let ty = StringType::new();
        let column = StringColumn {
            data: vec!["ab".to_string(), String::new()],
        };
        let mut streams = MemoryStreams::new();
        {
            let mut settings =
                SerializeBulkSettings::new(&mut streams, "s", PresenceEncoding::Bytes);
            let mut state = ty.serialize_bulk_state_prefix(&mut settings).unwrap();
            ty.serialize_bulk_with_multiple_streams(&column, 0, 2, &mut settings, &mut state)
                .unwrap();
            ty.serialize_bulk_state_suffix(&mut settings, &mut state).unwrap();
        }
        assert_eq!(streams.bytes("s"), Some(&[2, b'a', b'b', 0][..]));
    }

    #[test]
    fn test_binary_field_round_trip() {
        let ty = StringType::new();
        let mut out = Vec::new();
        ty.serialize_binary_field(&Field::from("héllo"), &mut out).unwrap();
        let mut r = ReadBuffer::new(&out);
        assert_eq!(ty.deserialize_binary_field(&mut r).unwrap(), Field::from("héllo"));
        assert!(r.eof());
    }
}
