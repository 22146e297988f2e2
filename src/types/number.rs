//! Fixed-width numeric types, one generic descriptor over every native number.
//!
//! The bulk codec is the raw little-endian value array, written and read through
//! `bytemuck` casts. Text codecs use decimal literals; floats spell non-finite values
//! as `nan`, `inf` and `-inf`.

use bytemuck::Pod;
use num_traits::NumCast;
use std::any::Any;
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::str::FromStr;

use crate::column::{self, Column, MutableColumn, NumberColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};
use crate::kernels::bitpack::read_up_to;
use crate::types::bulk::{
    DeserializeBulkSettings, DeserializeBulkState, SerializeBulkSettings, SerializeBulkState,
};
use crate::types::text::{csv_delimiter, is_csv_field_end, read_number_token};
use crate::types::{clamp_range, DataType, Field, TypeIndex};

/// Rows decoded per read call in bulk passes.
pub(crate) const READ_BLOCK_ROWS: usize = 8192;

pub trait NativeNumber:
    Pod + Default + PartialEq + fmt::Debug + fmt::Display + FromStr + NumCast + Send + Sync + 'static
{
    const NAME: &'static str;
    const TYPE_INDEX: TypeIndex;
    const IS_FLOAT: bool;

    fn to_field(self) -> Field;

    fn write_protobuf(self, writer: &mut ProtobufWriter) -> Result<()>;

    fn from_field(field: &Field) -> Result<Self> {
        let cast: Option<Self> = match field {
            Field::Int64(v) => NumCast::from(*v),
            Field::UInt64(v) => NumCast::from(*v),
            Field::Float64(v) if Self::IS_FLOAT || v.fract() == 0.0 => NumCast::from(*v),
            _ => None,
        };
        cast.ok_or_else(|| NullableError::TypeMismatch {
            expected: Self::NAME.to_string(),
            actual: format!("{} {}", field.kind_name(), field),
        })
    }

    fn format_text(self) -> String {
        match self.to_field() {
            Field::Float64(v) if v.is_nan() => "nan".to_string(),
            Field::Float64(v) if v.is_infinite() => {
                (if v > 0.0 { "inf" } else { "-inf" }).to_string()
            }
            _ => self.to_string(),
        }
    }

    fn parse_text(token: &str, row: usize) -> Result<Self> {
        token.parse::<Self>().map_err(|_| {
            NullableError::malformed(row, format!("cannot parse '{}' as {}", token, Self::NAME))
        })
    }
}

macro_rules! number_kind {
    (is_float float32) => { true };
    (is_float float64) => { true };
    (is_float $other:ident) => { false };
    (to_field signed, $v:expr) => { Field::Int64($v as i64) };
    (to_field unsigned, $v:expr) => { Field::UInt64($v as u64) };
    (to_field float32, $v:expr) => { Field::Float64($v as f64) };
    (to_field float64, $v:expr) => { Field::Float64($v) };
    (protobuf signed, $v:expr, $w:expr) => { $w.write_sint($v as i64) };
    (protobuf unsigned, $v:expr, $w:expr) => { $w.write_uint($v as u64) };
    (protobuf float32, $v:expr, $w:expr) => { $w.write_float($v) };
    (protobuf float64, $v:expr, $w:expr) => { $w.write_double($v) };
}

macro_rules! native_numbers {
    ($($t:ty => $index:ident, $alias:ident, $kind:ident;)+) => {
        $(
            impl NativeNumber for $t {
                const NAME: &'static str = stringify!($index);
                const TYPE_INDEX: TypeIndex = TypeIndex::$index;
                const IS_FLOAT: bool = number_kind!(is_float $kind);

                fn to_field(self) -> Field {
                    number_kind!(to_field $kind, self)
                }

                fn write_protobuf(self, writer: &mut ProtobufWriter) -> Result<()> {
                    number_kind!(protobuf $kind, self, writer)
                }
            }

            pub type $alias = NumberType<$t>;
        )+
    };
}

native_numbers! {
    u8 => UInt8, UInt8Type, unsigned;
    u16 => UInt16, UInt16Type, unsigned;
    u32 => UInt32, UInt32Type, unsigned;
    u64 => UInt64, UInt64Type, unsigned;
    i8 => Int8, Int8Type, signed;
    i16 => Int16, Int16Type, signed;
    i32 => Int32, Int32Type, signed;
    i64 => Int64, Int64Type, signed;
    f32 => Float32, Float32Type, float32;
    f64 => Float64, Float64Type, float64;
}

/// Reads up to `limit` plain-old-data values. A trailing partial value is an error.
pub(crate) fn read_pod_values<T: Pod>(r: &mut dyn Read, limit: usize, what: &str) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    let mut out = Vec::with_capacity(limit.min(READ_BLOCK_ROWS));
    let mut buf = vec![0u8; limit.min(READ_BLOCK_ROWS) * size];
    while out.len() < limit {
        let rows = (limit - out.len()).min(READ_BLOCK_ROWS);
        let bytes = &mut buf[..rows * size];
        let got = read_up_to(r, bytes)?;
        if got % size != 0 {
            return Err(NullableError::UnexpectedEof(what.to_string()));
        }
        out.extend(
            bytes[..got]
                .chunks_exact(size)
                .map(bytemuck::pod_read_unaligned::<T>),
        );
        if got < bytes.len() {
            break;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberType<T: NativeNumber> {
    _marker: PhantomData<T>,
}

impl<T: NativeNumber> NumberType<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    fn value_at(&self, column: &dyn Column, row: usize) -> Result<T> {
        let col = column::downcast_ref::<NumberColumn<T>>(column, T::NAME)?;
        column::check_row(column, row)?;
        Ok(col.data[row])
    }

    fn push_parsed(&self, column: &mut dyn Column, token: &str) -> Result<()> {
        let col = column::downcast_mut::<NumberColumn<T>>(column, T::NAME)?;
        let value = T::parse_text(token, col.data.len())?;
        col.data.push(value);
        Ok(())
    }

    /// Reads a number that may be wrapped in double quotes.
    fn read_maybe_quoted(&self, column: &mut dyn Column, r: &mut ReadBuffer) -> Result<()> {
        let row = column.len();
        let quoted = r.peek() == Some(b'"');
        if quoted {
            r.advance(1);
        }
        let token = read_number_token(r, row)?;
        if quoted {
            r.expect_byte(b'"', row)?;
        }
        self.push_parsed(column, token)
    }

    fn write_plain(&self, column: &dyn Column, row: usize, w: &mut dyn Write) -> Result<()> {
        let value = self.value_at(column, row)?;
        w.write_all(value.format_text().as_bytes())?;
        Ok(())
    }
}

impl<T: NativeNumber> DataType for NumberType<T> {
    fn name(&self) -> String {
        T::NAME.to_string()
    }

    fn family_name(&self) -> &'static str {
        T::NAME
    }

    fn type_id(&self) -> TypeIndex {
        T::TYPE_INDEX
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn default_value(&self) -> Field {
        T::default().to_field()
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(NumberColumn::<T>::new())
    }

    fn is_comparable(&self) -> bool {
        true
    }

    fn is_summable(&self) -> bool {
        true
    }

    fn can_be_used_in_boolean_context(&self) -> bool {
        true
    }

    fn can_be_used_as_version(&self) -> bool {
        !T::IS_FLOAT
    }

    fn text_can_contain_only_valid_utf8(&self) -> bool {
        true
    }

    fn should_align_right_in_pretty_formats(&self) -> bool {
        true
    }

    fn can_be_inside_nullable(&self) -> bool {
        true
    }

    fn can_be_inside_low_cardinality(&self) -> bool {
        true
    }

    fn size_of_value_in_memory(&self) -> Option<usize> {
        Some(std::mem::size_of::<T>())
    }

    fn serialize_bulk_with_multiple_streams(
        &self,
        column: &dyn Column,
        offset: usize,
        limit: usize,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        state.check(T::NAME)?;
        let col = column::downcast_ref::<NumberColumn<T>>(column, T::NAME)?;
        let rows = clamp_range(col.data.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }
        let values = &col.data[offset..offset + rows];
        settings.output()?.write_all(bytemuck::cast_slice(values))?;
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
        state.check(T::NAME)?;
        let col = column::downcast_mut::<NumberColumn<T>>(column, T::NAME)?;
        let what = format!("{} values in '{}'", T::NAME, settings.current_stream_name());
        let values = read_pod_values::<T>(settings.input()?, limit, &what)?;
        let rows = values.len();
        col.data.extend(values);
        state.advance(rows);
        Ok(rows)
    }

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()> {
        let value = T::from_field(field)?;
        w.write_all(bytemuck::bytes_of(&value))?;
        Ok(())
    }

    fn deserialize_binary_field(&self, r: &mut ReadBuffer) -> Result<Field> {
        let bytes = r.read_exact(std::mem::size_of::<T>(), T::NAME)?;
        Ok(bytemuck::pod_read_unaligned::<T>(bytes).to_field())
    }

    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.write_plain(column, row, w)
    }

    fn serialize_text_escaped(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.write_plain(column, row, w)
    }

    fn deserialize_text_escaped(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        let token = read_number_token(r, column.len())?;
        self.push_parsed(column, token)
    }

    fn serialize_text_quoted(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.write_plain(column, row, w)
    }

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        let token = read_number_token(r, column.len())?;
        self.push_parsed(column, token)
    }

    fn serialize_text_csv(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.write_plain(column, row, w)
    }

    fn deserialize_text_csv(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let delimiter = csv_delimiter(&settings.csv)?;
        let row = column.len();
        if is_csv_field_end(r.peek(), delimiter) {
            return Err(NullableError::malformed(
                row,
                format!("empty CSV field for {}", T::NAME),
            ));
        }
        self.read_maybe_quoted(column, r)
    }

    fn serialize_text_json(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        let value = self.value_at(column, row)?;
        let quote_integer = !T::IS_FLOAT
            && std::mem::size_of::<T>() == 8
            && settings.json.quote_64bit_integers;
        let non_finite = matches!(value.to_field(), Field::Float64(v) if !v.is_finite());
        if quote_integer || non_finite {
            write!(w, "\"{}\"", value.format_text())?;
        } else {
            w.write_all(value.format_text().as_bytes())?;
        }
        Ok(())
    }

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        _settings: &FormatSettings,
    ) -> Result<()> {
        self.read_maybe_quoted(column, r)
    }

    fn serialize_protobuf(
        &self,
        column: &dyn Column,
        row: usize,
        writer: &mut ProtobufWriter,
    ) -> Result<()> {
        self.value_at(column, row)?.write_protobuf(writer)
    }
}
