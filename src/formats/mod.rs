//! Row-oriented text formats.
//!
//! A row is one field per column, separated by a delimiter byte and terminated by a
//! line break. Each field goes through the column type's own per-row text codec, so a
//! `Nullable` column gets its format's sentinel handling for free.
//!
//! Reading is row-atomic: if any field of a row fails to decode, the values already
//! appended for that row are popped from the earlier columns before the error is
//! returned.

use std::io::Write;

use crate::column::{Column, MutableColumn};
use crate::config::FormatSettings;
use crate::error::{NullableError, Result};
use crate::io::ReadBuffer;
use crate::types::DataTypePtr;

pub mod csv;
pub mod tsv;

pub use csv::{read_csv_rows, write_csv_rows};
pub use tsv::{read_tsv_rows, write_tsv_rows};

/// Which per-row text codec a format drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowCodec {
    Escaped,
    Csv,
}

impl RowCodec {
    fn write_field(
        self,
        ty: &DataTypePtr,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        match self {
            RowCodec::Escaped => ty.serialize_text_escaped(column, row, w, settings),
            RowCodec::Csv => ty.serialize_text_csv(column, row, w, settings),
        }
    }

    fn read_field(
        self,
        ty: &DataTypePtr,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        match self {
            RowCodec::Escaped => ty.deserialize_text_escaped(column, r, settings),
            RowCodec::Csv => ty.deserialize_text_csv(column, r, settings),
        }
    }
}

/// Fails unless there is one type per column and all columns have the same length.
/// Returns that length.
fn check_shape(types: &[DataTypePtr], lens: impl Iterator<Item = usize>) -> Result<usize> {
    let lens: Vec<usize> = lens.collect();
    if lens.len() != types.len() {
        return Err(NullableError::ContractViolation(format!(
            "{} types given for {} columns",
            types.len(),
            lens.len()
        )));
    }
    let rows = lens.first().copied().unwrap_or(0);
    if lens.iter().any(|&len| len != rows) {
        return Err(NullableError::ContractViolation(format!(
            "columns have different lengths: {:?}",
            lens
        )));
    }
    Ok(rows)
}

pub(crate) fn write_rows(
    codec: RowCodec,
    delimiter: u8,
    types: &[DataTypePtr],
    columns: &[MutableColumn],
    w: &mut dyn Write,
    settings: &FormatSettings,
) -> Result<usize> {
    let rows = check_shape(types, columns.iter().map(|c| c.len()))?;
    for row in 0..rows {
        for (i, (ty, column)) in types.iter().zip(columns).enumerate() {
            if i > 0 {
                w.write_all(&[delimiter])?;
            }
            codec.write_field(ty, column.as_ref(), row, w, settings)?;
        }
        w.write_all(b"\n")?;
    }
    Ok(rows)
}

pub(crate) fn read_rows(
    codec: RowCodec,
    delimiter: u8,
    types: &[DataTypePtr],
    columns: &mut [MutableColumn],
    input: &[u8],
    settings: &FormatSettings,
) -> Result<usize> {
    let start_rows = check_shape(types, columns.iter().map(|c| c.len()))?;
    if types.is_empty() {
        return Ok(0);
    }
    let mut r = ReadBuffer::new(input);
    let mut rows = 0;
    while !r.eof() {
        read_row(codec, delimiter, types, columns, &mut r, start_rows + rows, settings)?;
        rows += 1;
    }
    Ok(rows)
}

fn read_row(
    codec: RowCodec,
    delimiter: u8,
    types: &[DataTypePtr],
    columns: &mut [MutableColumn],
    r: &mut ReadBuffer,
    row: usize,
    settings: &FormatSettings,
) -> Result<()> {
    for i in 0..types.len() {
        let field = (|| -> Result<()> {
            if i > 0 {
                r.expect_byte(delimiter, row)?;
            }
            codec.read_field(&types[i], columns[i].as_mut(), r, settings)?;
            if i + 1 == types.len() {
                expect_line_end(r, row)?;
            }
            Ok(())
        })();
        if let Err(e) = field {
            // Truncate every column back to `row` rows, including one whose value decoded
            // but was followed by a bad terminator.
            for column in columns.iter_mut() {
                if column.len() > row {
                    column.pop_back(column.len() - row);
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

fn expect_line_end(r: &mut ReadBuffer, row: usize) -> Result<()> {
    match r.peek() {
        None => Ok(()),
        Some(b'\n') => {
            r.advance(1);
            Ok(())
        }
        Some(b'\r') if r.peek_at(1) == Some(b'\n') => {
            r.advance(2);
            Ok(())
        }
        Some(other) => Err(NullableError::malformed(
            row,
            format!("expected end of row, found byte 0x{:02x}", other),
        )),
    }
}
