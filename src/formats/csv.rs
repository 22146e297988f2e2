//! CSV rows: fields separated by `csv.delimiter`, NULL written as `\N`.

use std::io::Write;

use crate::column::MutableColumn;
use crate::config::FormatSettings;
use crate::error::Result;
use crate::formats::{read_rows, write_rows, RowCodec};
use crate::types::text::csv_delimiter;
use crate::types::DataTypePtr;

/// Writes every row of `columns` and returns the row count.
pub fn write_csv_rows(
    types: &[DataTypePtr],
    columns: &[MutableColumn],
    w: &mut dyn Write,
    settings: &FormatSettings,
) -> Result<usize> {
    let delimiter = csv_delimiter(&settings.csv)?;
    write_rows(RowCodec::Csv, delimiter, types, columns, w, settings)
}

/// Appends every row of `input` to `columns` and returns the number of rows read.
/// On error the columns keep the rows before the failing one.
pub fn read_csv_rows(
    types: &[DataTypePtr],
    columns: &mut [MutableColumn],
    input: &[u8],
    settings: &FormatSettings,
) -> Result<usize> {
    let delimiter = csv_delimiter(&settings.csv)?;
    read_rows(RowCodec::Csv, delimiter, types, columns, input, settings)
}
