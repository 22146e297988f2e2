//! TabSeparated rows: escaped text fields separated by tabs, NULL written as `\N`.

use std::io::Write;

use crate::column::MutableColumn;
use crate::config::FormatSettings;
use crate::error::Result;
use crate::formats::{read_rows, write_rows, RowCodec};
use crate::types::DataTypePtr;

const TAB: u8 = b'\t';

pub fn write_tsv_rows(
    types: &[DataTypePtr],
    columns: &[MutableColumn],
    w: &mut dyn Write,
    settings: &FormatSettings,
) -> Result<usize> {
    write_rows(RowCodec::Escaped, TAB, types, columns, w, settings)
}

pub fn read_tsv_rows(
    types: &[DataTypePtr],
    columns: &mut [MutableColumn],
    input: &[u8],
    settings: &FormatSettings,
) -> Result<usize> {
    read_rows(RowCodec::Escaped, TAB, types, columns, input, settings)
}
