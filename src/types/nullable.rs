//! The `Nullable(T)` wrapper.
//!
//! `NullableType` holds the nested descriptor and delegates to it. It overrides only
//! what nullability changes:
//!
//! * identity, default value (`NULL`), equality and the `1 + T` size accounting;
//! * every text codec, which checks the format's NULL sentinel before handing the row
//!   to `T`;
//! * the bulk protocol, which writes the presence flags to the `.null` sub-stream and
//!   the nested values (including the placeholders stored for NULL rows) to `T`'s own
//!   sub-streams.
//!
//! | Format    | Written for NULL       | Read as NULL                                       |
//! |-----------|------------------------|----------------------------------------------------|
//! | escaped   | `\N`                   | `\N` followed by tab, line break or end of input   |
//! | quoted    | `NULL`                 | `NULL` in any case, not followed by `[A-Za-z0-9_]` |
//! | CSV       | `\N`                   | `\N` as the whole unquoted field; bare `NULL` too if enabled |
//! | JSON      | `null`                 | `null`, not followed by `[A-Za-z0-9_]`             |
//! | XML       | `xml.null_text`        | (write only)                                       |
//! | text      | `NULL`                 | (write only)                                       |
//! | protobuf  | nothing (absent field) | (write only)                                       |
//!
//! A sentinel match consumes exactly the sentinel. Anything else is decoded by `T` from
//! the original position; if `T` fails, the input position, the nested column and the
//! presence map are all left as they were.
//!
//! The single-value binary codec (`serialize_binary_field` / `deserialize_binary_field`)
//! carries no presence marker and delegates straight to `T`: its callers already know
//! whether the value is NULL. Writing a `NULL` field through it writes `T`'s default
//! value as a placeholder. The row-level binary codec (`serialize_binary` /
//! `deserialize_binary`) does carry presence: one flag byte (`1` = NULL), followed by
//! the nested value only when the row is present.

use log::{debug, trace};
use std::any::Any;
use std::io::Write;
use std::sync::Arc;

use crate::column::{self, Column, MutableColumn, NullableColumn};
use crate::config::{FormatSettings, PresenceEncoding};
use crate::error::{NullableError, Result};
use crate::io::{ProtobufWriter, ReadBuffer};
use crate::kernels::bitpack::{BitCarry, BitSource};
use crate::types::bulk::{
    in_substream, DeserializeBulkSettings, DeserializeBulkState, DeserializeLocal,
    SerializeBulkSettings, SerializeBulkState, SerializeLocal,
};
use crate::types::number::read_pod_values;
use crate::types::substream::{Substream, SubstreamPath};
use crate::types::text::{
    csv_delimiter, is_csv_field_end, is_escaped_field_end, is_ident_byte, write_xml_escaped,
};
use crate::types::{clamp_range, DataType, DataTypePtr, Field, TypeIndex};

const ESCAPED_NULL: &[u8] = b"\\N";
const QUOTED_NULL: &[u8] = b"NULL";
const JSON_NULL: &[u8] = b"null";

#[derive(Debug, Clone)]
pub struct NullableType {
    nested: DataTypePtr,
}

impl NullableType {
    /// Fails with `ContractViolation` if `nested` cannot be wrapped, in particular if it
    /// is itself `Nullable`.
    pub fn new(nested: DataTypePtr) -> Result<Self> {
        if !nested.can_be_inside_nullable() {
            return Err(NullableError::ContractViolation(format!(
                "Nested type {} cannot be inside Nullable type",
                nested.name()
            )));
        }
        Ok(Self { nested })
    }

    pub fn nested(&self) -> &DataTypePtr {
        &self.nested
    }

    fn nullable_column<'a>(&self, column: &'a dyn Column) -> Result<&'a NullableColumn> {
        column::downcast_ref::<NullableColumn>(column, &self.name())
    }

    fn nullable_column_mut<'a>(&self, column: &'a mut dyn Column) -> Result<&'a mut NullableColumn> {
        column::downcast_mut::<NullableColumn>(column, &self.name())
    }

    /// Writes `sentinel` for a NULL row, otherwise lets `encode` write the nested value.
    fn serialize_guarded(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        sentinel: &[u8],
        encode: impl FnOnce(&dyn DataType, &dyn Column, &mut dyn Write) -> Result<()>,
    ) -> Result<()> {
        let col = self.nullable_column(column)?;
        column::check_row(column, row)?;
        if col.is_null_at(row) {
            w.write_all(sentinel)?;
            return Ok(());
        }
        encode(self.nested.as_ref(), col.nested(), w)
    }

    /// Appends a NULL row if a sentinel of `sentinel_len` bytes was recognised,
    /// otherwise decodes the row with `decode`. A failed decode restores the input
    /// position and leaves the column untouched.
    fn deserialize_guarded(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        sentinel_len: Option<usize>,
        decode: impl FnOnce(&dyn DataType, &mut dyn Column, &mut ReadBuffer) -> Result<()>,
    ) -> Result<()> {
        let col = self.nullable_column_mut(column)?;
        if let Some(len) = sentinel_len {
            col.ensure_usable("")?;
            r.advance(len);
            col.push_null();
            return Ok(());
        }
        let start = r.position();
        let nested = self.nested.as_ref();
        let result = col.push_with(|nested_col| decode(nested, nested_col, r));
        if result.is_err() {
            r.set_position(start);
        }
        result
    }

    fn encoding_mismatch(&self, encoding: PresenceEncoding) -> NullableError {
        NullableError::StateMismatch {
            expected: format!("{} with {:?} presence encoding", self.name(), encoding),
            actual: self.name(),
        }
    }
}

//==================================================================================
// Sentinel detection. Each returns the sentinel length on a match and never consumes.
//==================================================================================

fn escaped_null(r: &ReadBuffer) -> Option<usize> {
    (r.starts_with(ESCAPED_NULL) && is_escaped_field_end(r.peek_at(ESCAPED_NULL.len())))
        .then_some(ESCAPED_NULL.len())
}

fn quoted_null(r: &ReadBuffer) -> Option<usize> {
    let matched = r.starts_with_ignore_ascii_case(QUOTED_NULL)
        && !r.peek_at(QUOTED_NULL.len()).is_some_and(is_ident_byte);
    matched.then_some(QUOTED_NULL.len())
}

fn csv_null(r: &ReadBuffer, settings: &FormatSettings) -> Result<Option<usize>> {
    let delimiter = csv_delimiter(&settings.csv)?;
    if r.starts_with(ESCAPED_NULL) && is_csv_field_end(r.peek_at(ESCAPED_NULL.len()), delimiter) {
        return Ok(Some(ESCAPED_NULL.len()));
    }
    if settings.csv.unquoted_null_literal_as_null
        && r.starts_with_ignore_ascii_case(QUOTED_NULL)
        && is_csv_field_end(r.peek_at(QUOTED_NULL.len()), delimiter)
    {
        return Ok(Some(QUOTED_NULL.len()));
    }
    Ok(None)
}

fn json_null(r: &ReadBuffer) -> Option<usize> {
    let matched =
        r.starts_with(JSON_NULL) && !r.peek_at(JSON_NULL.len()).is_some_and(is_ident_byte);
    matched.then_some(JSON_NULL.len())
}

/// Attaches the presence sub-stream name to a decoding error raised without one.
fn with_stream(error: NullableError, stream: &str) -> NullableError {
    match error {
        NullableError::MalformedInput {
            row,
            stream: empty,
            message,
        } if empty.is_empty() => NullableError::MalformedInput {
            row,
            stream: stream.to_string(),
            message,
        },
        other => other,
    }
}

impl DataType for NullableType {
    fn name(&self) -> String {
        format!("Nullable({})", self.nested.name())
    }

    fn family_name(&self) -> &'static str {
        "Nullable"
    }

    fn type_id(&self) -> TypeIndex {
        TypeIndex::Nullable
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn DataType) -> bool {
        other
            .as_any()
            .downcast_ref::<NullableType>()
            .is_some_and(|o| self.nested.equals(o.nested.as_ref()))
    }

    fn default_value(&self) -> Field {
        Field::Null
    }

    fn create_column(&self) -> MutableColumn {
        Box::new(NullableColumn::new(self.nested.create_column()))
    }

    //==============================================================================
    // Predicates: fixed for the wrapper, otherwise those of `T`.
    //==============================================================================

    fn is_parametric(&self) -> bool {
        true
    }

    fn have_subtypes(&self) -> bool {
        true
    }

    fn is_nullable(&self) -> bool {
        true
    }

    fn can_be_inside_nullable(&self) -> bool {
        false
    }

    fn can_be_used_as_version(&self) -> bool {
        false
    }

    fn only_null(&self) -> bool {
        self.nested.size_of_value_in_memory() == Some(0) && self.nested.default_value().is_null()
    }

    fn is_comparable(&self) -> bool {
        self.nested.is_comparable()
    }

    fn can_be_compared_with_collation(&self) -> bool {
        self.nested.can_be_compared_with_collation()
    }

    fn is_summable(&self) -> bool {
        self.nested.is_summable()
    }

    fn can_be_used_in_boolean_context(&self) -> bool {
        self.nested.can_be_used_in_boolean_context()
    }

    fn text_can_contain_only_valid_utf8(&self) -> bool {
        self.nested.text_can_contain_only_valid_utf8()
    }

    fn should_align_right_in_pretty_formats(&self) -> bool {
        self.nested.should_align_right_in_pretty_formats()
    }

    fn cannot_be_stored_in_tables(&self) -> bool {
        self.nested.cannot_be_stored_in_tables()
    }

    fn can_be_inside_low_cardinality(&self) -> bool {
        self.nested.can_be_inside_low_cardinality()
    }

    //==============================================================================
    // Sizes: one presence byte on top of the nested value, NULL or not.
    //==============================================================================

    fn size_of_value_in_memory(&self) -> Option<usize> {
        self.nested.size_of_value_in_memory().map(|size| size + 1)
    }

    fn maximum_size_of_value_in_memory(&self) -> Option<usize> {
        self.nested
            .maximum_size_of_value_in_memory()
            .map(|size| size + 1)
    }

    //==============================================================================
    // Bulk protocol
    //==============================================================================

    fn enumerate_streams(
        &self,
        callback: &mut dyn FnMut(&SubstreamPath),
        path: &mut SubstreamPath,
    ) {
        path.push(Substream::NullMap);
        callback(path);
        path.replace_last(Substream::NullableElements);
        self.nested.enumerate_streams(callback, path);
        path.pop();
    }

    fn serialize_bulk_state_prefix(
        &self,
        settings: &mut SerializeBulkSettings,
    ) -> Result<SerializeBulkState> {
        debug!(
            "Begin bulk write of {} into '{}' ({:?} presence)",
            self.name(),
            settings.current_stream_name(),
            settings.presence_encoding
        );
        let child = in_substream(settings, Substream::NullableElements, |s| {
            self.nested.serialize_bulk_state_prefix(s)
        })?;
        let local = match settings.presence_encoding {
            PresenceEncoding::Bytes => SerializeLocal::None,
            PresenceEncoding::PackedBits => SerializeLocal::PresenceBits(BitCarry::default()),
        };
        Ok(SerializeBulkState::with_children(self.name(), vec![child]).with_local(local))
    }

    fn serialize_bulk_state_suffix(
        &self,
        settings: &mut SerializeBulkSettings,
        state: &mut SerializeBulkState,
    ) -> Result<()> {
        let name = self.name();
        state.check(&name)?;
        if let SerializeLocal::PresenceBits(carry) = state.local_mut() {
            let tail = carry.finish();
            in_substream(settings, Substream::NullMap, |s| {
                s.output()?.write_all(&tail)?;
                Ok(())
            })?;
        }
        let child = state.child_mut(0)?;
        in_substream(settings, Substream::NullableElements, |s| {
            self.nested.serialize_bulk_state_suffix(s, child)
        })?;
        debug!(
            "End bulk write of {} into '{}': {} rows",
            name,
            settings.current_stream_name(),
            state.rows()
        );
        state.finish(&name)
    }

    fn deserialize_bulk_state_prefix(
        &self,
        settings: &mut DeserializeBulkSettings,
    ) -> Result<DeserializeBulkState> {
        debug!(
            "Begin bulk read of {} from '{}' ({:?} presence)",
            self.name(),
            settings.current_stream_name(),
            settings.presence_encoding
        );
        let child = in_substream(settings, Substream::NullableElements, |s| {
            self.nested.deserialize_bulk_state_prefix(s)
        })?;
        let local = match settings.presence_encoding {
            PresenceEncoding::Bytes => DeserializeLocal::None,
            PresenceEncoding::PackedBits => DeserializeLocal::PresenceBits(BitSource::default()),
        };
        Ok(DeserializeBulkState::with_children(self.name(), vec![child]).with_local(local))
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
        let col = self.nullable_column(column)?;
        let null_stream = in_substream(settings, Substream::NullMap, |s| Ok(s.current_stream_name()))?;
        col.ensure_usable(&null_stream)?;
        let rows = clamp_range(col.len(), offset, limit)?;
        if rows == 0 {
            return Ok(());
        }

        let flags = &col.null_map()[offset..offset + rows];
        let encoding = settings.presence_encoding;
        let local = state.local_mut();
        in_substream(settings, Substream::NullMap, |s| {
            match (encoding, local) {
                (PresenceEncoding::Bytes, SerializeLocal::None) => s.output()?.write_all(flags)?,
                (PresenceEncoding::PackedBits, SerializeLocal::PresenceBits(carry)) => {
                    let bytes = carry.push_flags(flags);
                    s.output()?.write_all(&bytes)?;
                }
                _ => return Err(self.encoding_mismatch(encoding)),
            }
            Ok(())
        })?;

        let child = state.child_mut(0)?;
        in_substream(settings, Substream::NullableElements, |s| {
            self.nested
                .serialize_bulk_with_multiple_streams(col.nested(), offset, rows, s, child)
        })?;

        state.advance(rows);
        trace!(
            "Wrote rows [{}, {}) of {} to '{}'",
            offset,
            offset + rows,
            name,
            null_stream
        );
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
        let null_stream = in_substream(settings, Substream::NullMap, |s| Ok(s.current_stream_name()))?;
        let col = self.nullable_column_mut(column)?;
        col.ensure_usable(&null_stream)?;
        if limit == 0 {
            return Ok(0);
        }

        let encoding = settings.presence_encoding;
        let local = state.local_mut();
        let flags = in_substream(settings, Substream::NullMap, |s| match (encoding, local) {
            (PresenceEncoding::Bytes, DeserializeLocal::None) => {
                let what = format!("presence flags in '{}'", null_stream);
                read_pod_values::<u8>(s.input()?, limit, &what)
            }
            (PresenceEncoding::PackedBits, DeserializeLocal::PresenceBits(source)) => source
                .read_flags(s.input()?, limit)
                .map_err(|e| with_stream(e, &null_stream)),
            _ => Err(self.encoding_mismatch(encoding)),
        })?;

        let start = col.len();
        let nested = &self.nested;
        let child = state.child_mut(0)?;
        let rows = col.extend_bulk(&null_stream, flags, |nested_col, n| {
            in_substream(settings, Substream::NullableElements, |s| {
                nested.deserialize_bulk_with_multiple_streams(nested_col, n, s, child)
            })
        })?;

        if self.only_null() {
            if let Some(pos) = col.null_map()[start..].iter().position(|&flag| flag == 0) {
                col.pop_back(rows);
                return Err(NullableError::MalformedInput {
                    row: start + pos,
                    stream: null_stream,
                    message: format!("{} can only hold NULL but the row is marked present", name),
                });
            }
        }

        state.advance(rows);
        trace!(
            "Read {} rows of {} from '{}' ({} requested)",
            rows,
            name,
            null_stream,
            limit
        );
        Ok(rows)
    }

    //==============================================================================
    // Binary
    //==============================================================================

    fn serialize_binary_field(&self, field: &Field, w: &mut dyn Write) -> Result<()> {
        if field.is_null() {
            return self
                .nested
                .serialize_binary_field(&self.nested.default_value(), w);
        }
        self.nested.serialize_binary_field(field, w)
    }

    fn deserialize_binary_field(&self, r: &mut ReadBuffer) -> Result<Field> {
        self.nested.deserialize_binary_field(r)
    }

    fn serialize_binary(&self, column: &dyn Column, row: usize, w: &mut dyn Write) -> Result<()> {
        let col = self.nullable_column(column)?;
        column::check_row(column, row)?;
        if col.is_null_at(row) {
            w.write_all(&[1])?;
            return Ok(());
        }
        w.write_all(&[0])?;
        self.nested.serialize_binary(col.nested(), row, w)
    }

    fn deserialize_binary(&self, column: &mut dyn Column, r: &mut ReadBuffer) -> Result<()> {
        let col = self.nullable_column_mut(column)?;
        let start = r.position();
        let flag = r.read_exact(1, "Nullable presence flag")?[0];
        match flag {
            0 => {
                let nested = self.nested.as_ref();
                let result = col.push_with(|nested_col| nested.deserialize_binary(nested_col, r));
                if result.is_err() {
                    r.set_position(start);
                }
                result
            }
            1 => {
                col.ensure_usable("")?;
                col.push_null();
                Ok(())
            }
            other => {
                r.set_position(start);
                Err(NullableError::malformed(
                    col.len(),
                    format!("invalid presence flag {}", other),
                ))
            }
        }
    }

    //==============================================================================
    // Text
    //==============================================================================

    fn serialize_text(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.serialize_guarded(column, row, w, QUOTED_NULL, |ty, col, w| {
            ty.serialize_text(col, row, w, settings)
        })
    }

    fn serialize_text_escaped(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.serialize_guarded(column, row, w, ESCAPED_NULL, |ty, col, w| {
            ty.serialize_text_escaped(col, row, w, settings)
        })
    }

    fn deserialize_text_escaped(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let sentinel = escaped_null(r);
        self.deserialize_guarded(column, r, sentinel, |ty, col, r| {
            ty.deserialize_text_escaped(col, r, settings)
        })
    }

    fn serialize_text_quoted(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.serialize_guarded(column, row, w, QUOTED_NULL, |ty, col, w| {
            ty.serialize_text_quoted(col, row, w, settings)
        })
    }

    fn deserialize_text_quoted(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let sentinel = quoted_null(r);
        self.deserialize_guarded(column, r, sentinel, |ty, col, r| {
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
        self.serialize_guarded(column, row, w, ESCAPED_NULL, |ty, col, w| {
            ty.serialize_text_csv(col, row, w, settings)
        })
    }

    fn deserialize_text_csv(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let sentinel = csv_null(r, settings)?;
        self.deserialize_guarded(column, r, sentinel, |ty, col, r| {
            ty.deserialize_text_csv(col, r, settings)
        })
    }

    fn serialize_text_json(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        self.serialize_guarded(column, row, w, JSON_NULL, |ty, col, w| {
            ty.serialize_text_json(col, row, w, settings)
        })
    }

    fn deserialize_text_json(
        &self,
        column: &mut dyn Column,
        r: &mut ReadBuffer,
        settings: &FormatSettings,
    ) -> Result<()> {
        let sentinel = json_null(r);
        self.deserialize_guarded(column, r, sentinel, |ty, col, r| {
            ty.deserialize_text_json(col, r, settings)
        })
    }

    fn serialize_text_xml(
        &self,
        column: &dyn Column,
        row: usize,
        w: &mut dyn Write,
        settings: &FormatSettings,
    ) -> Result<()> {
        let col = self.nullable_column(column)?;
        column::check_row(column, row)?;
        if col.is_null_at(row) {
            return write_xml_escaped(settings.xml.null_text.as_bytes(), w);
        }
        self.nested.serialize_text_xml(col.nested(), row, w, settings)
    }

    //==============================================================================
    // Protobuf: a NULL row is an absent field.
    //==============================================================================

    fn serialize_protobuf(
        &self,
        column: &dyn Column,
        row: usize,
        writer: &mut ProtobufWriter,
    ) -> Result<()> {
        let col = self.nullable_column(column)?;
        column::check_row(column, row)?;
        if col.is_null_at(row) {
            return Ok(());
        }
        self.nested.serialize_protobuf(col.nested(), row, writer)
    }
}

//==================================================================================
// Free functions
//==================================================================================

/// Wraps `ty` in `Nullable`. A type that is already nullable is returned unchanged.
pub fn make_nullable(ty: &DataTypePtr) -> Result<DataTypePtr> {
    if ty.is_nullable() {
        return Ok(Arc::clone(ty));
    }
    Ok(Arc::new(NullableType::new(Arc::clone(ty))?))
}

/// The nested type of a `Nullable`, or `ty` itself if it is not nullable.
pub fn remove_nullable(ty: &DataTypePtr) -> DataTypePtr {
    match ty.as_any().downcast_ref::<NullableType>() {
        Some(nullable) => Arc::clone(&nullable.nested),
        None => Arc::clone(ty),
    }
}
