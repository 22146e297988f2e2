//! The null-tracking column: a nested column paired with a per-row presence map.
//!
//! The two parts are only ever mutated together through the methods below, so the
//! length invariant `null_map.len() == nested.len()` holds at every observable point.
//! The one exception is a bulk read that fails half-way: the column is then marked
//! poisoned and every further mutation or bulk pass on it returns `Desynchronized`.

use log::warn;
use std::any::Any;

use crate::column::{Column, MutableColumn};
use crate::error::{NullableError, Result};
use crate::types::Field;

#[derive(Debug)]
pub struct NullableColumn {
    nested: MutableColumn,
    /// One flag per row, nonzero meaning NULL.
    null_map: Vec<u8>,
    poisoned: bool,
}

impl NullableColumn {
    /// Wraps `nested`; every row it already holds is treated as present.
    pub fn new(nested: MutableColumn) -> Self {
        let null_map = vec![0; nested.len()];
        Self {
            nested,
            null_map,
            poisoned: false,
        }
    }

    /// Pairs an existing nested column with an existing presence map.
    pub fn from_parts(nested: MutableColumn, null_map: Vec<u8>) -> Result<Self> {
        if nested.len() != null_map.len() {
            return Err(NullableError::ContractViolation(format!(
                "null map has {} rows but the nested column has {}",
                null_map.len(),
                nested.len()
            )));
        }
        Ok(Self {
            nested,
            null_map,
            poisoned: false,
        })
    }

    pub fn nested(&self) -> &dyn Column {
        self.nested.as_ref()
    }

    pub fn null_map(&self) -> &[u8] {
        &self.null_map
    }

    pub fn into_parts(self) -> (MutableColumn, Vec<u8>) {
        (self.nested, self.null_map)
    }

    pub fn is_null_at(&self, row: usize) -> bool {
        self.null_map.get(row).is_some_and(|&flag| flag != 0)
    }

    pub fn null_count(&self) -> usize {
        self.null_map.iter().filter(|&&flag| flag != 0).count()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Fails if an earlier bulk pass left this column desynchronized.
    pub fn ensure_usable(&self, stream: &str) -> Result<()> {
        if self.poisoned {
            return Err(self.desync_error(stream));
        }
        Ok(())
    }

    /// Appends a NULL row: the nested column gets its default value.
    pub fn push_null(&mut self) {
        self.nested.push_default();
        self.null_map.push(1);
    }

    /// Appends a present row whose nested value is produced by `decode`.
    ///
    /// `decode` must append exactly one row. If it fails, any rows it appended are
    /// removed and the presence map is left untouched.
    pub fn push_with(&mut self, decode: impl FnOnce(&mut dyn Column) -> Result<()>) -> Result<()> {
        self.ensure_usable("")?;
        let before = self.nested.len();
        if let Err(e) = decode(self.nested.as_mut()) {
            let added = self.nested.len().saturating_sub(before);
            self.nested.pop_back(added);
            return Err(e);
        }
        let added = self.nested.len() - before;
        if added != 1 {
            self.nested.pop_back(added);
            return Err(NullableError::ContractViolation(format!(
                "nested decoder appended {} rows instead of 1",
                added
            )));
        }
        self.null_map.push(0);
        Ok(())
    }

    /// Appends one bulk chunk.
    ///
    /// `flags` are the presence flags already read for this chunk. `read_nested` is
    /// asked for `flags.len()` nested rows and returns how many it appended. Any
    /// shortfall poisons the column.
    pub fn extend_bulk(
        &mut self,
        stream: &str,
        flags: Vec<u8>,
        read_nested: impl FnOnce(&mut dyn Column, usize) -> Result<usize>,
    ) -> Result<usize> {
        self.ensure_usable(stream)?;
        let requested = flags.len();
        let before = self.nested.len();

        if let Err(e) = read_nested(self.nested.as_mut(), requested) {
            self.poisoned = true;
            warn!(
                "Nested read failed mid-chunk on '{}', column is no longer usable: {}",
                stream, e
            );
            return Err(e);
        }

        let appended = self.nested.len().saturating_sub(before);
        self.null_map.extend_from_slice(&flags);
        self.check_consistency(stream)?;
        Ok(appended)
    }

    /// Verifies the length invariant, poisoning the column if it is broken.
    pub fn check_consistency(&mut self, stream: &str) -> Result<()> {
        if self.null_map.len() != self.nested.len() {
            self.poisoned = true;
            warn!(
                "Desynchronized nullable column on '{}': {} flags, {} nested rows",
                stream,
                self.null_map.len(),
                self.nested.len()
            );
        }
        self.ensure_usable(stream)
    }

    fn desync_error(&self, stream: &str) -> NullableError {
        NullableError::Desynchronized {
            stream: stream.to_string(),
            null_map_len: self.null_map.len(),
            nested_len: self.nested.len(),
        }
    }
}

impl Column for NullableColumn {
    fn family_name(&self) -> &'static str {
        "Nullable"
    }

    fn len(&self) -> usize {
        self.null_map.len()
    }

    fn get(&self, row: usize) -> Option<Field> {
        match self.null_map.get(row)? {
            0 => self.nested.get(row),
            _ => Some(Field::Null),
        }
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        if field.is_null() {
            self.ensure_usable("")?;
            self.push_null();
            return Ok(());
        }
        self.push_with(|nested| nested.push_field(field))
    }

    fn push_default(&mut self) {
        self.push_null();
    }

    fn pop_back(&mut self, n: usize) {
        let keep = self.null_map.len().saturating_sub(n);
        let nested_extra = self.nested.len().saturating_sub(keep);
        self.nested.pop_back(nested_extra);
        self.null_map.truncate(keep);
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new(self.nested.clone_empty()))
    }

    fn byte_size(&self) -> usize {
        self.nested.byte_size() + self.null_map.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
