//! Flat columns: numbers, strings and the degenerate `Nothing` column.

use std::any::Any;

use crate::column::{Column, MutableColumn};
use crate::error::{NullableError, Result};
use crate::types::number::NativeNumber;
use crate::types::Field;

//==================================================================================
// 1. Numbers
//==================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberColumn<T: NativeNumber> {
    pub data: Vec<T>,
}

impl<T: NativeNumber> NumberColumn<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T: NativeNumber> Column for NumberColumn<T> {
    fn family_name(&self) -> &'static str {
        T::NAME
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, row: usize) -> Option<Field> {
        self.data.get(row).map(|v| v.to_field())
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        self.data.push(T::from_field(field)?);
        Ok(())
    }

    fn push_default(&mut self) {
        self.data.push(T::default());
    }

    fn pop_back(&mut self, n: usize) {
        let keep = self.data.len().saturating_sub(n);
        self.data.truncate(keep);
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new())
    }

    fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//==================================================================================
// 2. Strings
//==================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringColumn {
    pub data: Vec<String>,
}

impl StringColumn {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Column for StringColumn {
    fn family_name(&self) -> &'static str {
        "String"
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, row: usize) -> Option<Field> {
        self.data.get(row).map(|s| Field::String(s.clone()))
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        match field {
            Field::String(s) => {
                self.data.push(s.clone());
                Ok(())
            }
            other => Err(NullableError::TypeMismatch {
                expected: "String".to_string(),
                actual: other.kind_name().to_string(),
            }),
        }
    }

    fn push_default(&mut self) {
        self.data.push(String::new());
    }

    fn pop_back(&mut self, n: usize) {
        let keep = self.data.len().saturating_sub(n);
        self.data.truncate(keep);
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new())
    }

    fn byte_size(&self) -> usize {
        self.data.iter().map(|s| s.len() + 8).sum()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//==================================================================================
// 3. Nothing
//==================================================================================

/// A column of the type whose only value is NULL. It stores nothing but its length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NothingColumn {
    len: usize,
}

impl NothingColumn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, rows: usize) {
        self.len += rows;
    }
}

impl Column for NothingColumn {
    fn family_name(&self) -> &'static str {
        "Nothing"
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, row: usize) -> Option<Field> {
        (row < self.len).then_some(Field::Null)
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        if !field.is_null() {
            return Err(NullableError::TypeMismatch {
                expected: "Null".to_string(),
                actual: field.kind_name().to_string(),
            });
        }
        self.len += 1;
        Ok(())
    }

    fn push_default(&mut self) {
        self.len += 1;
    }

    fn pop_back(&mut self, n: usize) {
        self.len = self.len.saturating_sub(n);
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new())
    }

    fn byte_size(&self) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
