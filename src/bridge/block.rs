// In: src/bridge/block.rs

//! A block is a set of equally long, named, typed columns: the unit the block writer
//! and reader move through a stream set.

use crate::column::MutableColumn;
use crate::error::{NullableError, Result};
use crate::types::DataTypePtr;

#[derive(Debug)]
pub struct ColumnWithTypeAndName {
    pub name: String,
    pub ty: DataTypePtr,
    pub column: MutableColumn,
}

impl ColumnWithTypeAndName {
    pub fn new(name: impl Into<String>, ty: DataTypePtr, column: MutableColumn) -> Self {
        Self {
            name: name.into(),
            ty,
            column,
        }
    }

    /// An empty column of `ty`.
    pub fn empty(name: impl Into<String>, ty: DataTypePtr) -> Self {
        let column = ty.create_column();
        Self::new(name, ty, column)
    }
}

#[derive(Debug, Default)]
pub struct Block {
    columns: Vec<ColumnWithTypeAndName>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Its name must be new and its length must match the block.
    pub fn insert(&mut self, column: ColumnWithTypeAndName) -> Result<()> {
        if self.get(&column.name).is_some() {
            return Err(NullableError::ContractViolation(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.column.len() != self.rows() {
            return Err(NullableError::ContractViolation(format!(
                "column '{}' has {} rows, block has {}",
                column.name,
                column.column.len(),
                self.rows()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.column.len())
    }

    pub fn columns(&self) -> &[ColumnWithTypeAndName] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&ColumnWithTypeAndName> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn into_columns(self) -> Vec<ColumnWithTypeAndName> {
        self.columns
    }
}
