//! Runtime column containers.
//!
//! A column is the in-memory, append-only storage of one logical value kind. The type
//! descriptors in `crate::types` never own data; they read and write columns through
//! the type-erased `Column` trait and downcast to the concrete container they created
//! with `DataType::create_column`.

use std::any::Any;
use std::fmt;

use crate::error::{NullableError, Result};
use crate::types::Field;

pub mod basic;
pub mod composite;
pub mod nullable;


pub use basic::{NothingColumn, NumberColumn, StringColumn};
pub use composite::{ArrayColumn, TupleColumn};
pub use nullable::NullableColumn;

pub trait Column: fmt::Debug + Send {
    /// Short name of the container, used in downcast errors.
    fn family_name(&self) -> &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row`, or `None` past the end.
    fn get(&self, row: usize) -> Option<Field>;

    /// Appends one value. On error nothing is appended.
    fn push_field(&mut self, field: &Field) -> Result<()>;

    /// Appends the default value of the column's type.
    fn push_default(&mut self);

    /// Removes the last `n` rows (fewer if the column is shorter).
    fn pop_back(&mut self, n: usize);

    /// An empty column of the same shape.
    fn clone_empty(&self) -> MutableColumn;

    /// Approximate heap footprint in bytes.
    fn byte_size(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type MutableColumn = Box<dyn Column>;

pub fn downcast_ref<'a, C: Column + 'static>(
    column: &'a dyn Column,
    expected: &str,
) -> Result<&'a C> {
    let actual = column.family_name();
    column
        .as_any()
        .downcast_ref::<C>()
        .ok_or_else(|| NullableError::TypeMismatch {
            expected: format!("column for {}", expected),
            actual: actual.to_string(),
        })
}

pub fn downcast_mut<'a, C: Column + 'static>(
    column: &'a mut dyn Column,
    expected: &str,
) -> Result<&'a mut C> {
    let actual = column.family_name();
    column
        .as_any_mut()
        .downcast_mut::<C>()
        .ok_or_else(|| NullableError::TypeMismatch {
            expected: format!("column for {}", expected),
            actual: actual.to_string(),
        })
}

/// Fails with a contract violation if `row` is not a valid index into `column`.
pub fn check_row(column: &dyn Column, row: usize) -> Result<()> {
    if row >= column.len() {
        return Err(NullableError::ContractViolation(format!(
            "row {} is out of bounds for a column of {} rows",
            row,
            column.len()
        )));
    }
    Ok(())
}

/// Collects every row of a column as `Field`s. Mostly useful in tests and examples.
pub fn to_fields(column: &dyn Column) -> Vec<Field> {
    (0..column.len()).filter_map(|row| column.get(row)).collect()
}
