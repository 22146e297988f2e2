//! Columns that own other columns: arrays and tuples.

use std::any::Any;

use crate::column::{Column, MutableColumn};
use crate::error::{NullableError, Result};
use crate::types::Field;

//==================================================================================
// 1. Arrays
//==================================================================================

/// Flattened elements plus cumulative end offsets, one per row.
#[derive(Debug)]
pub struct ArrayColumn {
    data: MutableColumn,
    offsets: Vec<u64>,
}

impl ArrayColumn {
    pub fn new(data: MutableColumn) -> Self {
        Self {
            data,
            offsets: Vec::new(),
        }
    }

    pub fn data(&self) -> &dyn Column {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> &mut dyn Column {
        self.data.as_mut()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Element index where `row` starts.
    pub fn offset_at(&self, row: usize) -> u64 {
        if row == 0 {
            0
        } else {
            self.offsets.get(row - 1).copied().unwrap_or(0)
        }
    }

    /// Element count of `row`.
    pub fn size_at(&self, row: usize) -> u64 {
        self.offsets
            .get(row)
            .copied()
            .unwrap_or(0)
            .saturating_sub(self.offset_at(row))
    }

    /// Appends rows whose elements have already been appended to `data`.
    pub fn push_sizes(&mut self, sizes: &[u64]) -> Result<()> {
        let mut end = self.offsets.last().copied().unwrap_or(0);
        let expected_end = total_size(sizes)
            .and_then(|total| total.checked_add(end))
            .ok_or_else(|| {
                NullableError::malformed(self.offsets.len(), "array sizes overflow u64")
            })?;
        if expected_end != self.data.len() as u64 {
            return Err(NullableError::ContractViolation(format!(
                "array sizes cover {} elements but the element column has {}",
                expected_end,
                self.data.len()
            )));
        }
        for size in sizes {
            end += size;
            self.offsets.push(end);
        }
        Ok(())
    }
}

/// Sum of per-row element counts, or `None` if it overflows.
pub fn total_size(sizes: &[u64]) -> Option<u64> {
    sizes.iter().try_fold(0u64, |acc, &size| acc.checked_add(size))
}

impl Column for ArrayColumn {
    fn family_name(&self) -> &'static str {
        "Array"
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn get(&self, row: usize) -> Option<Field> {
        if row >= self.offsets.len() {
            return None;
        }
        let start = self.offset_at(row) as usize;
        let end = self.offsets[row] as usize;
        (start..end)
            .map(|i| self.data.get(i))
            .collect::<Option<Vec<_>>>()
            .map(Field::Array)
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        let items = match field {
            Field::Array(items) => items,
            other => {
                return Err(NullableError::TypeMismatch {
                    expected: "Array".to_string(),
                    actual: other.kind_name().to_string(),
                })
            }
        };
        for (pushed, item) in items.iter().enumerate() {
            if let Err(e) = self.data.push_field(item) {
                self.data.pop_back(pushed);
                return Err(e);
            }
        }
        self.offsets.push(self.data.len() as u64);
        Ok(())
    }

    fn push_default(&mut self) {
        self.offsets.push(self.data.len() as u64);
    }

    fn pop_back(&mut self, n: usize) {
        let keep = self.offsets.len().saturating_sub(n);
        let elements = self.data.len() - self.offset_at(keep) as usize;
        self.data.pop_back(elements);
        self.offsets.truncate(keep);
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new(self.data.clone_empty()))
    }

    fn byte_size(&self) -> usize {
        self.data.byte_size() + self.offsets.len() * 8
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//==================================================================================
// 2. Tuples
//==================================================================================

/// One column per element, all of the same length.
#[derive(Debug)]
pub struct TupleColumn {
    elements: Vec<MutableColumn>,
}

impl TupleColumn {
    pub fn new(elements: Vec<MutableColumn>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[MutableColumn] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [MutableColumn] {
        &mut self.elements
    }
}

impl Column for TupleColumn {
    fn family_name(&self) -> &'static str {
        "Tuple"
    }

    fn len(&self) -> usize {
        self.elements.first().map_or(0, |c| c.len())
    }

    fn get(&self, row: usize) -> Option<Field> {
        self.elements
            .iter()
            .map(|c| c.get(row))
            .collect::<Option<Vec<_>>>()
            .map(Field::Tuple)
    }

    fn push_field(&mut self, field: &Field) -> Result<()> {
        let items = match field {
            Field::Tuple(items) if items.len() == self.elements.len() => items,
            Field::Tuple(items) => {
                return Err(NullableError::TypeMismatch {
                    expected: format!("Tuple of {} elements", self.elements.len()),
                    actual: format!("Tuple of {} elements", items.len()),
                })
            }
            other => {
                return Err(NullableError::TypeMismatch {
                    expected: "Tuple".to_string(),
                    actual: other.kind_name().to_string(),
                })
            }
        };
        for (i, item) in items.iter().enumerate() {
            if let Err(e) = self.elements[i].push_field(item) {
                for done in &mut self.elements[..i] {
                    done.pop_back(1);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn push_default(&mut self) {
        for element in &mut self.elements {
            element.push_default();
        }
    }

    fn pop_back(&mut self, n: usize) {
        for element in &mut self.elements {
            element.pop_back(n);
        }
    }

    fn clone_empty(&self) -> MutableColumn {
        Box::new(Self::new(
            self.elements.iter().map(|c| c.clone_empty()).collect(),
        ))
    }

    fn byte_size(&self) -> usize {
        self.elements.iter().map(|c| c.byte_size()).sum()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
