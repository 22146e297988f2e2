// In: src/bridge/arrow_impl.rs

//! Conversions between columns and Arrow arrays.
//!
//! Numeric and `String` columns map onto the matching Arrow array. A `Nullable`
//! wrapper maps onto the array's validity: the presence map becomes a `NullBuffer`
//! (`1` = NULL here, `false` = null there) and back. Values stored for NULL rows are
//! not carried over; on import they are filled with the type's default.

use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray, StringArray};
use arrow::buffer::{BooleanBuffer, NullBuffer, ScalarBuffer};
use arrow::datatypes as adt;
use std::sync::Arc;

use crate::column::{self, Column, MutableColumn, NullableColumn, NumberColumn, StringColumn};
use crate::error::{NullableError, Result};
use crate::types::{
    make_nullable, DataTypePtr, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, NullableType, StringType, TypeIndex, UInt16Type, UInt32Type, UInt64Type,
    UInt8Type,
};

fn unsupported(what: impl std::fmt::Display) -> NullableError {
    NullableError::UnsupportedType(format!("{} has no Arrow mapping", what))
}

/// The Arrow data type a column of `ty` converts to. `Nullable` is transparent here;
/// it shows up as the field's nullability instead.
pub fn to_arrow_data_type(ty: &DataTypePtr) -> Result<adt::DataType> {
    let inner = match ty.as_any().downcast_ref::<NullableType>() {
        Some(nullable) => nullable.nested().clone(),
        None => ty.clone(),
    };
    Ok(match inner.type_id() {
        TypeIndex::Int8 => adt::DataType::Int8,
        TypeIndex::Int16 => adt::DataType::Int16,
        TypeIndex::Int32 => adt::DataType::Int32,
        TypeIndex::Int64 => adt::DataType::Int64,
        TypeIndex::UInt8 => adt::DataType::UInt8,
        TypeIndex::UInt16 => adt::DataType::UInt16,
        TypeIndex::UInt32 => adt::DataType::UInt32,
        TypeIndex::UInt64 => adt::DataType::UInt64,
        TypeIndex::Float32 => adt::DataType::Float32,
        TypeIndex::Float64 => adt::DataType::Float64,
        TypeIndex::String => adt::DataType::Utf8,
        _ => return Err(unsupported(ty.name())),
    })
}

pub fn to_arrow_field(name: &str, ty: &DataTypePtr) -> Result<adt::Field> {
    Ok(adt::Field::new(name, to_arrow_data_type(ty)?, ty.is_nullable()))
}

/// Converts a column of `ty` into an Arrow array.
pub fn column_to_arrow(ty: &DataTypePtr, column: &dyn Column) -> Result<ArrayRef> {
    let (inner_ty, inner_col, nulls) = match ty.as_any().downcast_ref::<NullableType>() {
        Some(nullable) => {
            let col = column::downcast_ref::<NullableColumn>(column, &ty.name())?;
            let validity = BooleanBuffer::from_iter(col.null_map().iter().map(|&flag| flag == 0));
            (nullable.nested().clone(), col.nested(), Some(NullBuffer::from(validity)))
        }
        None => (ty.clone(), column, None),
    };
    let name = inner_ty.name();

    macro_rules! primitive {
        ($native:ty, $arrow:ty) => {{
            let col = column::downcast_ref::<NumberColumn<$native>>(inner_col, &name)?;
            let values = ScalarBuffer::from(col.data.clone());
            Arc::new(PrimitiveArray::<$arrow>::try_new(values, nulls)?) as ArrayRef
        }};
    }

    Ok(match inner_ty.type_id() {
        TypeIndex::Int8 => primitive!(i8, adt::Int8Type),
        TypeIndex::Int16 => primitive!(i16, adt::Int16Type),
        TypeIndex::Int32 => primitive!(i32, adt::Int32Type),
        TypeIndex::Int64 => primitive!(i64, adt::Int64Type),
        TypeIndex::UInt8 => primitive!(u8, adt::UInt8Type),
        TypeIndex::UInt16 => primitive!(u16, adt::UInt16Type),
        TypeIndex::UInt32 => primitive!(u32, adt::UInt32Type),
        TypeIndex::UInt64 => primitive!(u64, adt::UInt64Type),
        TypeIndex::Float32 => primitive!(f32, adt::Float32Type),
        TypeIndex::Float64 => primitive!(f64, adt::Float64Type),
        TypeIndex::String => {
            let col = column::downcast_ref::<StringColumn>(inner_col, &name)?;
            let array: StringArray = col
                .data
                .iter()
                .enumerate()
                .map(|(row, value)| match &nulls {
                    Some(nulls) if nulls.is_null(row) => None,
                    _ => Some(value.as_str()),
                })
                .collect();
            Arc::new(array) as ArrayRef
        }
        _ => return Err(unsupported(ty.name())),
    })
}

/// Converts an Arrow array into a descriptor and a column.
///
/// The result is wrapped in `Nullable` when `nullable` is set or the array actually
/// contains nulls.
pub fn arrow_to_column(array: &dyn Array, nullable: bool) -> Result<(DataTypePtr, MutableColumn)> {
    macro_rules! primitive {
        ($arrow:ty, $ours:ty) => {{
            let typed = array
                .as_primitive_opt::<$arrow>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            let values = typed.iter().map(|v| v.unwrap_or_default()).collect();
            (
                Arc::new(<$ours>::new()) as DataTypePtr,
                Box::new(NumberColumn::from_vec(values)) as MutableColumn,
            )
        }};
    }

    let (ty, column) = match array.data_type() {
        adt::DataType::Int8 => primitive!(adt::Int8Type, Int8Type),
        adt::DataType::Int16 => primitive!(adt::Int16Type, Int16Type),
        adt::DataType::Int32 => primitive!(adt::Int32Type, Int32Type),
        adt::DataType::Int64 => primitive!(adt::Int64Type, Int64Type),
        adt::DataType::UInt8 => primitive!(adt::UInt8Type, UInt8Type),
        adt::DataType::UInt16 => primitive!(adt::UInt16Type, UInt16Type),
        adt::DataType::UInt32 => primitive!(adt::UInt32Type, UInt32Type),
        adt::DataType::UInt64 => primitive!(adt::UInt64Type, UInt64Type),
        adt::DataType::Float32 => primitive!(adt::Float32Type, Float32Type),
        adt::DataType::Float64 => primitive!(adt::Float64Type, Float64Type),
        adt::DataType::Utf8 => {
            let typed = array
                .as_string_opt::<i32>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            let data = typed
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect();
            (
                Arc::new(StringType::new()) as DataTypePtr,
                Box::new(StringColumn { data }) as MutableColumn,
            )
        }
        other => return Err(unsupported(other)),
    };

    if !nullable && array.null_count() == 0 {
        return Ok((ty, column));
    }
    let null_map = (0..array.len()).map(|row| u8::from(array.is_null(row))).collect();
    let nullable_ty = make_nullable(&ty)?;
    let column = NullableColumn::from_parts(column, null_map)?;
    Ok((nullable_ty, Box::new(column)))
}
