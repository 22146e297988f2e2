//! Builds descriptors from type names such as `Nullable(Array(Int32))`.

use std::sync::Arc;

use crate::error::{NullableError, Result};
use crate::io::ReadBuffer;
use crate::types::text::is_ident_byte;
use crate::types::{
    ArrayType, DataTypePtr, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, NothingType, NullableType, StringType, TupleType, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};

/// Parses a full type name. Whitespace around names and commas is ignored.
///
/// `Nullable(Nullable(T))` is rejected with `ContractViolation`, like any other
/// construction of a `Nullable` around a type that cannot be inside one.
pub fn parse_type(name: &str) -> Result<DataTypePtr> {
    let mut r = ReadBuffer::new(name.as_bytes());
    let ty = parse_one(&mut r, name)?;
    r.skip_ascii_whitespace();
    if !r.eof() {
        return Err(NullableError::UnknownType(format!(
            "unexpected trailing input in '{}'",
            name
        )));
    }
    Ok(ty)
}

fn parse_one(r: &mut ReadBuffer, full: &str) -> Result<DataTypePtr> {
    r.skip_ascii_whitespace();
    let family = std::str::from_utf8(r.take_while(is_ident_byte))
        .map_err(|e| NullableError::UnknownType(e.to_string()))?;
    if family.is_empty() {
        return Err(NullableError::UnknownType(full.to_string()));
    }
    r.skip_ascii_whitespace();
    let args = if r.peek() == Some(b'(') {
        r.advance(1);
        parse_args(r, full)?
    } else {
        Vec::new()
    };

    let simple = |ty: DataTypePtr| -> Result<DataTypePtr> {
        if !args.is_empty() {
            return Err(NullableError::UnknownType(format!(
                "{} takes no arguments in '{}'",
                family, full
            )));
        }
        Ok(ty)
    };

    match family {
        "Nothing" => simple(Arc::new(NothingType::new())),
        "UInt8" => simple(Arc::new(UInt8Type::new())),
        "UInt16" => simple(Arc::new(UInt16Type::new())),
        "UInt32" => simple(Arc::new(UInt32Type::new())),
        "UInt64" => simple(Arc::new(UInt64Type::new())),
        "Int8" => simple(Arc::new(Int8Type::new())),
        "Int16" => simple(Arc::new(Int16Type::new())),
        "Int32" => simple(Arc::new(Int32Type::new())),
        "Int64" => simple(Arc::new(Int64Type::new())),
        "Float32" => simple(Arc::new(Float32Type::new())),
        "Float64" => simple(Arc::new(Float64Type::new())),
        "String" => simple(Arc::new(StringType::new())),
        "Array" => Ok(Arc::new(ArrayType::new(single_arg(args, family, full)?))),
        "Nullable" => Ok(Arc::new(NullableType::new(single_arg(args, family, full)?)?)),
        "Tuple" => Ok(Arc::new(TupleType::new(args)?)),
        _ => Err(NullableError::UnknownType(family.to_string())),
    }
}

fn parse_args(r: &mut ReadBuffer, full: &str) -> Result<Vec<DataTypePtr>> {
    let mut args = Vec::new();
    loop {
        args.push(parse_one(r, full)?);
        r.skip_ascii_whitespace();
        match r.next_byte() {
            Some(b',') => continue,
            Some(b')') => return Ok(args),
            _ => {
                return Err(NullableError::UnknownType(format!(
                    "expected ',' or ')' in '{}'",
                    full
                )))
            }
        }
    }
}

fn single_arg(mut args: Vec<DataTypePtr>, family: &str, full: &str) -> Result<DataTypePtr> {
    match (args.pop(), args.is_empty()) {
        (Some(arg), true) => Ok(arg),
        _ => Err(NullableError::UnknownType(format!(
            "{} takes exactly one argument in '{}'",
            family, full
        ))),
    }
}
