//! `Field` is the dynamically-typed value of a single row, used wherever a value has to
//! cross the type-erased `Column` boundary (defaults, row access, single-value codecs).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// The logical absence of a value.
    Null,
    UInt64(u64),
    Int64(i64),
    Float64(f64),
    String(String),
    Array(Vec<Field>),
    Tuple(Vec<Field>),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Short name of the variant, used in type-mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Field::Null => "Null",
            Field::UInt64(_) => "UInt64",
            Field::Int64(_) => "Int64",
            Field::Float64(_) => "Float64",
            Field::String(_) => "String",
            Field::Array(_) => "Array",
            Field::Tuple(_) => "Tuple",
        }
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int64(value)
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Field::UInt64(value)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float64(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::String(value)
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(value: Option<T>) -> Self {
        match value {
            None => Field::Null,
            Some(v) => v.into(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => write!(f, "NULL"),
            Field::UInt64(v) => write!(f, "{}", v),
            Field::Int64(v) => write!(f, "{}", v),
            Field::Float64(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "'{}'", s),
            Field::Array(items) | Field::Tuple(items) => {
                let (open, close) = if matches!(self, Field::Array(_)) {
                    ('[', ']')
                } else {
                    ('(', ')')
                };
                write!(f, "{}", open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "{}", close)
            }
        }
    }
}
