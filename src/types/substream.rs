//! Substream paths and the stream-naming contract.
//!
//! A path is the chain of structural facets from the logical column down to one
//! physical sub-stream. The derived names are part of the on-disk format and must stay
//! stable across versions:
//!
//! ```text
//! Nullable(Int32)                 x.null, x
//! Array(Nullable(String))         x.size0, x.null, x
//! Nullable(Array(Int8))           x.null, x.size0, x
//! Tuple(Int32, Nullable(String))  x.1, x.2.null, x.2
//! Nullable(Array(Nullable(Int8))) x.null, x.size0, x.null1, x
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Substream {
    /// The per-row presence flags of a `Nullable`.
    NullMap,
    /// The values of a `Nullable`, including those stored for NULL rows.
    NullableElements,
    /// The per-row element counts of an `Array`.
    ArraySizes,
    /// The flattened elements of an `Array`.
    ArrayElements,
    /// One element of a `Tuple`, by 1-based position.
    TupleElement(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubstreamPath(Vec<Substream>);

impl SubstreamPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the innermost component, used when moving from one sibling sub-stream
    /// to the next.
    pub fn replace_last(&mut self, substream: Substream) {
        if let Some(last) = self.0.last_mut() {
            *last = substream;
        }
    }
}

impl Deref for SubstreamPath {
    type Target = Vec<Substream>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SubstreamPath {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Substream>> for SubstreamPath {
    fn from(path: Vec<Substream>) -> Self {
        Self(path)
    }
}

impl fmt::Display for SubstreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", stream_name("", self))
    }
}

/// Builds the physical sub-stream name for `column_name` at `path`.
///
/// Array sizes are numbered by nesting depth, so `Array(Array(T))` yields `x.size0`
/// and `x.size1`. A presence map under another `Nullable` with no tuple element in
/// between is numbered the same way (`x.null1`), otherwise it would share a name with
/// the outer one.
pub fn stream_name(column_name: &str, path: &[Substream]) -> String {
    let mut name = column_name.to_string();
    let mut array_level = 0;
    let mut null_level = 0;
    for substream in path {
        match substream {
            Substream::NullMap if null_level == 0 => name.push_str(".null"),
            Substream::NullMap => name.push_str(&format!(".null{}", null_level)),
            Substream::NullableElements => null_level += 1,
            Substream::ArraySizes => name.push_str(&format!(".size{}", array_level)),
            Substream::ArrayElements => array_level += 1,
            Substream::TupleElement(position) => {
                null_level = 0;
                name.push_str(&format!(".{}", position));
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        use Substream::*;
        assert_eq!(stream_name("x", &[NullMap]), "x.null");
        assert_eq!(stream_name("x", &[NullableElements]), "x");
        assert_eq!(
            stream_name("x", &[ArrayElements, NullableElements, ArraySizes]),
            "x.size1"
        );
        assert_eq!(stream_name("x", &[TupleElement(2), NullMap]), "x.2.null");
        assert_eq!(
            stream_name("x", &[NullableElements, ArrayElements, NullMap]),
            "x.null1"
        );
        assert_eq!(
            stream_name("x", &[NullableElements, TupleElement(1), NullMap]),
            "x.1.null"
        );
    }
}
