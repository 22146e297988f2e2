//! Pure, stateless byte-level kernels shared by the bulk and protobuf codecs.

pub mod bitpack;
pub mod leb128;
