//! Byte-level I/O primitives the codecs are written against.

pub mod protobuf;
pub mod read_buffer;
pub mod streams;

pub use protobuf::ProtobufWriter;
pub use read_buffer::ReadBuffer;
pub use streams::{DirectoryStreams, InputStreams, MemoryStreams, OutputStreams};
