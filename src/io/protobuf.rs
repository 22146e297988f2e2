//! A minimal protobuf wire-format writer.
//!
//! Each row is written as one message; the caller selects the field number of the
//! column being written with `set_field_number` before handing the writer to a type's
//! `serialize_protobuf`. An absent field is represented by writing nothing at all.

use crate::error::Result;
use crate::kernels::leb128;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LENGTH_DELIMITED: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Debug, Clone)]
pub struct ProtobufWriter {
    buf: Vec<u8>,
    field_number: u32,
}

impl Default for ProtobufWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtobufWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            field_number: 1,
        }
    }

    pub fn set_field_number(&mut self, field_number: u32) {
        self.field_number = field_number;
    }

    pub fn field_number(&self) -> u32 {
        self.field_number
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_key(&mut self, wire_type: u64) -> Result<()> {
        leb128::encode_one((u64::from(self.field_number) << 3) | wire_type, &mut self.buf)
    }

    pub fn write_uint(&mut self, value: u64) -> Result<()> {
        self.write_key(WIRE_VARINT)?;
        leb128::encode_one(value, &mut self.buf)
    }

    /// Signed integers use zigzag (`sint64`) so small negatives stay small.
    pub fn write_sint(&mut self, value: i64) -> Result<()> {
        self.write_key(WIRE_VARINT)?;
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        leb128::encode_one(zigzag, &mut self.buf)
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_key(WIRE_FIXED64)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.write_key(WIRE_FIXED32)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_key(WIRE_LENGTH_DELIMITED)?;
        leb128::encode_one(value.len() as u64, &mut self.buf)?;
        self.buf.extend_from_slice(value);
        Ok(())
    }

    /// Writes a length-delimited sub-message whose body is produced by `body` on a fresh
    /// writer.
    pub fn write_message(
        &mut self,
        body: impl FnOnce(&mut ProtobufWriter) -> Result<()>,
    ) -> Result<()> {
        let mut nested = ProtobufWriter::new();
        body(&mut nested)?;
        self.write_bytes(&nested.buf)
    }
}
