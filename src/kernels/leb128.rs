//! This module contains the pure, stateless kernels for LEB128 (Little-Endian Base 128)
//! variable-length integer encoding and decoding.
//!
//! String lengths in the bulk string stream and protobuf field keys/varints use this
//! encoding. It is fully panic-free.

use num_traits::{PrimInt, Unsigned};
use std::io::{ErrorKind, Read, Write};

use crate::error::{NullableError, Result};

//==================================================================================
// 1. Single-Value Operations on Buffers
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<()>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F).ok_or_else(|| {
        NullableError::Leb128DecodeError("Failed to create 7-bit mask for type".to_string())
    })?;

    let mut current_value = value;
    loop {
        let payload = (current_value & seven_bit_mask).to_u8().ok_or_else(|| {
            NullableError::Leb128DecodeError(
                "Failed to convert generic integer to u8".to_string(),
            )
        })?;
        current_value = current_value >> 7;

        if current_value == zero {
            buffer.push(payload);
            return Ok(());
        }
        buffer.push(payload | 0x80);
    }
}

/// Decodes a single unsigned integer from the front of `bytes`, returning the value and
/// the number of bytes consumed.
pub fn decode_one<T>(bytes: &[u8]) -> Result<(T, usize)>
where
    T: PrimInt + Unsigned,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= total_bits {
            return Err(NullableError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }
        let seven_bit_payload = T::from(byte & 0x7F).ok_or_else(|| {
            NullableError::Leb128DecodeError(
                "Failed to create 7-bit payload from byte".to_string(),
            )
        })?;

        if byte & 0x80 == 0 {
            // The last byte may not set bits that are out of bounds for the type.
            if shift + 7 > total_bits && (byte >> (total_bits - shift)) > 0 {
                return Err(NullableError::Leb128DecodeError(
                    "Integer overflow during decoding".to_string(),
                ));
            }
            return Ok((result | (seven_bit_payload << shift), i + 1));
        }

        result = result | (seven_bit_payload << shift);
        shift += 7;
    }

    Err(NullableError::Leb128DecodeError(
        "Unexpected end of buffer".to_string(),
    ))
}

//==================================================================================
// 2. Stream Operations
//==================================================================================

/// Writes a single `u64` to a stream.
pub fn write_u64(value: u64, w: &mut dyn Write) -> Result<()> {
    let mut buf = Vec::with_capacity(10);
    encode_one(value, &mut buf)?;
    w.write_all(&buf)?;
    Ok(())
}

/// Reads a single `u64` from a stream.
///
/// Returns `Ok(None)` when the stream is exhausted before the first byte, which is the
/// normal way a bulk reader discovers the end of a sub-stream. Running out of bytes in
/// the middle of a value is an error.
pub fn read_u64(r: &mut dyn Read) -> Result<Option<u64>> {
    let mut buf = Vec::with_capacity(10);
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) if buf.is_empty() => return Ok(None),
            Ok(0) => {
                return Err(NullableError::Leb128DecodeError(
                    "Unexpected end of stream".to_string(),
                ))
            }
            Ok(_) => {
                buf.push(byte[0]);
                if byte[0] & 0x80 == 0 {
                    let (value, _) = decode_one::<u64>(&buf)?;
                    return Ok(Some(value));
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_leb128_known_encoding() {
        let mut buf = Vec::new();
        encode_one(624_485u64, &mut buf).unwrap();
        assert_eq!(buf, vec![0xE5, 0x8E, 0x26]);
        assert_eq!(decode_one::<u64>(&buf).unwrap(), (624_485, 3));
    }

    #[test]
    fn test_stream_read_reports_clean_eof() {
        let mut bytes = Vec::new();
        write_u64(300, &mut bytes).unwrap();
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_u64(&mut cursor).unwrap(), Some(300));
        assert_eq!(read_u64(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_stream_read_truncated_value_is_error() {
        let mut cursor = Cursor::new(vec![0x80u8]);
        assert!(read_u64(&mut cursor).is_err());
    }

    #[test]
    fn test_decode_overflow_error() {
        let encoded_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let result = decode_one::<u64>(&encoded_bytes);
        match result {
            Err(NullableError::Leb128DecodeError(msg)) => assert!(msg.contains("overflow")),
            other => panic!("Expected Leb128DecodeError, got {:?}", other),
        }
    }
}
