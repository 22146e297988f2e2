//! Kernels for the packed-bit form of the presence sub-stream.
//!
//! One bit per row, least-significant bit first within each byte. Because a chunk
//! boundary rarely falls on a byte boundary, both directions keep the partial byte in
//! a carry that lives inside the bulk state:
//!
//! * `BitCarry` (write side) emits only whole bytes per chunk and holds the rest until
//!   the next chunk or the final `finish`.
//! * `BitSource` (read side) keeps the bits it pulled that the current chunk did not
//!   need, so read chunking is independent from write chunking.
//!
//! `finish` closes the stream with one trailer byte holding the number of valid bits
//! in the last data byte (`1..=8`), or `0` when no row was written. The reader holds
//! back the final two bytes until it sees the end of the stream, so padding bits are
//! never handed out as rows.

use bitvec::prelude::*;
use std::io::{ErrorKind, Read};

use crate::error::{NullableError, Result};

/// Upper bound on the bytes pulled from a stream per read call.
const READ_BLOCK_BYTES: usize = 8192;

#[derive(Debug, Default, Clone)]
pub struct BitCarry {
    pending: BitVec<u8, Lsb0>,
    rows: usize,
}

impl BitCarry {
    /// Appends presence flags (nonzero = NULL) and returns the whole bytes now complete.
    pub fn push_flags(&mut self, flags: &[u8]) -> Vec<u8> {
        self.pending.extend(flags.iter().map(|&flag| flag != 0));
        self.rows += flags.len();

        let whole = self.pending.len() / 8;
        let out: Vec<u8> = self.pending[..whole * 8]
            .chunks_exact(8)
            .map(|byte| byte.load_le::<u8>())
            .collect();

        self.pending = self.pending[whole * 8..].to_bitvec();
        out
    }

    /// Number of bits waiting for a full byte.
    pub fn pending_bits(&self) -> usize {
        self.pending.len()
    }

    /// Emits the trailing partial byte, zero-padded, followed by the trailer byte.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2);
        let trailer = if !self.pending.is_empty() {
            let mut byte = 0u8;
            for (i, bit) in self.pending.iter().enumerate() {
                if *bit {
                    byte |= 1 << i;
                }
            }
            out.push(byte);
            self.pending.len() as u8
        } else if self.rows > 0 {
            8
        } else {
            0
        };
        out.push(trailer);
        self.pending.clear();
        self.rows = 0;
        out
    }
}

#[derive(Debug, Default, Clone)]
pub struct BitSource {
    /// Decoded flags not yet handed out.
    buffered: BitVec<u8, Lsb0>,
    /// Raw bytes not yet decoded; the last two may be the final data byte and trailer.
    raw: Vec<u8>,
    finished: bool,
    rows: usize,
}

impl BitSource {
    /// Reads up to `n` presence flags (as 0/1 bytes) from `r`.
    ///
    /// Fewer than `n` flags are returned only when the stream holds no more rows.
    pub fn read_flags(&mut self, r: &mut dyn Read, n: usize) -> Result<Vec<u8>> {
        while self.buffered.len() < n && !self.finished {
            let missing = (n - self.buffered.len()).div_ceil(8);
            let mut block = vec![0u8; missing.clamp(1, READ_BLOCK_BYTES)];
            let got = read_up_to(r, &mut block)?;
            self.raw.extend_from_slice(&block[..got]);
            if got < block.len() {
                self.finish()?;
            } else if self.raw.len() > 2 {
                let ready = self.raw.len() - 2;
                self.buffered
                    .extend_from_bitslice(self.raw[..ready].view_bits::<Lsb0>());
                self.raw.drain(..ready);
            }
        }

        let take = n.min(self.buffered.len());
        let out = self.buffered[..take]
            .iter()
            .map(|bit| u8::from(*bit))
            .collect();
        self.buffered = self.buffered[take..].to_bitvec();
        self.rows += take;
        Ok(out)
    }

    /// Whether the trailer has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes the held-back bytes once the end of the stream is reached.
    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let raw = std::mem::take(&mut self.raw);
        let Some((&trailer, data)) = raw.split_last() else {
            return Ok(());
        };
        let valid = usize::from(trailer);
        let row = self.rows;
        let malformed = |message: String| NullableError::malformed(row, message);
        match data.split_last() {
            None if valid == 0 => Ok(()),
            None => Err(malformed(format!(
                "packed presence trailer claims {} bits but no data byte precedes it",
                valid
            ))),
            Some((&last, full)) => {
                if !(1..=8).contains(&valid) {
                    return Err(malformed(format!(
                        "packed presence trailer {} is outside 1..=8",
                        valid
                    )));
                }
                self.buffered.extend_from_bitslice(full.view_bits::<Lsb0>());
                let last = [last];
                self.buffered
                    .extend_from_bitslice(&last.view_bits::<Lsb0>()[..valid]);
                Ok(())
            }
        }
    }
}

/// Fills `buf` from `r` until it is full or the stream ends; returns the bytes read.
pub fn read_up_to(r: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packed(flags: &[u8]) -> Vec<u8> {
        let mut carry = BitCarry::default();
        let mut bytes = carry.push_flags(flags);
        bytes.extend(carry.finish());
        bytes
    }

    #[test]
    fn test_carry_emits_whole_bytes_only() {
        let mut carry = BitCarry::default();
        let out = carry.push_flags(&[1, 0, 0, 1, 0]);
        assert!(out.is_empty());
        assert_eq!(carry.pending_bits(), 5);

        let out = carry.push_flags(&[0, 0, 1, 1]);
        // bits: 1,0,0,1,0,0,0,1 -> 0b1000_1001
        assert_eq!(out, vec![0b1000_1001]);
        assert_eq!(carry.pending_bits(), 1);
        assert_eq!(carry.finish(), vec![0b0000_0001, 1]);
    }

    #[test]
    fn test_trailer_for_aligned_and_empty_streams() {
        assert_eq!(packed(&[1; 8]), vec![0xFF, 8]);
        assert_eq!(packed(&[]), vec![0]);
    }

    #[test]
    fn test_source_reads_across_byte_boundaries() {
        let flags: Vec<u8> = (0..20).map(|i| u8::from(i % 3 == 0)).collect();
        let mut source = BitSource::default();
        let mut cursor = Cursor::new(packed(&flags));
        let mut decoded = Vec::new();
        for n in [3, 1, 9, 7] {
            decoded.extend(source.read_flags(&mut cursor, n).unwrap());
        }
        assert_eq!(decoded, flags);
        assert!(source.read_flags(&mut cursor, 4).unwrap().is_empty());
        assert!(source.is_finished());
    }

    #[test]
    fn test_source_never_returns_padding_bits() {
        let mut source = BitSource::default();
        let mut cursor = Cursor::new(packed(&[1, 1, 0]));
        assert_eq!(source.read_flags(&mut cursor, 16).unwrap(), vec![1, 1, 0]);

        let mut source = BitSource::default();
        let mut cursor = Cursor::new(packed(&[1; 8]));
        assert_eq!(source.read_flags(&mut cursor, 8).unwrap(), vec![1; 8]);
        assert!(source.read_flags(&mut cursor, 2).unwrap().is_empty());
    }

    #[test]
    fn test_huge_request_reads_in_bounded_blocks() {
        let mut source = BitSource::default();
        let mut cursor = Cursor::new(packed(&[0, 1, 0]));
        assert_eq!(source.read_flags(&mut cursor, 1 << 62).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn test_bad_trailer_is_malformed() {
        for bytes in [vec![0xFFu8, 9], vec![3u8], vec![0xFF, 0]] {
            let mut source = BitSource::default();
            let mut cursor = Cursor::new(bytes);
            assert!(matches!(
                source.read_flags(&mut cursor, 64),
                Err(NullableError::MalformedInput { .. })
            ));
        }
    }
}
