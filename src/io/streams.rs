//! Named sub-stream sets for the bulk serialization protocol.
//!
//! A logical column serializes into several physical sub-streams, addressed by the name
//! `types::substream::stream_name` derives from the column name and the substream path.
//! The bulk codecs only ever see the two traits below; where the bytes end up (memory,
//! one file per sub-stream, a network segment) is the stream set's concern.

use log::debug;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{NullableError, Result};

/// Write side: sub-streams are created on first use.
pub trait OutputStreams {
    fn output(&mut self, name: &str) -> Result<&mut dyn Write>;

    fn flush_all(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read side: asking for a sub-stream that was never written is an error.
pub trait InputStreams {
    fn input(&mut self, name: &str) -> Result<&mut dyn Read>;
}

//==================================================================================
// 1. In-memory streams
//==================================================================================

/// Every sub-stream held as a growable buffer. The same instance can be written, then
/// `rewind`-ed and read back.
#[derive(Debug, Default, Clone)]
pub struct MemoryStreams {
    streams: BTreeMap<String, Cursor<Vec<u8>>>,
}

impl MemoryStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every read position back to the start of its sub-stream.
    pub fn rewind(&mut self) {
        for cursor in self.streams.values_mut() {
            cursor.set_position(0);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.streams.get(name).map(|cursor| cursor.get_ref().as_slice())
    }

    /// Replaces (or creates) a sub-stream with the given contents.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.streams.insert(name.into(), Cursor::new(bytes));
    }

    pub fn total_bytes(&self) -> usize {
        self.streams.values().map(|cursor| cursor.get_ref().len()).sum()
    }
}

impl OutputStreams for MemoryStreams {
    fn output(&mut self, name: &str) -> Result<&mut dyn Write> {
        let cursor = self.streams.entry(name.to_string()).or_default();
        cursor.seek(SeekFrom::End(0))?;
        Ok(cursor)
    }
}

impl InputStreams for MemoryStreams {
    fn input(&mut self, name: &str) -> Result<&mut dyn Read> {
        match self.streams.get_mut(name) {
            Some(cursor) => Ok(cursor),
            None => Err(NullableError::MissingStream(name.to_string())),
        }
    }
}

//==================================================================================
// 2. Directory-backed streams
//==================================================================================

/// One file per sub-stream inside a directory, named `<escaped stream name>.bin`.
#[derive(Debug)]
pub struct DirectoryStreams {
    dir: PathBuf,
    writers: BTreeMap<String, BufWriter<File>>,
    readers: BTreeMap<String, BufReader<File>>,
}

impl DirectoryStreams {
    /// Opens (and creates, if missing) the directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: BTreeMap::new(),
            readers: BTreeMap::new(),
        })
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", escape_for_file_name(name)))
    }
}

impl OutputStreams for DirectoryStreams {
    fn output(&mut self, name: &str) -> Result<&mut dyn Write> {
        if !self.writers.contains_key(name) {
            let path = self.file_path(name);
            debug!("Creating sub-stream file {}", path.display());
            let file = File::create(&path)?;
            self.writers.insert(name.to_string(), BufWriter::new(file));
        }
        match self.writers.get_mut(name) {
            Some(writer) => Ok(writer),
            None => Err(NullableError::MissingStream(name.to_string())),
        }
    }

    fn flush_all(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl InputStreams for DirectoryStreams {
    fn input(&mut self, name: &str) -> Result<&mut dyn Read> {
        if !self.readers.contains_key(name) {
            let path = self.file_path(name);
            if !path.exists() {
                return Err(NullableError::MissingStream(name.to_string()));
            }
            let file = File::open(&path)?;
            self.readers.insert(name.to_string(), BufReader::new(file));
        }
        match self.readers.get_mut(name) {
            Some(reader) => Ok(reader),
            None => Err(NullableError::MissingStream(name.to_string())),
        }
    }
}

/// Keeps ASCII alphanumerics, `_` and `.`; everything else becomes `%XX`.
pub fn escape_for_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_streams_write_then_read() {
        let mut streams = MemoryStreams::new();
        streams.output("x.null").unwrap().write_all(&[0, 1]).unwrap();
        streams.output("x").unwrap().write_all(&[7]).unwrap();
        streams.output("x.null").unwrap().write_all(&[0]).unwrap();
        streams.rewind();

        let mut buf = Vec::new();
        streams.input("x.null").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 1, 0]);
        assert_eq!(streams.names(), vec!["x".to_string(), "x.null".to_string()]);
    }

    #[test]
    fn test_missing_input_stream_is_error() {
        let mut streams = MemoryStreams::new();
        assert!(matches!(
            streams.input("nope"),
            Err(NullableError::MissingStream(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_escape_for_file_name() {
        assert_eq!(escape_for_file_name("a.size0"), "a.size0");
        assert_eq!(escape_for_file_name("my col/1"), "my%20col%2F1");
    }

    #[test]
    fn test_directory_streams_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut streams = DirectoryStreams::open(dir.path()).unwrap();
            streams.output("c.null").unwrap().write_all(&[1, 0]).unwrap();
            streams.flush_all().unwrap();
        }
        let mut streams = DirectoryStreams::open(dir.path()).unwrap();
        let mut buf = Vec::new();
        streams.input("c.null").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 0]);
        assert!(streams.input("c").is_err());
    }
}
