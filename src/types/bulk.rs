//! Settings and state objects for the three-phase bulk serialization protocol.
//!
//! ```text
//! write:  state = T.serialize_bulk_state_prefix(settings)           // begin
//!         T.serialize_bulk_with_multiple_streams(col, off, n, ..)  // chunk, any number of times
//!         T.serialize_bulk_state_suffix(settings, state)           // end
//!
//! read:   state = T.deserialize_bulk_state_prefix(settings)         // begin
//!         T.deserialize_bulk_with_multiple_streams(col, n, ..)     // chunk, until it returns 0
//! ```
//!
//! States are trees mirroring the type: a node carries its own local bookkeeping plus one
//! child per nested type, in declaration order. Each node records the name of the type
//! that created it so a state cannot silently be threaded into another type's pass.

use std::io::{Read, Write};

use crate::config::PresenceEncoding;
use crate::error::{NullableError, Result};
use crate::io::{InputStreams, OutputStreams};
use crate::kernels::bitpack::{BitCarry, BitSource};
use crate::types::substream::{stream_name, Substream, SubstreamPath};

//==================================================================================
// I. Settings
//==================================================================================

pub struct SerializeBulkSettings<'a> {
    pub streams: &'a mut dyn OutputStreams,
    pub column_name: String,
    pub path: SubstreamPath,
    pub presence_encoding: PresenceEncoding,
}

impl<'a> SerializeBulkSettings<'a> {
    pub fn new(
        streams: &'a mut dyn OutputStreams,
        column_name: impl Into<String>,
        presence_encoding: PresenceEncoding,
    ) -> Self {
        Self {
            streams,
            column_name: column_name.into(),
            path: SubstreamPath::new(),
            presence_encoding,
        }
    }

    pub fn current_stream_name(&self) -> String {
        stream_name(&self.column_name, &self.path)
    }

    /// The sub-stream addressed by the current path.
    pub fn output(&mut self) -> Result<&mut dyn Write> {
        let name = self.current_stream_name();
        self.streams.output(&name)
    }
}

pub struct DeserializeBulkSettings<'a> {
    pub streams: &'a mut dyn InputStreams,
    pub column_name: String,
    pub path: SubstreamPath,
    pub presence_encoding: PresenceEncoding,
}

impl<'a> DeserializeBulkSettings<'a> {
    pub fn new(
        streams: &'a mut dyn InputStreams,
        column_name: impl Into<String>,
        presence_encoding: PresenceEncoding,
    ) -> Self {
        Self {
            streams,
            column_name: column_name.into(),
            path: SubstreamPath::new(),
            presence_encoding,
        }
    }

    pub fn current_stream_name(&self) -> String {
        stream_name(&self.column_name, &self.path)
    }

    pub fn input(&mut self) -> Result<&mut dyn Read> {
        let name = self.current_stream_name();
        self.streams.input(&name)
    }
}

/// Access to the substream path shared by both settings types.
pub trait SubstreamCursor {
    fn path_mut(&mut self) -> &mut SubstreamPath;
}

impl SubstreamCursor for SerializeBulkSettings<'_> {
    fn path_mut(&mut self) -> &mut SubstreamPath {
        &mut self.path
    }
}

impl SubstreamCursor for DeserializeBulkSettings<'_> {
    fn path_mut(&mut self) -> &mut SubstreamPath {
        &mut self.path
    }
}

/// Runs `f` with `substream` pushed onto the path, popping it again afterwards even if
/// `f` fails.
pub fn in_substream<S: SubstreamCursor, R>(
    settings: &mut S,
    substream: Substream,
    f: impl FnOnce(&mut S) -> Result<R>,
) -> Result<R> {
    settings.path_mut().push(substream);
    let result = f(settings);
    settings.path_mut().pop();
    result
}

//==================================================================================
// II. State trees
//==================================================================================

/// Write-side bookkeeping local to one node.
#[derive(Debug, Default)]
pub enum SerializeLocal {
    #[default]
    None,
    /// Presence bits not yet forming a whole byte.
    PresenceBits(BitCarry),
}

/// Read-side bookkeeping local to one node.
#[derive(Debug, Default)]
pub enum DeserializeLocal {
    #[default]
    None,
    /// Presence bits pulled from the stream but not yet handed to the column.
    PresenceBits(BitSource),
}

#[derive(Debug)]
pub struct BulkState<L> {
    owner: String,
    local: L,
    rows: usize,
    finished: bool,
    children: Vec<BulkState<L>>,
}

pub type SerializeBulkState = BulkState<SerializeLocal>;
pub type DeserializeBulkState = BulkState<DeserializeLocal>;

impl<L: Default> BulkState<L> {
    /// A node with no local bookkeeping and no children.
    pub fn leaf(owner: impl Into<String>) -> Self {
        Self::with_children(owner, Vec::new())
    }

    pub fn with_children(owner: impl Into<String>, children: Vec<BulkState<L>>) -> Self {
        Self {
            owner: owner.into(),
            local: L::default(),
            rows: 0,
            finished: false,
            children,
        }
    }
}

impl<L> BulkState<L> {
    pub fn with_local(mut self, local: L) -> Self {
        self.local = local;
        self
    }

    /// Name of the type whose `*_state_prefix` created this node.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Rows this node has processed so far in the pass.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn children(&self) -> &[BulkState<L>] {
        &self.children
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut L {
        &mut self.local
    }

    pub fn child_mut(&mut self, index: usize) -> Result<&mut BulkState<L>> {
        let owner = self.owner.clone();
        self.children
            .get_mut(index)
            .ok_or_else(|| NullableError::StateMismatch {
                expected: format!("{} with nested state #{}", owner, index),
                actual: owner,
            })
    }

    /// Verifies this node belongs to `owner` and its pass is still open.
    pub fn check(&self, owner: &str) -> Result<()> {
        if self.owner != owner {
            return Err(NullableError::StateMismatch {
                expected: owner.to_string(),
                actual: self.owner.clone(),
            });
        }
        if self.finished {
            return Err(NullableError::StateFinished(self.owner.clone()));
        }
        Ok(())
    }

    pub fn advance(&mut self, rows: usize) {
        self.rows += rows;
    }

    /// Closes the pass for this node. Ending twice is a state error.
    pub fn finish(&mut self, owner: &str) -> Result<()> {
        self.check(owner)?;
        self.finished = true;
        Ok(())
    }
}
