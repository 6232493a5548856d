//! Structured error types for scopetrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::{DescriptorId, ThreadId, Timestamp};
use thiserror::Error;

/// Failure to decode a single record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Record too short: {len} bytes, header needs {needed}")]
    TooShort { len: usize, needed: usize },

    #[error("Unknown block type tag {0}")]
    UnknownBlockType(u8),

    #[error("String field is missing its terminator")]
    MissingTerminator,

    #[error("String field is not valid UTF-8")]
    InvalidUtf8,

    #[error("Block ends before it begins ({begin} > {end})")]
    InvertedInterval { begin: u64, end: u64 },
}

/// Failure to persist a profile
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to create profile file {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Too many descriptors for one stream: {0}")]
    TooManyDescriptors(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Nesting violation found while rebuilding a thread's call tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Block on {thread} ends before it begins ({begin} > {end})")]
    InvertedInterval { thread: ThreadId, begin: Timestamp, end: Timestamp },

    #[error(
        "Block [{child_begin}, {child_end}] on {thread} partially overlaps [{parent_begin}, {parent_end}]"
    )]
    Overlap {
        thread: ThreadId,
        parent_begin: Timestamp,
        parent_end: Timestamp,
        child_begin: Timestamp,
        child_end: Timestamp,
    },
}

/// Failure of a profile load
///
/// `Cancelled` is kept distinct from the data-integrity variants so callers
/// can tell a user interrupt from a corrupt stream.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("A load is already in progress")]
    Busy,

    #[error("Load was cancelled")]
    Cancelled,

    #[error("Failed to open profile {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a scopetrace profile (bad magic)")]
    BadMagic,

    #[error("Unsupported profile format version {0}")]
    UnsupportedVersion(u16),

    #[error("Stream truncated at byte {offset}: expected {expected} more bytes")]
    Truncated { offset: u64, expected: usize },

    #[error("Record {index} at byte {offset}: {source}")]
    Decode {
        index: usize,
        offset: u64,
        #[source]
        source: CodecError,
    },

    #[error("Block record {index} references unknown descriptor {id}")]
    UnknownDescriptor { index: usize, id: DescriptorId },

    #[error("Descriptor record {index} has id {found}, expected {expected}")]
    DescriptorOutOfOrder { index: usize, expected: u32, found: u32 },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Loader worker thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// True for errors caused by a corrupt or truncated stream
    #[must_use]
    pub fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            LoadError::BadMagic
                | LoadError::UnsupportedVersion(_)
                | LoadError::Truncated { .. }
                | LoadError::Decode { .. }
                | LoadError::UnknownDescriptor { .. }
                | LoadError::DescriptorOutOfOrder { .. }
                | LoadError::Tree(_)
        )
    }
}
