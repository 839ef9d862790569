//! Error types for sparse image decoding

use std::io;

use thiserror::Error;

use crate::flash::simg::{CHUNK_HEADER_SIZE, SPARSE_HEADER_MAGIC, SPARSE_HEADER_SIZE};

/// Coarse classification of a [`SparseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Truncated or malformed header
    Format,
    /// Declared or accumulated image size exceeds the destination capacity
    SizeExceeded,
    /// Block-count or byte-size arithmetic would wrap
    IntegerOverflow,
    /// Declared chunk size inconsistent with its type
    ChunkSizeMismatch,
    UnknownChunkType,
    /// Destination seek or write came up short
    WriteFailure,
    /// A chunk buffer could not be obtained
    AllocationFailure,
    /// Final block accounting differs from the header's total
    BlockCountMismatch,
    /// Reading the input failed for a reason other than end of stream
    Io,
}

#[derive(Debug, Error)]
pub enum SparseError {
    #[error("Unexpected end of sparse image data while reading {0}")]
    Truncated(&'static str),

    #[error("Invalid sparse image magic: 0x{0:08X} (expected 0x{magic:08X})", magic = SPARSE_HEADER_MAGIC)]
    InvalidMagic(u32),

    #[error("Unsupported sparse image version: {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("Invalid header size: {0} (expected at least {min})", min = SPARSE_HEADER_SIZE)]
    InvalidHeaderSize(u16),

    #[error("Invalid chunk header size: {0} (expected at least {min})", min = CHUNK_HEADER_SIZE)]
    InvalidChunkHeaderSize(u16),

    #[error("Invalid block size {0} for a FILL chunk")]
    InvalidBlockSize(u32),

    #[error("Image size too large: {required} bytes needed, destination holds {capacity}")]
    SizeExceeded { required: u64, capacity: u64 },

    #[error("Chunk size calculation overflow: {chunk_sz} blocks x {block_size} bytes/block")]
    ChunkSizeOverflow { chunk_sz: u32, block_size: u32 },

    #[error("Block count overflow: {total_blocks} blocks written, chunk adds {chunk_sz}")]
    BlockCountOverflow { total_blocks: u32, chunk_sz: u32 },

    #[error("Bogus chunk size for chunk type {chunk_type}: expected {expected}, got {actual}")]
    ChunkSizeMismatch {
        chunk_type: &'static str,
        expected: u64,
        actual: u32,
    },

    #[error("Unknown chunk type: 0x{0:04X}")]
    UnknownChunkType(u16),

    #[error("Flash write failure at offset {offset} ({len} bytes): {source}")]
    WriteFailure {
        offset: u64,
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("Failed to allocate {0} byte buffer")]
    AllocationFailure(usize),

    #[error("Sparse image write failure: wrote {actual} blocks, expected {expected}")]
    BlockCountMismatch { expected: u32, actual: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SparseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SparseError::Truncated(_)
            | SparseError::InvalidMagic(_)
            | SparseError::UnsupportedVersion { .. }
            | SparseError::InvalidHeaderSize(_)
            | SparseError::InvalidChunkHeaderSize(_)
            | SparseError::InvalidBlockSize(_) => ErrorKind::Format,
            SparseError::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            SparseError::ChunkSizeOverflow { .. } | SparseError::BlockCountOverflow { .. } => {
                ErrorKind::IntegerOverflow
            }
            SparseError::ChunkSizeMismatch { .. } => ErrorKind::ChunkSizeMismatch,
            SparseError::UnknownChunkType(_) => ErrorKind::UnknownChunkType,
            SparseError::WriteFailure { .. } => ErrorKind::WriteFailure,
            SparseError::AllocationFailure(_) => ErrorKind::AllocationFailure,
            SparseError::BlockCountMismatch { .. } => ErrorKind::BlockCountMismatch,
            SparseError::Io(_) => ErrorKind::Io,
        }
    }

    /// Map a read error, turning end-of-stream into [`SparseError::Truncated`]
    pub(crate) fn from_read(e: io::Error, what: &'static str) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SparseError::Truncated(what)
        } else {
            SparseError::Io(e)
        }
    }
}
