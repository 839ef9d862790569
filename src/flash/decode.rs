//! Chunk dispatch loop
//!
//! Drives exactly `total_chunks` iterations over the input, validating each
//! chunk's declared sizes against the header and the destination capacity
//! before routing it to its handler. Every check happens before the chunk's
//! first write; a failure aborts the decode and leaves earlier chunks'
//! writes in place.

use std::io::Read;
use std::time::Instant;

use tracing::debug;

use crate::flash::block_writer::{BlockWriter, Destination};
use crate::flash::error::SparseError;
use crate::flash::finalize::finalize;
use crate::flash::progress::{ChunkCounts, DecodeSummary};
use crate::flash::simg::{
    read_chunk_header, read_sparse_header, skip_bytes, ChunkHeader, ChunkType, SparseHeader,
    FILL_PATTERN_SIZE,
};

/// Upper bound on the buffer used to stream a RAW chunk to the destination
pub const RAW_COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Running counters carried across loop iterations
#[derive(Debug, Clone, Default)]
pub struct DecodeState {
    /// Blocks accounted for so far
    pub total_blocks: u32,
    /// Type of the most recently processed chunk
    pub last_chunk: Option<ChunkType>,
    pub chunks: ChunkCounts,
}

impl DecodeState {
    /// Byte offset of the next block in the destination
    pub fn offset(&self, header: &SparseHeader) -> u64 {
        self.total_blocks as u64 * header.block_size as u64
    }

    fn blocks_after(&self, chunk_sz: u32) -> Result<u32, SparseError> {
        self.total_blocks
            .checked_add(chunk_sz)
            .ok_or(SparseError::BlockCountOverflow {
                total_blocks: self.total_blocks,
                chunk_sz,
            })
    }

    fn add_blocks(&mut self, chunk_sz: u32) -> Result<(), SparseError> {
        self.total_blocks = self.blocks_after(chunk_sz)?;
        Ok(())
    }
}

/// Decode a sparse image from `input` onto `dest`
///
/// `capacity` is the number of bytes the destination may receive; an image
/// declaring or accumulating more fails with [`SparseError::SizeExceeded`].
pub fn decode<R: Read, D: Destination>(
    mut input: R,
    dest: D,
    capacity: u64,
) -> Result<DecodeSummary, SparseError> {
    let start = Instant::now();

    let header = read_sparse_header(&mut input)?;
    debug!(
        major_version = header.major_version,
        minor_version = header.minor_version,
        file_hdr_sz = header.file_hdr_sz,
        chunk_hdr_sz = header.chunk_hdr_sz,
        block_size = header.block_size,
        total_blocks = header.total_blocks,
        total_chunks = header.total_chunks,
        "sparse image header"
    );

    if header.image_size() > capacity {
        return Err(SparseError::SizeExceeded {
            required: header.image_size(),
            capacity,
        });
    }

    let mut writer = BlockWriter::new(dest);
    let mut state = DecodeState::default();

    for index in 0..header.total_chunks {
        // Make sure the total image size does not exceed the partition size
        let offset = state.offset(&header);
        if offset >= capacity {
            return Err(SparseError::SizeExceeded {
                required: offset,
                capacity,
            });
        }

        let chunk = read_chunk_header(&mut input, &header)?;
        debug!(
            index,
            chunk_type = chunk.chunk_type.name(),
            chunk_sz = chunk.chunk_sz,
            total_sz = chunk.total_sz,
            offset,
            "chunk header"
        );

        match chunk.chunk_type {
            ChunkType::Raw => {
                write_raw(&mut input, &mut writer, &header, &chunk, &mut state, capacity)?
            }
            ChunkType::Fill => {
                write_fill(&mut input, &mut writer, &header, &chunk, &mut state, capacity)?
            }
            ChunkType::DontCare => state.add_blocks(chunk.chunk_sz)?,
            ChunkType::Crc32 => skip_crc(&mut input, &header, &chunk, &mut state)?,
            ChunkType::Unknown(value) => return Err(SparseError::UnknownChunkType(value)),
        }

        state.last_chunk = Some(chunk.chunk_type);
        state.chunks.record(chunk.chunk_type);
    }

    let padded = finalize(&mut writer, &header, &state, capacity)?;

    Ok(DecodeSummary {
        total_blocks: state.total_blocks,
        bytes_written: writer.bytes_written(),
        chunks: state.chunks,
        padded,
        elapsed: start.elapsed(),
        header,
    })
}

/// `blk_sz * chunk_sz`, rejected if it does not fit in 32 bits
fn chunk_data_size(header: &SparseHeader, chunk: &ChunkHeader) -> Result<u32, SparseError> {
    header
        .block_size
        .checked_mul(chunk.chunk_sz)
        .ok_or(SparseError::ChunkSizeOverflow {
            chunk_sz: chunk.chunk_sz,
            block_size: header.block_size,
        })
}

fn check_total_size(chunk: &ChunkHeader, expected: u64) -> Result<(), SparseError> {
    if chunk.total_sz as u64 != expected {
        return Err(SparseError::ChunkSizeMismatch {
            chunk_type: chunk.chunk_type.name(),
            expected,
            actual: chunk.total_sz,
        });
    }
    Ok(())
}

/// Zeroed buffer of exactly `len` bytes, or [`SparseError::AllocationFailure`]
fn alloc_buffer(len: usize) -> Result<Vec<u8>, SparseError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SparseError::AllocationFailure(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

fn write_raw<R: Read, D: Destination>(
    input: &mut R,
    writer: &mut BlockWriter<D>,
    header: &SparseHeader,
    chunk: &ChunkHeader,
    state: &mut DecodeState,
    capacity: u64,
) -> Result<(), SparseError> {
    let data_size = chunk_data_size(header, chunk)?;

    // Make sure the chunk does not run past the end of the partition
    let offset = state.offset(header);
    let end = offset + data_size as u64;
    if end > capacity {
        return Err(SparseError::SizeExceeded {
            required: end,
            capacity,
        });
    }

    check_total_size(chunk, header.chunk_hdr_sz as u64 + data_size as u64)?;
    let new_total = state.blocks_after(chunk.chunk_sz)?;

    let buf_len = (data_size as usize).min(RAW_COPY_BUFFER_SIZE);
    let mut buf = alloc_buffer(buf_len)?;
    let mut written = 0u64;
    while written < data_size as u64 {
        let len = (data_size as u64 - written).min(buf_len as u64) as usize;
        input
            .read_exact(&mut buf[..len])
            .map_err(|e| SparseError::from_read(e, "RAW chunk payload"))?;
        writer.write_blocks(offset + written, &buf[..len])?;
        written += len as u64;
    }

    state.total_blocks = new_total;
    Ok(())
}

fn write_fill<R: Read, D: Destination>(
    input: &mut R,
    writer: &mut BlockWriter<D>,
    header: &SparseHeader,
    chunk: &ChunkHeader,
    state: &mut DecodeState,
    capacity: u64,
) -> Result<(), SparseError> {
    check_total_size(chunk, header.chunk_hdr_sz as u64 + FILL_PATTERN_SIZE as u64)?;
    if header.block_size == 0 {
        return Err(SparseError::InvalidBlockSize(header.block_size));
    }

    let mut pattern = [0u8; FILL_PATTERN_SIZE];
    input
        .read_exact(&mut pattern)
        .map_err(|e| SparseError::from_read(e, "FILL pattern"))?;

    if chunk.chunk_sz == 0 {
        return Ok(());
    }
    let new_total = state.blocks_after(chunk.chunk_sz)?;

    // Nothing is allocated for a chunk whose first block cannot fit
    let block_size = header.block_size as u64;
    let first_end = state.offset(header) + block_size;
    if first_end > capacity {
        return Err(SparseError::SizeExceeded {
            required: first_end,
            capacity,
        });
    }

    let mut block = alloc_buffer(header.block_size as usize)?;
    for (byte, value) in block.iter_mut().zip(pattern.iter().cycle()) {
        *byte = *value;
    }

    while state.total_blocks < new_total {
        let offset = state.offset(header);
        if offset + block_size > capacity {
            return Err(SparseError::SizeExceeded {
                required: offset + block_size,
                capacity,
            });
        }
        writer.write_blocks(offset, &block)?;
        state.total_blocks += 1;
    }

    Ok(())
}

/// CRC32 chunks only have their bookkeeping checked; the checksum is never
/// recomputed or compared.
fn skip_crc<R: Read>(
    input: &mut R,
    header: &SparseHeader,
    chunk: &ChunkHeader,
    state: &mut DecodeState,
) -> Result<(), SparseError> {
    check_total_size(chunk, header.chunk_hdr_sz as u64)?;
    state.add_blocks(chunk.chunk_sz)?;
    skip_bytes(
        input,
        header.block_size as u64 * chunk.chunk_sz as u64,
        "CRC32 payload",
    )
}
