//! Read-only listing of a sparse image's chunks

use std::io::Read;

use crate::flash::error::SparseError;
use crate::flash::simg::{
    read_chunk_header, read_sparse_header, skip_bytes, ChunkType, SparseHeader, FILL_PATTERN_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: u32,
    pub chunk_type: ChunkType,
    pub chunk_sz: u32,
    pub total_sz: u32,
    /// Byte offset of the chunk's first block in the expanded image
    pub output_offset: u64,
    /// Pattern of a FILL chunk
    pub fill_pattern: Option<[u8; FILL_PATTERN_SIZE]>,
}

#[derive(Debug, Clone)]
pub struct ImageLayout {
    pub header: SparseHeader,
    pub chunks: Vec<ChunkInfo>,
}

impl ImageLayout {
    /// Sum of the block counts of all chunks
    pub fn chunk_blocks(&self) -> u64 {
        self.chunks.iter().map(|c| c.chunk_sz as u64).sum()
    }

    pub fn is_consistent(&self) -> bool {
        self.chunk_blocks() == self.header.total_blocks as u64
    }
}

impl std::fmt::Display for ImageLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            "Sparse image v{}.{}: {} chunks, {} blocks of {} bytes ({} bytes expanded)",
            h.major_version,
            h.minor_version,
            h.total_chunks,
            h.total_blocks,
            h.block_size,
            h.image_size()
        )?;
        for chunk in &self.chunks {
            write!(
                f,
                "{:>6}: offset {:>12} {:<9} {} blocks",
                chunk.index,
                chunk.output_offset,
                chunk.chunk_type.name(),
                chunk.chunk_sz
            )?;
            match (chunk.chunk_type, chunk.fill_pattern) {
                (ChunkType::Fill, Some(pattern)) => writeln!(f, ", pattern {:02x?}", pattern)?,
                (ChunkType::Unknown(value), _) => writeln!(f, ", type 0x{:04X}", value)?,
                _ => writeln!(f)?,
            }
        }
        if !self.is_consistent() {
            writeln!(
                f,
                "Warning: chunks describe {} blocks, header declares {}",
                self.chunk_blocks(),
                h.total_blocks
            )?;
        }
        Ok(())
    }
}

/// Walk every chunk header without writing anything
///
/// Each payload is skipped by its declared `total_sz`. Unknown chunk types
/// are listed rather than rejected.
pub fn inspect<R: Read>(mut input: R) -> Result<ImageLayout, SparseError> {
    let header = read_sparse_header(&mut input)?;
    let mut chunks = Vec::new();
    let mut output_offset = 0u64;

    for index in 0..header.total_chunks {
        let chunk = read_chunk_header(&mut input, &header)?;
        let payload = (chunk.total_sz as u64)
            .checked_sub(header.chunk_hdr_sz as u64)
            .ok_or(SparseError::ChunkSizeMismatch {
                chunk_type: chunk.chunk_type.name(),
                expected: header.chunk_hdr_sz as u64,
                actual: chunk.total_sz,
            })?;

        let mut fill_pattern = None;
        let mut remaining = payload;
        if chunk.chunk_type == ChunkType::Fill && payload >= FILL_PATTERN_SIZE as u64 {
            let mut pattern = [0u8; FILL_PATTERN_SIZE];
            input
                .read_exact(&mut pattern)
                .map_err(|e| SparseError::from_read(e, "FILL pattern"))?;
            fill_pattern = Some(pattern);
            remaining -= FILL_PATTERN_SIZE as u64;
        }
        skip_bytes(&mut input, remaining, "chunk payload")?;

        chunks.push(ChunkInfo {
            index,
            chunk_type: chunk.chunk_type,
            chunk_sz: chunk.chunk_sz,
            total_sz: chunk.total_sz,
            output_offset,
            fill_pattern,
        });
        output_offset += chunk.chunk_sz as u64 * header.block_size as u64;
    }

    Ok(ImageLayout { header, chunks })
}
