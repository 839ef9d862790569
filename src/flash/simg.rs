//! Android Sparse Image (simg) header reader
//!
//! The sparse image format encodes a block device image as a sequence of
//! typed chunks so that runs of don't-care and repeated blocks need not be
//! stored literally.
//!
//! Format specification (all fields little-endian):
//! - File header: 28 bytes (magic, version, sizes, block count, chunk count,
//!   checksum). A declared `file_hdr_sz` larger than 28 is followed by
//!   surplus bytes which are skipped.
//! - Chunks: each starts with a 12-byte header (again possibly padded to
//!   `chunk_hdr_sz`), followed by its payload
//!   - RAW: literal block data
//!   - FILL: 4-byte pattern repeated across blocks
//!   - DONT_CARE: no payload, blocks are left untouched
//!   - CRC32: checksum placeholder, not verified

use std::io::{self, Read};

use crate::flash::error::SparseError;

/// Sparse image magic number: 0xED26FF3A
pub const SPARSE_HEADER_MAGIC: u32 = 0xED26FF3A;

/// Size of the known file header structure
pub const SPARSE_HEADER_SIZE: usize = 28;

/// Size of the known chunk header structure
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Chunk type: Raw data
pub const CHUNK_TYPE_RAW: u16 = 0xCAC1;

/// Chunk type: Fill pattern
pub const CHUNK_TYPE_FILL: u16 = 0xCAC2;

/// Chunk type: Don't care (skip)
pub const CHUNK_TYPE_DONT_CARE: u16 = 0xCAC3;

/// Chunk type: CRC32 checksum
pub const CHUNK_TYPE_CRC32: u16 = 0xCAC4;

/// Size of the FILL chunk pattern payload
pub const FILL_PATTERN_SIZE: usize = 4;

/// Parsed sparse image header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseHeader {
    pub major_version: u16,
    pub minor_version: u16,
    /// Declared size of the file header, including any surplus bytes
    pub file_hdr_sz: u16,
    /// Declared size of every chunk header, including any surplus bytes
    pub chunk_hdr_sz: u16,
    /// Block size in bytes (typically 4096)
    pub block_size: u32,
    /// Total blocks in the output image
    pub total_blocks: u32,
    /// Total chunks in the sparse image
    pub total_chunks: u32,
    /// Image checksum (0 if not provided, never verified)
    pub image_checksum: u32,
}

impl SparseHeader {
    /// Total output image size in bytes
    pub fn image_size(&self) -> u64 {
        self.total_blocks as u64 * self.block_size as u64
    }
}

/// Type of sparse chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Raw data blocks - contains actual data to write
    Raw,
    /// Fill pattern - 4-byte value repeated across all blocks
    Fill,
    /// Don't care - blocks already hold acceptable content
    DontCare,
    /// Checksum placeholder
    Crc32,
    Unknown(u16),
}

impl ChunkType {
    pub fn from_raw(value: u16) -> Self {
        match value {
            CHUNK_TYPE_RAW => ChunkType::Raw,
            CHUNK_TYPE_FILL => ChunkType::Fill,
            CHUNK_TYPE_DONT_CARE => ChunkType::DontCare,
            CHUNK_TYPE_CRC32 => ChunkType::Crc32,
            other => ChunkType::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChunkType::Raw => "RAW",
            ChunkType::Fill => "FILL",
            ChunkType::DontCare => "DONT_CARE",
            ChunkType::Crc32 => "CRC32",
            ChunkType::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Parsed chunk header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: ChunkType,
    /// Number of output blocks this chunk represents
    pub chunk_sz: u32,
    /// Declared on-disk size of the chunk, header included
    pub total_sz: u32,
}

fn read_u16<R: Read>(input: &mut R, what: &'static str) -> Result<u16, SparseError> {
    let mut buf = [0u8; 2];
    input
        .read_exact(&mut buf)
        .map_err(|e| SparseError::from_read(e, what))?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(input: &mut R, what: &'static str) -> Result<u32, SparseError> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| SparseError::from_read(e, what))?;
    Ok(u32::from_le_bytes(buf))
}

/// Discard exactly `count` bytes from a sequential input
pub fn skip_bytes<R: Read>(
    input: &mut R,
    count: u64,
    what: &'static str,
) -> Result<(), SparseError> {
    if count == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut input.by_ref().take(count), &mut io::sink())
        .map_err(|e| SparseError::from_read(e, what))?;
    if skipped != count {
        return Err(SparseError::Truncated(what));
    }
    Ok(())
}

/// Read the sparse file header, skipping any surplus declared header bytes
///
/// Fields are read in declared order and width, independent of any
/// in-memory layout.
pub fn read_sparse_header<R: Read>(input: &mut R) -> Result<SparseHeader, SparseError> {
    const WHAT: &str = "sparse header";

    let magic = read_u32(input, WHAT)?;
    if magic != SPARSE_HEADER_MAGIC {
        return Err(SparseError::InvalidMagic(magic));
    }

    let major_version = read_u16(input, WHAT)?;
    let minor_version = read_u16(input, WHAT)?;
    // Reject images with major version other than 1
    if major_version != 1 {
        return Err(SparseError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let file_hdr_sz = read_u16(input, WHAT)?;
    let chunk_hdr_sz = read_u16(input, WHAT)?;
    if (file_hdr_sz as usize) < SPARSE_HEADER_SIZE {
        return Err(SparseError::InvalidHeaderSize(file_hdr_sz));
    }
    if (chunk_hdr_sz as usize) < CHUNK_HEADER_SIZE {
        return Err(SparseError::InvalidChunkHeaderSize(chunk_hdr_sz));
    }

    let header = SparseHeader {
        major_version,
        minor_version,
        file_hdr_sz,
        chunk_hdr_sz,
        block_size: read_u32(input, WHAT)?,
        total_blocks: read_u32(input, WHAT)?,
        total_chunks: read_u32(input, WHAT)?,
        image_checksum: read_u32(input, WHAT)?,
    };

    skip_bytes(input, (file_hdr_sz as usize - SPARSE_HEADER_SIZE) as u64, WHAT)?;

    Ok(header)
}

/// Read one chunk header, skipping surplus bytes up to `chunk_hdr_sz`
///
/// The chunk type is not validated here; unrecognized values come back as
/// [`ChunkType::Unknown`].
pub fn read_chunk_header<R: Read>(
    input: &mut R,
    header: &SparseHeader,
) -> Result<ChunkHeader, SparseError> {
    const WHAT: &str = "chunk header";

    let chunk_type = ChunkType::from_raw(read_u16(input, WHAT)?);
    // reserved
    read_u16(input, WHAT)?;
    let chunk_sz = read_u32(input, WHAT)?;
    let total_sz = read_u32(input, WHAT)?;

    skip_bytes(
        input,
        (header.chunk_hdr_sz as usize).saturating_sub(CHUNK_HEADER_SIZE) as u64,
        WHAT,
    )?;

    Ok(ChunkHeader {
        chunk_type,
        chunk_sz,
        total_sz,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn make_header_with_sizes(
        block_size: u32,
        total_blocks: u32,
        total_chunks: u32,
        file_hdr_sz: u16,
        chunk_hdr_sz: u16,
    ) -> Vec<u8> {
        let mut header = Vec::with_capacity(file_hdr_sz as usize);
        header.extend_from_slice(&SPARSE_HEADER_MAGIC.to_le_bytes());
        header.extend_from_slice(&1u16.to_le_bytes()); // major
        header.extend_from_slice(&0u16.to_le_bytes()); // minor
        header.extend_from_slice(&file_hdr_sz.to_le_bytes());
        header.extend_from_slice(&chunk_hdr_sz.to_le_bytes());
        header.extend_from_slice(&block_size.to_le_bytes());
        header.extend_from_slice(&total_blocks.to_le_bytes());
        header.extend_from_slice(&total_chunks.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // checksum
        header.resize(file_hdr_sz.max(28) as usize, 0xEE);
        header
    }

    pub(crate) fn make_header(block_size: u32, total_blocks: u32, total_chunks: u32) -> Vec<u8> {
        make_header_with_sizes(block_size, total_blocks, total_chunks, 28, 12)
    }

    pub(crate) fn make_chunk(chunk_type: u16, chunk_sz: u32, total_sz: u32) -> Vec<u8> {
        let mut chunk = Vec::with_capacity(12);
        chunk.extend_from_slice(&chunk_type.to_le_bytes());
        chunk.extend_from_slice(&0u16.to_le_bytes()); // reserved
        chunk.extend_from_slice(&chunk_sz.to_le_bytes());
        chunk.extend_from_slice(&total_sz.to_le_bytes());
        chunk
    }

    #[test]
    fn test_parse_header() {
        let header_bytes = make_header(4096, 1000, 10);
        let header = read_sparse_header(&mut Cursor::new(header_bytes)).unwrap();
        assert_eq!(header.block_size, 4096);
        assert_eq!(header.total_blocks, 1000);
        assert_eq!(header.total_chunks, 10);
        assert_eq!(header.image_size(), 4096 * 1000);
    }

    #[test]
    fn test_invalid_magic() {
        let mut header_bytes = make_header(4096, 1000, 10);
        header_bytes[0] = 0xFF; // Corrupt magic
        assert!(matches!(
            read_sparse_header(&mut Cursor::new(header_bytes)),
            Err(SparseError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unsupported_major_version() {
        let mut header_bytes = make_header(4096, 1, 1);
        header_bytes[4] = 2;
        assert!(matches!(
            read_sparse_header(&mut Cursor::new(header_bytes)),
            Err(SparseError::UnsupportedVersion { major: 2, minor: 0 })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let header_bytes = make_header(4096, 1, 1);
        let result = read_sparse_header(&mut Cursor::new(&header_bytes[..20]));
        assert!(matches!(result, Err(SparseError::Truncated(_))));
    }

    #[test]
    fn test_undersized_header_sizes_rejected() {
        let header_bytes = make_header_with_sizes(4096, 1, 1, 20, 12);
        assert!(matches!(
            read_sparse_header(&mut Cursor::new(header_bytes)),
            Err(SparseError::InvalidHeaderSize(20))
        ));

        let header_bytes = make_header_with_sizes(4096, 1, 1, 28, 8);
        assert!(matches!(
            read_sparse_header(&mut Cursor::new(header_bytes)),
            Err(SparseError::InvalidChunkHeaderSize(8))
        ));
    }

    #[test]
    fn test_surplus_header_bytes_skipped() {
        let mut data = make_header_with_sizes(4096, 2, 1, 32, 16);
        let mut chunk = make_chunk(CHUNK_TYPE_DONT_CARE, 2, 16);
        chunk.extend_from_slice(&[0xEE; 4]); // chunk header surplus
        data.extend(chunk);
        data.push(0x42);

        let mut input = Cursor::new(data);
        let header = read_sparse_header(&mut input).unwrap();
        assert_eq!(header.file_hdr_sz, 32);
        assert_eq!(input.position(), 32);

        let chunk = read_chunk_header(&mut input, &header).unwrap();
        assert_eq!(chunk.chunk_type, ChunkType::DontCare);
        assert_eq!(chunk.chunk_sz, 2);
        assert_eq!(chunk.total_sz, 16);
        assert_eq!(input.position(), 48);
    }

    #[test]
    fn test_unknown_chunk_type_is_reported_not_rejected() {
        let header = read_sparse_header(&mut Cursor::new(make_header(512, 1, 1))).unwrap();
        let chunk = make_chunk(0x9999, 1, 12);
        let chunk = read_chunk_header(&mut Cursor::new(chunk), &header).unwrap();
        assert_eq!(chunk.chunk_type, ChunkType::Unknown(0x9999));
    }

    #[test]
    fn test_skip_bytes_detects_short_input() {
        let mut input = Cursor::new(vec![0u8; 10]);
        assert!(matches!(
            skip_bytes(&mut input, 11, "CRC32 payload"),
            Err(SparseError::Truncated("CRC32 payload"))
        ));
    }
}
