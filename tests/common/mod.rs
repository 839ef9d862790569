// Shared test utilities
use flate2::write::GzEncoder;
use flate2::Compression;
use sparse_flash::flash::simg::{
    CHUNK_HEADER_SIZE, CHUNK_TYPE_CRC32, CHUNK_TYPE_DONT_CARE, CHUNK_TYPE_FILL, CHUNK_TYPE_RAW,
    SPARSE_HEADER_MAGIC, SPARSE_HEADER_SIZE,
};
use std::io::Write;
use xz2::write::XzEncoder;

/// Generate deterministic test data of a given size
#[allow(dead_code)]
pub fn create_test_data(size: usize) -> Vec<u8> {
    // Create a repeating pattern for easier debugging
    let pattern = b"TESTDATA";
    let mut data = Vec::with_capacity(size);

    for i in 0..size {
        data.push(pattern[i % pattern.len()]);
    }

    data
}

/// Assembles sparse images chunk by chunk; the header's block and chunk
/// totals are derived from what was added unless overridden
pub struct SparseImageBuilder {
    block_size: u32,
    chunks: Vec<u8>,
    blocks: u32,
    chunk_count: u32,
    total_blocks_override: Option<u32>,
}

#[allow(dead_code)]
impl SparseImageBuilder {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size,
            chunks: Vec::new(),
            blocks: 0,
            chunk_count: 0,
            total_blocks_override: None,
        }
    }

    fn chunk(mut self, chunk_type: u16, chunk_sz: u32, payload: &[u8]) -> Self {
        let total_sz = (CHUNK_HEADER_SIZE + payload.len()) as u32;
        self.chunks.extend_from_slice(&chunk_type.to_le_bytes());
        self.chunks.extend_from_slice(&0u16.to_le_bytes()); // reserved
        self.chunks.extend_from_slice(&chunk_sz.to_le_bytes());
        self.chunks.extend_from_slice(&total_sz.to_le_bytes());
        self.chunks.extend_from_slice(payload);
        self.blocks += chunk_sz;
        self.chunk_count += 1;
        self
    }

    pub fn raw(self, data: &[u8]) -> Self {
        assert_eq!(data.len() % self.block_size as usize, 0);
        let blocks = (data.len() / self.block_size as usize) as u32;
        self.chunk(CHUNK_TYPE_RAW, blocks, data)
    }

    pub fn fill(self, blocks: u32, pattern: [u8; 4]) -> Self {
        self.chunk(CHUNK_TYPE_FILL, blocks, &pattern)
    }

    pub fn dont_care(self, blocks: u32) -> Self {
        self.chunk(CHUNK_TYPE_DONT_CARE, blocks, &[])
    }

    /// CRC32 chunk accounting for zero blocks
    pub fn crc32(self) -> Self {
        self.chunk(CHUNK_TYPE_CRC32, 0, &[])
    }

    pub fn unknown(self, chunk_type: u16, blocks: u32) -> Self {
        self.chunk(chunk_type, blocks, &[])
    }

    pub fn total_blocks(mut self, total_blocks: u32) -> Self {
        self.total_blocks_override = Some(total_blocks);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut image = Vec::with_capacity(SPARSE_HEADER_SIZE + self.chunks.len());
        image.extend_from_slice(&SPARSE_HEADER_MAGIC.to_le_bytes());
        image.extend_from_slice(&1u16.to_le_bytes()); // major
        image.extend_from_slice(&0u16.to_le_bytes()); // minor
        image.extend_from_slice(&(SPARSE_HEADER_SIZE as u16).to_le_bytes());
        image.extend_from_slice(&(CHUNK_HEADER_SIZE as u16).to_le_bytes());
        image.extend_from_slice(&self.block_size.to_le_bytes());
        image.extend_from_slice(&self.total_blocks_override.unwrap_or(self.blocks).to_le_bytes());
        image.extend_from_slice(&self.chunk_count.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes()); // checksum
        image.extend(self.chunks);
        image
    }
}

/// Encode a raw image as RAW chunks of at most `blocks_per_chunk` blocks
#[allow(dead_code)]
pub fn encode_raw_only(image: &[u8], block_size: u32, blocks_per_chunk: usize) -> Vec<u8> {
    let chunk_bytes = block_size as usize * blocks_per_chunk;
    image
        .chunks(chunk_bytes)
        .fold(SparseImageBuilder::new(block_size), |builder, piece| {
            builder.raw(piece)
        })
        .build()
}

/// Compress data using xz compression
#[allow(dead_code)]
pub fn compress_xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder
        .write_all(data)
        .expect("Failed to write to xz encoder");
    encoder.finish().expect("Failed to finish xz compression")
}

/// Compress data using gzip compression
#[allow(dead_code)]
pub fn compress_gz(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("Failed to write to gz encoder");
    encoder.finish().expect("Failed to finish gz compression")
}
