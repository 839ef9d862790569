use std::time::Duration;

use crate::flash::simg::{ChunkType, SparseHeader};

/// Format seconds into a human-readable time string (e.g., "1h30m45s", "5m30s", or "45.00s")
pub fn format_time(secs: f64) -> String {
    let total_secs = secs as u64;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        // Show fractional seconds for times under 1 minute
        format!("{:.2}s", secs)
    }
}

/// Number of chunks handled per type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCounts {
    pub raw: u32,
    pub fill: u32,
    pub dont_care: u32,
    pub crc32: u32,
}

impl ChunkCounts {
    pub(crate) fn record(&mut self, chunk_type: ChunkType) {
        match chunk_type {
            ChunkType::Raw => self.raw += 1,
            ChunkType::Fill => self.fill += 1,
            ChunkType::DontCare => self.dont_care += 1,
            ChunkType::Crc32 => self.crc32 += 1,
            ChunkType::Unknown(_) => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.raw + self.fill + self.dont_care + self.crc32
    }
}

/// Outcome of a successful decode
#[derive(Debug, Clone)]
pub struct DecodeSummary {
    pub header: SparseHeader,
    /// Blocks accounted for across all chunks
    pub total_blocks: u32,
    /// Bytes physically written to the destination, padding included
    pub bytes_written: u64,
    pub chunks: ChunkCounts,
    /// Whether the destination was extended to its logical length
    pub padded: bool,
    pub elapsed: Duration,
}

impl DecodeSummary {
    /// Logical size of the expanded image
    pub fn image_size(&self) -> u64 {
        self.header.image_size()
    }

    pub fn elapsed_formatted(&self) -> String {
        format_time(self.elapsed.as_secs_f64())
    }

    /// Multi-line report in the style of the CLI result block
    pub fn report(&self) -> String {
        let mb_written = self.bytes_written as f64 / (1024.0 * 1024.0);
        let secs = self.elapsed.as_secs_f64();
        let rate = if secs > 0.0 { mb_written / secs } else { 0.0 };
        format!(
            "  Image size: {} bytes ({} blocks of {} bytes)\n\
             \x20 Chunks: {} RAW, {} FILL, {} DONT_CARE, {} CRC32\n\
             \x20 Written: {:.2} MB in {} ({:.2} MB/s)",
            self.image_size(),
            self.total_blocks,
            self.header.block_size,
            self.chunks.raw,
            self.chunks.fill,
            self.chunks.dont_care,
            self.chunks.crc32,
            mb_written,
            self.elapsed_formatted(),
            rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(5.5), "5.50s");
        assert_eq!(format_time(330.0), "5m30s");
        assert_eq!(format_time(5445.0), "1h30m45s");
    }

    #[test]
    fn test_chunk_counts() {
        let mut counts = ChunkCounts::default();
        counts.record(ChunkType::Raw);
        counts.record(ChunkType::Raw);
        counts.record(ChunkType::DontCare);
        counts.record(ChunkType::Unknown(0x9999));
        assert_eq!(counts.raw, 2);
        assert_eq!(counts.dont_care, 1);
        assert_eq!(counts.total(), 3);
    }
}
