//! Compressed input detection
//!
//! Sparse images are often shipped gzip or xz compressed. The input is
//! sniffed by magic bytes and wrapped in the matching decoder so the chunk
//! loop always sees the plain sparse stream.

use std::io::{self, BufRead, BufReader, Read};

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

/// Magic byte signatures for compression formats
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = *b"\xfd7zXZ\x00";
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression type for input streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression - raw sparse image
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst), recognized but not decoded
    Zstd,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// Detect compression type from magic bytes
///
/// Returns `Compression::None` if no recognized compression signature is found.
pub fn detect_compression(data: &[u8]) -> Compression {
    if data.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else if data.starts_with(&XZ_MAGIC) {
        Compression::Xz
    } else if data.starts_with(&ZSTD_MAGIC) {
        Compression::Zstd
    } else {
        Compression::None
    }
}

/// Wrap `input` in the decoder its leading bytes call for
pub fn decompressing_reader<R: Read + Send + 'static>(
    input: R,
) -> io::Result<(Box<dyn Read + Send>, Compression)> {
    let mut reader = BufReader::new(input);
    let compression = detect_compression(reader.fill_buf()?);

    let reader: Box<dyn Read + Send> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(GzDecoder::new(reader)),
        Compression::Xz => Box::new(XzDecoder::new(reader)),
        Compression::Zstd => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "zstd-compressed sparse images are not supported",
            ))
        }
    };

    Ok((reader, compression))
}
