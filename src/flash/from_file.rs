use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::flash::block_writer::{get_device_size, is_block_device, open_destination};
use crate::flash::compression::{decompressing_reader, Compression};
use crate::flash::decode::decode;
use crate::flash::error::SparseError;
use crate::flash::inspect::{inspect, ImageLayout};
use crate::flash::options::{FlashOptions, DEFAULT_FILE_CAPACITY};
use crate::flash::progress::DecodeSummary;

/// Flash a sparse image file onto a block device or image file
///
/// The decode itself is synchronous and runs on a blocking task; the input
/// and destination are owned by that task and closed on every exit path.
pub async fn flash_sparse_image(options: FlashOptions) -> Result<DecodeSummary, SparseError> {
    tokio::task::spawn_blocking(move || flash_blocking(&options))
        .await
        .map_err(io::Error::other)?
}

/// List the chunks of a sparse image file
pub async fn inspect_sparse_image(input: PathBuf) -> Result<ImageLayout, SparseError> {
    tokio::task::spawn_blocking(move || {
        let (reader, _) = open_input(&input)?;
        inspect(reader)
    })
    .await
    .map_err(io::Error::other)?
}

fn flash_blocking(options: &FlashOptions) -> Result<DecodeSummary, SparseError> {
    let (input, compression) = open_input(&options.input)?;
    info!(
        input = %options.input.display(),
        %compression,
        "reading sparse image"
    );

    // Probe before opening: regular-file destinations are truncated on open
    let capacity = resolve_capacity(options)?;
    let dest = open_destination(&options.device).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to open device '{}': {}", options.device, e),
        )
    })?;
    info!(device = %options.device, capacity, "flashing");

    decode(input, dest, capacity)
}

fn open_input(path: &Path) -> io::Result<(Box<dyn io::Read + Send>, Compression)> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to open input '{}': {}", path.display(), e),
        )
    })?;
    decompressing_reader(file)
}

/// Destination capacity: explicit, else the block device's size, else the
/// regular-file default
pub fn resolve_capacity(options: &FlashOptions) -> io::Result<u64> {
    if let Some(capacity) = options.capacity {
        return Ok(capacity);
    }
    if is_block_device(&options.device).unwrap_or(false) {
        return get_device_size(&options.device);
    }
    Ok(DEFAULT_FILE_CAPACITY)
}
