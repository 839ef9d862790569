// Module declarations
mod block_writer;
mod compression;
mod decode;
mod error;
mod finalize;
mod from_file;
mod inspect;
mod options;
mod progress;
pub mod simg;

// Public re-exports
pub use block_writer::{
    get_device_size, is_block_device, open_destination, BlockWriter, Destination,
};
pub use compression::{decompressing_reader, detect_compression, Compression};
pub use decode::{decode, DecodeState, RAW_COPY_BUFFER_SIZE};
pub use error::{ErrorKind, SparseError};
pub use finalize::finalize;
pub use from_file::{flash_sparse_image, inspect_sparse_image, resolve_capacity};
pub use inspect::{inspect, ChunkInfo, ImageLayout};
pub use options::{parse_size, FlashOptions, DEFAULT_FILE_CAPACITY};
pub use progress::{format_time, ChunkCounts, DecodeSummary};
