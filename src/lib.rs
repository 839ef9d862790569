// Library module for sparse-flash
// This exposes the public API for integration tests and potential library usage

pub mod flash;

// Re-export the main public API
pub use flash::{decode, flash_sparse_image, DecodeSummary, FlashOptions, SparseError};
