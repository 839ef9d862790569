use tracing::{debug, info};

use crate::flash::block_writer::{BlockWriter, Destination};
use crate::flash::decode::DecodeState;
use crate::flash::error::SparseError;
use crate::flash::simg::{ChunkType, SparseHeader};

/// Close out a decode after the last chunk
///
/// If the image ends in a DONT_CARE run nothing was written for its final
/// blocks, so a growable destination would come out short. A single zero
/// byte at the last logical offset forces it to full length. Fixed-size
/// destinations are left alone. A trailing run that reaches past
/// `capacity` fails with [`SparseError::SizeExceeded`] and writes nothing.
///
/// Returns whether the padding byte was written. Block accounting is
/// checked last, so a mismatch is reported with the destination already
/// written and synced.
pub fn finalize<D: Destination>(
    writer: &mut BlockWriter<D>,
    header: &SparseHeader,
    state: &DecodeState,
    capacity: u64,
) -> Result<bool, SparseError> {
    let mut padded = false;

    if state.last_chunk == Some(ChunkType::DontCare) {
        let logical_len = state.offset(header);
        if logical_len > capacity {
            return Err(SparseError::SizeExceeded {
                required: logical_len,
                capacity,
            });
        }
        if !writer.is_growable() {
            debug!(logical_len, "fixed-size destination, skipping trailing pad");
        } else if logical_len > 0 {
            writer.write_blocks(logical_len - 1, &[0])?;
            padded = true;
        }
    }

    writer.sync()?;

    info!(
        "Wrote {} blocks, expected to write {} blocks",
        state.total_blocks, header.total_blocks
    );

    if state.total_blocks != header.total_blocks {
        return Err(SparseError::BlockCountMismatch {
            expected: header.total_blocks,
            actual: state.total_blocks,
        });
    }

    Ok(padded)
}
