use std::path::PathBuf;

/// Fallback capacity for regular-file destinations: 2 GiB
pub const DEFAULT_FILE_CAPACITY: u64 = 2 * 1024 * 1024 * 1024;

/// Options for flashing a sparse image onto a device or image file
#[derive(Debug, Clone, Default)]
pub struct FlashOptions {
    /// Sparse image to read, optionally gzip or xz compressed
    pub input: PathBuf,
    /// Destination device path (e.g., /dev/mmcblk0p3) or image file
    pub device: String,
    /// Bytes the destination may receive; probed or defaulted when unset
    pub capacity: Option<u64>,
}

/// Parse a byte count with an optional binary `K`, `M` or `G` suffix
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 'K' | 'k')) => (&s[..i], 1024u64),
        Some((i, 'M' | 'm')) => (&s[..i], 1024 * 1024),
        Some((i, 'G' | 'g')) => (&s[..i], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("Invalid size '{}' (e.g., 4096, 512K, 64M, 2G)", s))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Size '{}' is too large", s))
}
