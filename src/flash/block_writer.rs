use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::flash::error::SparseError;

// Linux ioctl definitions using nix crate's ioctl macros for safety
#[cfg(target_os = "linux")]
mod linux_ioctl {
    use nix::ioctl_read;
    // BLKGETSIZE64 - get device size in bytes (u64)
    ioctl_read!(blkgetsize64, 0x12, 114, u64);
}

#[cfg(target_os = "macos")]
const DKIOCGETBLOCKCOUNT: libc::c_ulong = 0x40086419;

#[cfg(target_os = "macos")]
const DKIOCGETBLOCKSIZE: libc::c_ulong = 0x40046418;

/// Random-access byte sink a sparse image is flashed onto
pub trait Destination: Write + Seek {
    /// Whether writing past the current end extends the destination
    ///
    /// Fixed-capacity destinations such as block devices return false.
    fn is_growable(&self) -> bool {
        true
    }

    /// Make everything written so far durable
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Destination for File {
    fn is_growable(&self) -> bool {
        use std::os::unix::fs::FileTypeExt;
        self.metadata()
            .map(|m| !m.file_type().is_block_device())
            .unwrap_or(true)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Destination for Cursor<Vec<u8>> {}

impl Destination for Cursor<&mut [u8]> {
    fn is_growable(&self) -> bool {
        false
    }
}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn is_growable(&self) -> bool {
        (**self).is_growable()
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// BlockWriter is the only path through which a decode touches its destination
pub struct BlockWriter<D> {
    dest: D,
    bytes_written: u64,
}

impl<D: Destination> BlockWriter<D> {
    pub fn new(dest: D) -> Self {
        Self {
            dest,
            bytes_written: 0,
        }
    }

    /// Write all of `data` at absolute byte offset `offset`
    ///
    /// A failed seek or a short write is reported as
    /// [`SparseError::WriteFailure`].
    pub fn write_blocks(&mut self, offset: u64, data: &[u8]) -> Result<(), SparseError> {
        trace!(offset, len = data.len(), "block write");

        let fail = |source: io::Error| SparseError::WriteFailure {
            offset,
            len: data.len() as u64,
            source,
        };

        let pos = self.dest.seek(SeekFrom::Start(offset)).map_err(fail)?;
        if pos != offset {
            return Err(fail(io::Error::other(format!(
                "seek landed at {} instead of {}",
                pos, offset
            ))));
        }
        self.dest.write_all(data).map_err(fail)?;

        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn is_growable(&self) -> bool {
        self.dest.is_growable()
    }

    /// Flush and sync the destination
    pub fn sync(&mut self) -> Result<(), SparseError> {
        let offset = self.bytes_written;
        self.dest.sync().map_err(|source| SparseError::WriteFailure {
            offset,
            len: 0,
            source,
        })
    }

    /// Total bytes physically written
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> D {
        self.dest
    }
}

/// Open a flash destination for writing
///
/// Regular files are created and truncated; block devices are opened as-is.
pub fn open_destination(device: &str) -> io::Result<File> {
    let is_block_dev = is_block_device(device).unwrap_or(false);
    let mut opts = OpenOptions::new();
    opts.write(true).read(true);
    // Only use create/truncate for regular files, not block devices
    if !is_block_dev {
        opts.create(true).truncate(true);
    }
    let file = opts.open(device)?;
    debug!(device, is_block_dev, "opened destination");
    Ok(file)
}

/// Check if a path is a block device
pub fn is_block_device(path: &str) -> io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;
    let metadata = std::fs::metadata(path)?;
    Ok(metadata.file_type().is_block_device())
}

/// Get block device size in bytes
pub fn get_device_size(path: &str) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new().read(true).open(path)?;
    let fd = file.as_raw_fd();

    #[cfg(target_os = "linux")]
    {
        let mut size: u64 = 0;
        // Use nix crate's generated ioctl - this is architecture-safe
        unsafe {
            linux_ioctl::blkgetsize64(fd, &mut size)
                .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        }
        Ok(size)
    }

    #[cfg(target_os = "macos")]
    {
        unsafe {
            let mut count: u64 = 0;
            if libc::ioctl(fd, DKIOCGETBLOCKCOUNT, &mut count) != 0 {
                return Err(io::Error::last_os_error());
            }
            let mut block_size: u32 = 0;
            if libc::ioctl(fd, DKIOCGETBLOCKSIZE, &mut block_size) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(count * block_size as u64)
        }
    }
}
