//! File acquisition with progress reporting.
//!
//! Reading is the only incremental stage of an ingestion: the file is
//! memory-mapped and faulted in chunk by chunk, emitting a progress event per
//! chunk. Parsers read the mapping directly once every chunk is resident.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use memmap2::Mmap;

use crate::{Error, Result};

/// Default progress granularity (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Stride for touching a mapping; one read per page faults it in.
const PAGE_STRIDE: usize = 4096;

/// Event emitted while a file is being acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireEvent {
    /// Percentage of bytes made resident so far, 0 to 100.
    Progress { percent: u8 },
}

/// Complete file contents, either mapped from disk or owned.
#[derive(Debug)]
pub enum AcquiredBuffer {
    /// Read-only mapping of a non-empty file.
    Mapped(Mmap),
    /// Bytes already in memory.
    Owned(Vec<u8>),
}

impl Deref for AcquiredBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for AcquiredBuffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl From<Vec<u8>> for AcquiredBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Owned(bytes)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as u128 * 100) / total as u128) as u8
}

/// Maps `path` and faults it in, reporting progress on `progress`.
///
/// Progress is non-decreasing and `100` is sent exactly once, after the last
/// chunk. A closed receiver is not an error. `cancel` is polled between
/// chunks. The file contents are never copied.
///
/// # Errors
/// Returns an I/O error if the file cannot be opened or mapped, or
/// [`Error::Cancelled`] if `cancel` is set before the last chunk.
pub fn read_with_progress<P: AsRef<Path>>(
    path: P,
    chunk_size: usize,
    progress: &Sender<AcquireEvent>,
    cancel: &AtomicBool,
) -> Result<AcquiredBuffer> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let total = usize::try_from(file.metadata()?.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::OutOfMemory, "file too large"))?;
    let _ = progress.send(AcquireEvent::Progress { percent: 0 });

    if total == 0 {
        // Zero-length files cannot be mapped on every platform.
        if cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        let _ = progress.send(AcquireEvent::Progress { percent: 100 });
        return Ok(AcquiredBuffer::Owned(Vec::new()));
    }

    // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file)? };

    let mut done = 0usize;
    let mut last_percent = 0u8;
    let mut touched = 0u8;
    for chunk in mmap.chunks(chunk_size.max(1)) {
        if cancel.load(Ordering::SeqCst) {
            log::debug!("acquire: cancelled after {done} of {total} bytes");
            return Err(Error::Cancelled);
        }
        for &byte in chunk.iter().step_by(PAGE_STRIDE) {
            touched ^= byte;
        }
        done += chunk.len();
        let percent = percent_of(done, total);
        if percent > last_percent && percent < 100 {
            last_percent = percent;
            let _ = progress.send(AcquireEvent::Progress { percent });
        }
    }
    std::hint::black_box(touched);

    let _ = progress.send(AcquireEvent::Progress { percent: 100 });
    log::debug!("acquire: mapped {total} bytes from {}", path.display());
    Ok(AcquiredBuffer::Mapped(mmap))
}
