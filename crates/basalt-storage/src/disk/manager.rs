//! Block-granular page I/O.
//!
//! The disk manager reads and writes whole pages by page id. All
//! operations are position-based: page `p` lives at byte offset
//! `p * PAGE_SIZE` in the backing file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use basalt_common::constants::PAGE_SIZE;
use basalt_common::types::PageId;

use super::error::{DiskError, DiskResult};

/// Trait for block-granular page storage.
///
/// Implementations are driven from the scheduler's worker thread, so they
/// take `&mut self` and must be `Send`.
pub trait DiskManager: Send {
    /// Reads the page into `buf`, which must be exactly `PAGE_SIZE` bytes.
    ///
    /// A page that was allocated but never written reads back as zeroes.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()>;

    /// Persists `data`, which must be exactly `PAGE_SIZE` bytes.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> DiskResult<()>;
}

fn check_buffer_len(len: usize) -> DiskResult<()> {
    if len != PAGE_SIZE {
        return Err(DiskError::BadBufferLength {
            actual: len,
            expected: PAGE_SIZE,
        });
    }
    Ok(())
}

/// File-backed disk manager.
///
/// Pages live at `page_id * PAGE_SIZE` in a single data file. Reads past
/// the current end of file zero-fill the buffer; the file grows lazily as
/// higher pages are written.
pub struct FileDiskManager {
    file: File,
    path: PathBuf,
}

impl FileDiskManager {
    /// Opens (or creates) the data file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| DiskError::open(&path, e))?;
        Ok(Self { file, path })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(page_id: PageId) -> u64 {
        page_id.as_u64() * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        check_buffer_len(buf.len())?;
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;

        let mut total = 0;
        while total < buf.len() {
            let n = self.file.read(&mut buf[total..])?;
            if n == 0 {
                // EOF: the tail of this page was never written.
                buf[total..].fill(0);
                break;
            }
            total += n;
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        check_buffer_len(data.len())?;
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WriteZero {
                DiskError::ShortWrite {
                    page_id,
                    written: 0,
                    expected: PAGE_SIZE,
                }
            } else {
                DiskError::from(e)
            }
        })?;
        self.file.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .finish()
    }
}

/// In-memory disk manager for tests.
///
/// Behaves like a file that never touches the filesystem: unwritten pages
/// read as zeroes, written pages read back exactly.
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Vec<u8>>,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pages that have ever been written.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        check_buffer_len(buf.len())?;
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        check_buffer_len(data.len())?;
        self.pages.insert(page_id, data.to_vec());
        Ok(())
    }
}
