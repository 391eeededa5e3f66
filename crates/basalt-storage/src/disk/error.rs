//! Error types for the disk layer.

use std::io;
use std::path::PathBuf;

use basalt_common::types::PageId;
use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during disk I/O.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Failed to open the backing file.
    #[error("failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// A write covered fewer bytes than a full page.
    #[error("short write for page {page_id}: wrote {written} of {expected} bytes")]
    ShortWrite {
        page_id: PageId,
        written: usize,
        expected: usize,
    },

    /// The scheduler worker is gone and can no longer accept requests.
    #[error("disk scheduler is shut down")]
    SchedulerShutDown,

    /// A buffer of the wrong size was handed to the disk manager.
    #[error("buffer length {actual} does not match page size {expected}")]
    BadBufferLength { actual: usize, expected: usize },
}

impl DiskError {
    /// Creates an open error.
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}
