//! Disk manager error types.

use std::io;
use std::path::PathBuf;

use quartz_common::types::PageId;
use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during database file operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Database file does not exist.
    #[error("database file not found: {path}")]
    NotFound { path: PathBuf },

    /// Page ID is out of range or the invalid sentinel.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// File header magic does not match.
    #[error("bad magic number: expected {expected:#x}, got {actual:#x}")]
    BadMagic { expected: u32, actual: u32 },

    /// File was written by an unsupported format version.
    #[error("unsupported database version: {version}")]
    UnsupportedVersion { version: u32 },

    /// File header reports a different page size.
    #[error("page size mismatch: expected {expected}, got {actual}")]
    PageSizeMismatch { expected: u32, actual: u32 },

    /// Read returned fewer bytes than a full page.
    #[error("short read for page {page_id}: expected {expected} bytes, got {actual}")]
    ShortRead {
        page_id: PageId,
        expected: usize,
        actual: usize,
    },

    /// The on-disk type byte names no materializable page type.
    #[error("unknown page type {type_byte:#04x} on page {page_id}")]
    UnknownPageType { page_id: PageId, type_byte: u8 },
}

impl DiskError {
    /// Creates an invalid page ID error.
    pub fn invalid_page_id(page_id: PageId) -> Self {
        Self::InvalidPageId { page_id }
    }

    /// Returns true if this error indicates a corrupt or foreign file.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::UnsupportedVersion { .. }
                | Self::PageSizeMismatch { .. }
                | Self::ShortRead { .. }
                | Self::UnknownPageType { .. }
        )
    }
}
