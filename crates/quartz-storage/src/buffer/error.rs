//! Buffer pool error types.

use quartz_common::types::PageId;
use thiserror::Error;

use crate::disk::DiskError;
use crate::page::PageType;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// Every frame is pinned; no victim available.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// Page is not resident in the pool.
    #[error("page {page_id} not resident in buffer pool")]
    PageNotFound { page_id: PageId },

    /// Operation requires an unpinned page.
    #[error("page {page_id} is pinned")]
    PagePinned { page_id: PageId },

    /// Page type cannot be created in the pool.
    #[error("cannot create page of type {page_type}")]
    InvalidPageType { page_type: PageType },

    /// The disk manager returned the invalid-page sentinel.
    #[error("page allocation failed")]
    AllocationFailed,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Disk-level failure.
    #[error("disk error: {0}")]
    Disk(#[from] DiskError),
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if retrying after unpinning pages could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames | Self::PagePinned { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(BufferError::NoFreeFrames.is_retryable());
        assert!(BufferError::PagePinned {
            page_id: PageId::new(1)
        }
        .is_retryable());
        assert!(!BufferError::AllocationFailed.is_retryable());
    }

    #[test]
    fn test_disk_error_conversion() {
        let disk_err = DiskError::invalid_page_id(PageId::new(7));
        let err: BufferError = disk_err.into();
        assert!(matches!(err, BufferError::Disk(_)));
    }
}
