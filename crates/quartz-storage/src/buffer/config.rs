//! Buffer pool configuration.

use crate::page::PAGE_SIZE;

/// Default pool size in frames (4 MB of pages).
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames in the pool.
    pub pool_size: usize,
}

impl BufferPoolConfig {
    /// Creates a configuration with the given number of frames.
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Creates a configuration sized from a memory budget in bytes.
    pub fn from_memory_size(memory_bytes: usize) -> Self {
        Self::new((memory_bytes / PAGE_SIZE).max(1))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("pool size must be at least one frame".to_string());
        }
        Ok(())
    }

    /// Returns the total page memory held by the pool.
    pub fn memory_usage(&self) -> usize {
        self.pool_size * PAGE_SIZE
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
