//! Database file management and page I/O.
//!
//! The disk layer owns the database file: a 28-byte header followed by
//! fixed-size pages indexed from zero. It hands out page identifiers,
//! materializes typed pages on read, and writes pages back verbatim.
//!
//! ```text
//! +------------------+ 0x0000
//! | DatabaseHeader   |  28 bytes: magic, version, page_size,
//! |                  |  page_count, first_free_page, last_lsn
//! +------------------+ 0x001C
//! | Page 0           |  4096 bytes
//! +------------------+
//! | Page 1           |
//! +------------------+
//! |       ...        |
//! ```

mod error;
mod manager;

pub use error::{DiskError, DiskResult};
pub use manager::{DatabaseHeader, DiskManager};

/// Database file header size in bytes.
pub const DB_HEADER_SIZE: usize = quartz_common::constants::DB_HEADER_SIZE;
