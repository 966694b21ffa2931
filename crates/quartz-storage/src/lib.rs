//! # quartz-storage
//!
//! The storage core of QuartzDB: a fixed-size paged database file,
//! typed page formats, and an in-memory buffer pool.
//!
//! - [`page`] — the on-disk page formats: a slotted record page and a
//!   B+tree index node, both materialized over an aligned 4 KB buffer
//! - [`disk`] — the database file lifecycle: header validation, page
//!   allocation, and durable page I/O
//! - [`buffer`] — a bounded frame cache with pin/unpin semantics,
//!   dirty tracking, and a pluggable replacement policy

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Page layout and disk format
pub mod page;

/// Database file management and page I/O
pub mod disk;

/// Buffer pool and page replacement
pub mod buffer;
