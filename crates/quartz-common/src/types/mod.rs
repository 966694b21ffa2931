//! Core types shared across QuartzDB.

mod ids;

pub use ids::PageId;
