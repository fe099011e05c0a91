//! Storage module for report photos
//!
//! Provides the `PhotoStorage` seam and its S3-compatible implementation.

mod photo_storage;

pub use photo_storage::{PhotoStorage, S3PhotoStorage};
