//! Modules layer - Infrastructure components for external integrations
//!
//! Contains clients and adapters for external services like storage and
//! media processing.

pub mod imaging;
pub mod storage;
