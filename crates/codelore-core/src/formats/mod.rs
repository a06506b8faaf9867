//! # Wire & Snapshot Formats
//!
//! Pure byte-level transformations. File and database I/O live in the
//! `storage` module and in the app layer.

pub mod persistence;

pub use persistence::{SnapshotHeader, knowledge_from_bytes, knowledge_to_bytes, snapshot_checksum};
