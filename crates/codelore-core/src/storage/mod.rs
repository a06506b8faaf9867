//! # Durable Storage Backends
//!
//! Byte-level persistence behind the store. The engine itself never does
//! I/O; these backends read and write opaque snapshot blobs produced by
//! `formats::persistence`.

pub mod snapshot_db;

pub use snapshot_db::SnapshotDb;
