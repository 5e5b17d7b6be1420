//! # Formats Module
//!
//! Binary formats for moving Agora data in and out of a store.
//!
//! File I/O operations are in the app layer; this module only turns
//! collections into bytes and back.

pub mod snapshot;

pub use snapshot::{MAX_SNAPSHOT_SIZE, Snapshot, SnapshotHeader};
