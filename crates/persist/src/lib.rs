//! Chunk persistence: columnar snapshots and a file-backed chunk store.
//!
//! # Invariants
//! - A snapshot is a complete, round-trippable image of one chunk; restore
//!   of a capture is value-equal to the original.
//! - Uniform chunks are represented by a skip marker and never written to
//!   disk.
//! - Malformed persisted data fails the load of that chunk loudly; nothing
//!   is silently defaulted.

pub mod snapshot;
pub mod store;

pub use snapshot::{ChunkSnapshot, SnapshotError};
pub use store::{ChunkCoord, ChunkStore, StoreError};
