//! Durable storage primitives for the key-value store: the write-ahead log
//! and the snapshot store. These are the only two components that touch
//! disk directly; everything above them (the engine) talks to `Record`s and
//! `Value` maps.

pub mod error;
pub mod snapshot;
pub mod wal;

pub use error::{StorageError, StorageResult};
pub use snapshot::SnapshotStore;
pub use wal::{ReplayReport, Wal};
