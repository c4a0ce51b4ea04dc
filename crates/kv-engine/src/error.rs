//! Error types surfaced by the key-value engine.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The WAL append (or its fsync) failed; the in-memory map was not
    /// mutated.
    #[error("durability failure: {0}")]
    DurabilityFailure(#[from] kv_storage::StorageError),

    /// The `debug_fail` simulated failure fired. Indistinguishable from
    /// `DurabilityFailure` to a caller by design.
    #[error("simulated failure")]
    SimulatedFailure,
}

impl EngineError {
    /// Whether the write was rejected before touching disk (debug-injected)
    /// rather than failing during a real I/O operation.
    pub fn is_simulated(&self) -> bool {
        matches!(self, EngineError::SimulatedFailure)
    }
}
