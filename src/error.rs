//! Error types for GEMM dispatch and execution.

use thiserror::Error;

use crate::isa::CapabilityLevel;

/// Errors raised by detection, dispatch, packing and execution.
///
/// Every variant is detected eagerly, before any kernel writes into C.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GemmError {
    /// The hardware-feature query or its configuration could not be
    /// initialized. Cached; retrying cannot change the outcome.
    #[error("ISA detection failed: {0}")]
    Environment(String),

    /// A capability level reached the registry without a compiled kernel
    /// family for it.
    #[error("no kernel family compiled for capability level {0}")]
    UnsupportedLevel(CapabilityLevel),

    /// A negative dimension was passed through the signed entry points.
    #[error("invalid dimension {name}={value}: must be non-negative")]
    InvalidDimension { name: &'static str, value: i64 },

    /// Shapes, leading dimensions or buffer lengths disagree.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Kernel table lookup hit the sentinel, an absent entry or ran past
    /// the end of the table.
    #[error("no {level} kernel for {rows} rows (table max {max})")]
    KernelIndex {
        level: CapabilityLevel,
        rows: usize,
        max: usize,
    },

    /// A tile descriptor would touch memory outside the buffers it was
    /// validated against.
    #[error("tile at row {row} ({rows} rows) out of bounds: {reason}")]
    TileOutOfBounds {
        row: usize,
        rows: usize,
        reason: String,
    },

    /// A worker thread panicked before finishing its row tiles.
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),
}

/// Result type for GEMM operations.
pub type Result<T> = std::result::Result<T, GemmError>;

/// Convert a signed dimension from the binding layer into `usize`.
pub(crate) fn dim(name: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| GemmError::InvalidDimension { name, value })
}
