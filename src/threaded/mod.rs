//! Multi-threaded execution over row tiles.
//!
//! Row tiles are the unit of parallel work. Each thread owns a contiguous
//! span of tiles and therefore a contiguous, disjoint band of C rows, so
//! C needs no locking. Workers meet on a barrier once before starting and
//! once after finishing.
//!
//! Available items:
//! - `ThreadContext` / `partition_1d`: which tiles a thread owns
//! - `choose_thread_count`: size-adaptive thread policy
//! - `run_workers`: scoped worker pool used by the driver

mod workers;

pub use workers::{ThreadContext, choose_thread_count, partition_1d};
pub(crate) use workers::run_workers;
