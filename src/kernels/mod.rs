//! Micro-kernels and the per-level kernel tables that index them.
//!
//! A micro-kernel computes `rows × (b_block_cols · block_width)` outputs for
//! one K-block:
//!
//! ```text
//! for jb in 0..b_block_cols:
//!     acc[0:rows, 0:block_width] = Σ_p  A_packed[p, 0:rows]ᵀ ⊗ B_panel[jb][p, :]
//!     C[0:rows, jb·bw ..] = acc                  (beta == 0, C is not read)
//!     C[0:rows, jb·bw ..] = beta · C + acc       (otherwise)
//! ```
//!
//! Every family keeps `KERNEL_NCOL_BLOCKS` vector registers per accumulator
//! row, so a column block is twice the SIMD width.
//!
//! Available families:
//! - `reference`: portable nested loops, any block width
//! - `avx2`: 8-lane ymm kernels, 1-6 rows; also the 7-14 row ymm kernels
//!   for the AVX-512 register file
//! - `avx512`: 16-lane zmm kernels, 1-14 rows
//! - `neon`: 4-lane aarch64 kernels, 1-6 rows

#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod avx512;
#[cfg(target_arch = "aarch64")]
pub mod neon;
pub mod reference;
pub mod registry;

pub use registry::lookup;

use crate::blocked::partition::{Partitioner, TileStep};
use crate::error::{GemmError, Result};
use crate::isa::CapabilityLevel;

/// Vector registers per accumulator row.
pub const KERNEL_NCOL_BLOCKS: usize = 2;

/// Arguments of one micro-kernel call.
///
/// Built by the driver right before the call, after the tile it describes
/// has been bounds-checked against the caller's buffers.
#[derive(Debug, Clone, Copy)]
pub struct GemmParams {
    /// Depth of this K-block.
    pub k: usize,
    /// Packed A: `k × rows`, element `(i, p)` at `a[p * rows + i]`.
    pub a: *const f32,
    /// First column block of the K-block; block `jb` starts at
    /// `b + jb * k * block_width` and is `k × block_width` row-major.
    pub b: *const f32,
    pub beta: f32,
    pub c: *mut f32,
    /// Row stride of C, in elements.
    pub ldc: usize,
    /// Number of column blocks to process.
    pub b_block_cols: usize,
    pub block_width: usize,
}

/// Micro-kernel entry point.
///
/// # Safety
///
/// The caller must ensure the CPU supports the kernel's instruction set and
/// that every pointer in [`GemmParams`] covers the region the kernel touches.
pub type KernelFn = unsafe fn(&GemmParams);

/// Kernels of one family indexed by the number of rows they handle.
///
/// Index 0 is the sentinel and never holds a kernel. Entries may be absent.
#[derive(Debug, Clone, Copy)]
pub struct KernelTable {
    level: CapabilityLevel,
    entries: &'static [Option<KernelFn>],
}

impl KernelTable {
    pub const fn new(level: CapabilityLevel, entries: &'static [Option<KernelFn>]) -> Self {
        assert!(!entries.is_empty() && entries[0].is_none(), "entry 0 is reserved");
        Self { level, entries }
    }

    pub fn level(&self) -> CapabilityLevel {
        self.level
    }

    /// Largest row count any entry of this table may handle.
    pub fn max_rows(&self) -> usize {
        self.entries.len() - 1
    }

    /// Kernel handling exactly `rows` rows.
    pub fn get(&self, rows: usize) -> Result<KernelFn> {
        match self.entries.get(rows) {
            Some(Some(kernel)) if rows > 0 => Ok(*kernel),
            _ => Err(GemmError::KernelIndex {
                level: self.level,
                rows,
                max: self.max_rows(),
            }),
        }
    }

    /// Row counts with a kernel, ascending.
    pub fn available(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(rows, entry)| entry.map(|_| rows))
    }
}

/// A family of micro-kernels compiled for one capability level, paired with
/// the partition policy tuned for it.
pub trait KernelFamily: Send + Sync {
    fn level(&self) -> CapabilityLevel;

    fn table(&self) -> &KernelTable;

    fn partitioner(&self) -> Partitioner;

    fn simd_width(&self) -> usize {
        self.level().simd_width()
    }

    fn block_width(&self) -> usize {
        self.simd_width() * KERNEL_NCOL_BLOCKS
    }

    /// Whether panels packed with `width`-column blocks can feed this family.
    fn accepts_block_width(&self, width: usize) -> bool {
        width == self.block_width()
    }

    fn kernel(&self, rows: usize) -> Result<KernelFn> {
        self.table().get(rows)
    }

    fn partition(&self, m: usize) -> Result<Vec<TileStep>> {
        self.partitioner().partition(self.table(), m)
    }
}
