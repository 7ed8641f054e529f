//! Portable reference kernels.
//!
//! Same tile contract as the SIMD families, written as plain loops. The
//! block width is read from [`GemmParams`], so panels packed for any level
//! can be consumed. Each output element follows the same operation order as
//! the vectorized kernels: a multiply for the first depth step (or a fused
//! multiply-add onto `beta · C`), then fused multiply-adds.

use super::{GemmParams, KernelFamily, KernelFn, KernelTable};
use crate::blocked::partition::Partitioner;
use crate::isa::CapabilityLevel;

/// Rows per call for the reference family, matching the AVX2 geometry.
pub const MAX_ROWS: usize = 6;

/// Computes a `ROWS × (b_block_cols · block_width)` tile.
///
/// # Safety
///
/// Caller must ensure:
/// - `gp.a` points to `gp.k * ROWS` packed values
/// - `gp.b` points to `gp.b_block_cols * gp.k * gp.block_width` packed values
/// - `gp.c.add(i * gp.ldc)` is valid for read/write of
///   `gp.b_block_cols * gp.block_width` values for `i` in `0..ROWS`
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn kernel_reference<const ROWS: usize>(gp: &GemmParams) {
    let bw = gp.block_width;
    for jb in 0..gp.b_block_cols {
        for p in 0..gp.k {
            for i in 0..ROWS {
                let a = *gp.a.add(p * ROWS + i);
                for j in 0..bw {
                    let c = gp.c.add(i * gp.ldc + jb * bw + j);
                    let b = *gp.b.add((jb * gp.k + p) * bw + j);
                    *c = if p > 0 {
                        a.mul_add(b, *c)
                    } else if gp.beta != 0.0 {
                        a.mul_add(b, gp.beta * *c)
                    } else {
                        a * b
                    };
                }
            }
        }
    }
}

static KERNELS: [Option<KernelFn>; MAX_ROWS + 1] = [
    None,
    Some(kernel_reference::<1> as KernelFn),
    Some(kernel_reference::<2> as KernelFn),
    Some(kernel_reference::<3> as KernelFn),
    Some(kernel_reference::<4> as KernelFn),
    Some(kernel_reference::<5> as KernelFn),
    Some(kernel_reference::<6> as KernelFn),
];

static TABLE: KernelTable = KernelTable::new(CapabilityLevel::Baseline, &KERNELS);

/// Reference family, selected explicitly for the baseline level.
pub struct ReferenceFamily;

impl KernelFamily for ReferenceFamily {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::Baseline
    }

    fn table(&self) -> &KernelTable {
        &TABLE
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(MAX_ROWS)
    }

    fn accepts_block_width(&self, width: usize) -> bool {
        width > 0
    }
}
