//! aarch64 Advanced SIMD micro-kernels: 4 f32 lanes, two registers per row.

use std::arch::aarch64::*;

use super::{GemmParams, KernelFamily, KernelFn, KernelTable};
use crate::blocked::partition::Partitioner;
use crate::isa::CapabilityLevel;

const LANES: usize = 4;
const BLOCK: usize = 2 * LANES;

pub const MAX_ROWS: usize = 6;

/// NEON kernel: `ROWS × (b_block_cols · 8)` outputs for one K-block.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports NEON (checked via `#[target_feature]`)
/// - `gp.a` points to `gp.k * ROWS` packed values
/// - `gp.b` points to `gp.b_block_cols * gp.k * 8` packed values
/// - `gp.c.add(i * gp.ldc)` is valid for read/write of `gp.b_block_cols * 8`
///   values for `i` in `0..ROWS`
#[target_feature(enable = "neon")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn kernel_neon<const ROWS: usize>(gp: &GemmParams) {
    let k = gp.k;

    for jb in 0..gp.b_block_cols {
        let b = gp.b.add(jb * k * BLOCK);
        let c = gp.c.add(jb * BLOCK);

        let mut acc = [[vdupq_n_f32(0.0); 2]; ROWS];

        for p in 0..k {
            let b0 = vld1q_f32(b.add(p * BLOCK));
            let b1 = vld1q_f32(b.add(p * BLOCK + LANES));
            let a = gp.a.add(p * ROWS);

            for (i, row) in acc.iter_mut().enumerate() {
                let ai = vdupq_n_f32(*a.add(i));
                row[0] = vfmaq_f32(row[0], ai, b0);
                row[1] = vfmaq_f32(row[1], ai, b1);
            }
        }

        for (i, row) in acc.iter().enumerate() {
            let c_row = c.add(i * gp.ldc);
            if gp.beta == 0.0 {
                vst1q_f32(c_row, row[0]);
                vst1q_f32(c_row.add(LANES), row[1]);
            } else {
                let beta = vdupq_n_f32(gp.beta);
                vst1q_f32(c_row, vfmaq_f32(row[0], beta, vld1q_f32(c_row)));
                vst1q_f32(
                    c_row.add(LANES),
                    vfmaq_f32(row[1], beta, vld1q_f32(c_row.add(LANES))),
                );
            }
        }
    }
}

static KERNELS: [Option<KernelFn>; MAX_ROWS + 1] = [
    None,
    Some(kernel_neon::<1> as KernelFn),
    Some(kernel_neon::<2> as KernelFn),
    Some(kernel_neon::<3> as KernelFn),
    Some(kernel_neon::<4> as KernelFn),
    Some(kernel_neon::<5> as KernelFn),
    Some(kernel_neon::<6> as KernelFn),
];

static TABLE: KernelTable = KernelTable::new(CapabilityLevel::Neon, &KERNELS);

pub struct NeonFamily;

impl KernelFamily for NeonFamily {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::Neon
    }

    fn table(&self) -> &KernelTable {
        &TABLE
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(MAX_ROWS)
    }
}
