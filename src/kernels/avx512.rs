//! zmm micro-kernels: 16 f32 lanes, two registers per accumulator row.
//!
//! 14 rows use 28 of the 32 zmm registers as accumulators, leaving room for
//! the two B loads and an A broadcast.

use std::arch::x86_64::*;

use super::{GemmParams, KernelFamily, KernelFn, KernelTable};
use crate::blocked::partition::Partitioner;
use crate::isa::CapabilityLevel;

const LANES: usize = 16;
const BLOCK: usize = 2 * LANES;

pub const MAX_ROWS: usize = 14;

/// AVX-512 kernel: `ROWS × (b_block_cols · 32)` outputs for one K-block.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX-512F and FMA (checked via `#[target_feature]`)
/// - `gp.a` points to `gp.k * ROWS` packed values
/// - `gp.b` points to `gp.b_block_cols * gp.k * 32` packed values
/// - `gp.c.add(i * gp.ldc)` is valid for read/write of `gp.b_block_cols * 32`
///   values for `i` in `0..ROWS`
#[target_feature(enable = "avx512f,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn kernel_avx512<const ROWS: usize>(gp: &GemmParams) {
    let k = gp.k;
    let beta = _mm512_set1_ps(gp.beta);

    for jb in 0..gp.b_block_cols {
        let b = gp.b.add(jb * k * BLOCK);
        let c = gp.c.add(jb * BLOCK);

        let mut acc = [[_mm512_setzero_ps(); 2]; ROWS];

        for p in 0..k {
            let b0 = _mm512_loadu_ps(b.add(p * BLOCK));
            let b1 = _mm512_loadu_ps(b.add(p * BLOCK + LANES));
            let a = gp.a.add(p * ROWS);

            for (i, row) in acc.iter_mut().enumerate() {
                let ai = _mm512_set1_ps(*a.add(i));
                row[0] = _mm512_fmadd_ps(ai, b0, row[0]);
                row[1] = _mm512_fmadd_ps(ai, b1, row[1]);
            }
        }

        for (i, row) in acc.iter().enumerate() {
            let c_row = c.add(i * gp.ldc);
            if gp.beta == 0.0 {
                _mm512_storeu_ps(c_row, row[0]);
                _mm512_storeu_ps(c_row.add(LANES), row[1]);
            } else {
                let c0 = _mm512_fmadd_ps(beta, _mm512_loadu_ps(c_row), row[0]);
                let c1 = _mm512_fmadd_ps(beta, _mm512_loadu_ps(c_row.add(LANES)), row[1]);
                _mm512_storeu_ps(c_row, c0);
                _mm512_storeu_ps(c_row.add(LANES), c1);
            }
        }
    }
}

static KERNELS: [Option<KernelFn>; MAX_ROWS + 1] = [
    None,
    Some(kernel_avx512::<1> as KernelFn),
    Some(kernel_avx512::<2> as KernelFn),
    Some(kernel_avx512::<3> as KernelFn),
    Some(kernel_avx512::<4> as KernelFn),
    Some(kernel_avx512::<5> as KernelFn),
    Some(kernel_avx512::<6> as KernelFn),
    Some(kernel_avx512::<7> as KernelFn),
    Some(kernel_avx512::<8> as KernelFn),
    Some(kernel_avx512::<9> as KernelFn),
    Some(kernel_avx512::<10> as KernelFn),
    Some(kernel_avx512::<11> as KernelFn),
    Some(kernel_avx512::<12> as KernelFn),
    Some(kernel_avx512::<13> as KernelFn),
    Some(kernel_avx512::<14> as KernelFn),
];

static TABLE: KernelTable = KernelTable::new(CapabilityLevel::Avx512, &KERNELS);

pub struct Avx512Family;

impl KernelFamily for Avx512Family {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::Avx512
    }

    fn table(&self) -> &KernelTable {
        &TABLE
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(MAX_ROWS)
    }
}
