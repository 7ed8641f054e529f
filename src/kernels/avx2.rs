//! ymm micro-kernels: 8 f32 lanes, two registers per accumulator row.
//!
//! The same kernel body is compiled twice. With AVX2 + FMA there are 16 ymm
//! registers, which caps the tile at 6 rows (12 accumulators plus two B
//! loads and a broadcast). With the AVX-512 register file the ymm body can
//! keep up to 14 rows (28 accumulators) live, which is what the
//! `Avx512Ymm` level uses for its 7-14 row kernels.

use std::arch::x86_64::*;

use super::{GemmParams, KernelFamily, KernelFn, KernelTable};
use crate::blocked::partition::Partitioner;
use crate::isa::CapabilityLevel;

const LANES: usize = 8;
const BLOCK: usize = 2 * LANES;

/// Rows per call with 16 ymm registers.
pub const MAX_ROWS_AVX2: usize = 6;
/// Rows per call with 32 ymm registers.
pub const MAX_ROWS_WIDE: usize = 14;

/// Computes `ROWS × (b_block_cols · 16)` outputs for one K-block.
///
/// Accumulators start at zero; C is only read when `beta != 0`.
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn ymm_body<const ROWS: usize>(gp: &GemmParams) {
    let k = gp.k;
    let beta = _mm256_set1_ps(gp.beta);

    for jb in 0..gp.b_block_cols {
        let b = gp.b.add(jb * k * BLOCK);
        let c = gp.c.add(jb * BLOCK);

        let mut acc = [[_mm256_setzero_ps(); 2]; ROWS];

        for p in 0..k {
            let b0 = _mm256_loadu_ps(b.add(p * BLOCK));
            let b1 = _mm256_loadu_ps(b.add(p * BLOCK + LANES));
            let a = gp.a.add(p * ROWS);

            for (i, row) in acc.iter_mut().enumerate() {
                let ai = _mm256_broadcast_ss(&*a.add(i));
                row[0] = _mm256_fmadd_ps(ai, b0, row[0]);
                row[1] = _mm256_fmadd_ps(ai, b1, row[1]);
            }
        }

        for (i, row) in acc.iter().enumerate() {
            let c_row = c.add(i * gp.ldc);
            if gp.beta == 0.0 {
                _mm256_storeu_ps(c_row, row[0]);
                _mm256_storeu_ps(c_row.add(LANES), row[1]);
            } else {
                let c0 = _mm256_fmadd_ps(beta, _mm256_loadu_ps(c_row), row[0]);
                let c1 = _mm256_fmadd_ps(beta, _mm256_loadu_ps(c_row.add(LANES)), row[1]);
                _mm256_storeu_ps(c_row, c0);
                _mm256_storeu_ps(c_row.add(LANES), c1);
            }
        }
    }
}

/// AVX2 ymm kernel for `ROWS` rows.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX2 and FMA (checked via `#[target_feature]`)
/// - `gp.a` points to `gp.k * ROWS` packed values
/// - `gp.b` points to `gp.b_block_cols * gp.k * 16` packed values
/// - `gp.c.add(i * gp.ldc)` is valid for read/write of `gp.b_block_cols * 16`
///   values for `i` in `0..ROWS`
#[target_feature(enable = "avx2,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn kernel_avx2<const ROWS: usize>(gp: &GemmParams) {
    ymm_body::<ROWS>(gp)
}

/// ymm kernel compiled for the 32-register AVX-512 file.
///
/// # Safety
///
/// Same contract as [`kernel_avx2`], but the CPU must support AVX-512F,
/// AVX-512VL and FMA.
#[target_feature(enable = "avx512f,avx512vl,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn kernel_avx512_ymm<const ROWS: usize>(gp: &GemmParams) {
    ymm_body::<ROWS>(gp)
}

static AVX2_KERNELS: [Option<KernelFn>; MAX_ROWS_AVX2 + 1] = [
    None,
    Some(kernel_avx2::<1> as KernelFn),
    Some(kernel_avx2::<2> as KernelFn),
    Some(kernel_avx2::<3> as KernelFn),
    Some(kernel_avx2::<4> as KernelFn),
    Some(kernel_avx2::<5> as KernelFn),
    Some(kernel_avx2::<6> as KernelFn),
];

// Up to 6 rows the AVX2 kernels already fit; the wider tiles need the
// larger register file.
static WIDE_KERNELS: [Option<KernelFn>; MAX_ROWS_WIDE + 1] = [
    None,
    Some(kernel_avx2::<1> as KernelFn),
    Some(kernel_avx2::<2> as KernelFn),
    Some(kernel_avx2::<3> as KernelFn),
    Some(kernel_avx2::<4> as KernelFn),
    Some(kernel_avx2::<5> as KernelFn),
    Some(kernel_avx2::<6> as KernelFn),
    Some(kernel_avx512_ymm::<7> as KernelFn),
    Some(kernel_avx512_ymm::<8> as KernelFn),
    Some(kernel_avx512_ymm::<9> as KernelFn),
    Some(kernel_avx512_ymm::<10> as KernelFn),
    Some(kernel_avx512_ymm::<11> as KernelFn),
    Some(kernel_avx512_ymm::<12> as KernelFn),
    Some(kernel_avx512_ymm::<13> as KernelFn),
    Some(kernel_avx512_ymm::<14> as KernelFn),
];

static AVX2_TABLE: KernelTable = KernelTable::new(CapabilityLevel::Avx2, &AVX2_KERNELS);
static WIDE_TABLE: KernelTable = KernelTable::new(CapabilityLevel::Avx512Ymm, &WIDE_KERNELS);

pub struct Avx2Family;

impl KernelFamily for Avx2Family {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::Avx2
    }

    fn table(&self) -> &KernelTable {
        &AVX2_TABLE
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(MAX_ROWS_AVX2)
    }
}

/// AVX-512 register file with 256-bit lanes. Shares the AVX2 kernel bodies
/// and panel layout; only the tile heights differ.
pub struct Avx512YmmFamily;

impl KernelFamily for Avx512YmmFamily {
    fn level(&self) -> CapabilityLevel {
        CapabilityLevel::Avx512Ymm
    }

    fn table(&self) -> &KernelTable {
        &WIDE_TABLE
    }

    fn partitioner(&self) -> Partitioner {
        Partitioner::new(MAX_ROWS_WIDE)
    }
}
