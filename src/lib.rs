//! Single-precision GEMM with runtime instruction-set dispatch.
//!
//! The CPU is queried once per process. Every call then runs hand-written
//! micro-kernels for the best level the host supports (AVX-512, AVX2, NEON),
//! or portable reference kernels when no vector extension is usable.
//!
//! B is packed once into kernel-friendly panels and can be reused across
//! many multiplications:
//!
//! ```
//! use matmul_dispatch::{Transpose, gemm_parallel, pack_b};
//!
//! let (m, n, k) = (3, 4, 2);
//! let a = vec![1.0f32; m * k];
//! let b = vec![1.0f32; k * n];
//! let mut c = vec![10.0f32; m * n];
//!
//! let packed = pack_b(&b, k as i64, n as i64, n).unwrap();
//! gemm_parallel(Transpose::NoTrans, m as i64, &a, &packed, 1.0, &mut c, 2).unwrap();
//!
//! assert!(c.iter().all(|&v| v == 12.0));
//! ```
//!
//! For one-off products on row-major slices:
//!
//! ```
//! use matmul_dispatch::multiply;
//!
//! let a = vec![1.0f32; 64 * 32];
//! let b = vec![1.0f32; 32 * 48];
//! let mut c = vec![0.0f32; 64 * 48];
//!
//! multiply(&a, &b, &mut c, 64, 48, 32).unwrap();
//! assert!(c.iter().all(|&v| v == 32.0));
//! ```
//!
//! ## Configuration
//!
//! `MATMUL_DISPATCH_ISA` restricts dispatch to a level the host supports and
//! `MATMUL_DISPATCH_BLOCK_ROWS` sets the K-block height of packed panels.
//! Both are read once. See [`config`].
//!
//! ## Logging
//!
//! Detection and kernel selection are reported through the `log` facade.
//! No logger is installed by this crate.

pub mod blocked;
pub mod config;
pub mod error;
pub mod isa;
pub mod kernels;
pub mod matrix;
pub mod threaded;

pub use blocked::driver::{Driver, RunStats};
pub use blocked::pack::{PackOptions, PackedMatrix};
pub use error::{GemmError, Result};
pub use isa::CapabilityLevel;
pub use matrix::Transpose;
pub use threaded::{ThreadContext, choose_thread_count};

use error::dim;

/// Capability level GEMM calls dispatch to on this host.
pub fn capability() -> Result<CapabilityLevel> {
    isa::detect()
}

/// Pack row-major K×N `b` (row stride `ldb`) for the detected level.
///
/// # Errors
///
/// Negative `k` or `n`, a short buffer or `ldb < n`.
pub fn pack_b(b: &[f32], k: i64, n: i64, ldb: usize) -> Result<PackedMatrix> {
    let k = dim("k", k)?;
    let n = dim("n", n)?;
    PackedMatrix::pack(isa::detect()?, b, k, n, ldb)
}

/// `C = op(A) · B + beta · C` for the row tiles owned by `thread_id`.
///
/// `op(A)` is `m × K`: row-major `m × K` for `NoTrans`, read from a
/// row-major `K × m` buffer for `Trans`. C is row-major `m × N`. Any alpha
/// was folded into `packed_b` when it was packed.
///
/// `a` must hold exactly `m × K` values and `c` exactly `m × N`.
///
/// Each of the `num_threads` ids computes a disjoint set of rows, and
/// calling every id once over the same C computes the whole product. Since
/// C is borrowed mutably those calls run one after another; to compute on
/// several threads at once use [`gemm_parallel`].
#[allow(clippy::too_many_arguments)]
pub fn gemm(
    trans_a: Transpose,
    m: i64,
    a: &[f32],
    packed_b: &PackedMatrix,
    beta: f32,
    c: &mut [f32],
    thread_id: usize,
    num_threads: usize,
) -> Result<()> {
    let m = dim("m", m)?;
    let ctx = ThreadContext::new(thread_id, num_threads)?;
    check_operands(m, a, packed_b, c)?;
    let (lda, ldc) = leading_dims(trans_a, m, packed_b);
    Driver::new(packed_b.level())?.run_thread(trans_a, m, a, lda, packed_b, c, ldc, 1.0, beta, ctx)?;
    Ok(())
}

/// Like [`gemm`], but runs all `num_threads` workers itself.
///
/// `a` must hold exactly `m × K` values and `c` exactly `m × N`.
pub fn gemm_parallel(
    trans_a: Transpose,
    m: i64,
    a: &[f32],
    packed_b: &PackedMatrix,
    beta: f32,
    c: &mut [f32],
    num_threads: usize,
) -> Result<()> {
    let m = dim("m", m)?;
    check_operands(m, a, packed_b, c)?;
    let (lda, ldc) = leading_dims(trans_a, m, packed_b);
    Driver::new(packed_b.level())?.run(trans_a, m, a, lda, packed_b, c, ldc, 1.0, beta, num_threads)?;
    Ok(())
}

/// Matrix multiply: C += A * B
///
/// Packs B for the detected level and runs single-threaded.
/// Matrices are row-major: A is m×k, B is k×n, C is m×n.
pub fn multiply(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) -> Result<()> {
    multiply_parallel(a, b, c, m, n, k, 1)
}

/// Same as [`multiply`] but uses up to `num_threads` threads.
///
/// Thread count adapts to matrix size - small matrices use fewer threads
/// because the overhead isn't worth it.
pub fn multiply_parallel(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    m: usize,
    n: usize,
    k: usize,
    num_threads: usize,
) -> Result<()> {
    check_len("A", a, m, k)?;
    check_len("B", b, k, n)?;
    check_len("C", c, m, n)?;

    let level = isa::detect()?;
    let packed = PackedMatrix::pack(level, b, k, n, n)?;
    let threads = choose_thread_count(m, n, k, num_threads);
    Driver::new(level)?.run(Transpose::NoTrans, m, a, k, &packed, c, n, 1.0, 1.0, threads)?;
    Ok(())
}

fn leading_dims(trans_a: Transpose, m: usize, packed_b: &PackedMatrix) -> (usize, usize) {
    let lda = match trans_a {
        Transpose::NoTrans => packed_b.num_rows(),
        Transpose::Trans => m,
    };
    (lda, packed_b.num_cols())
}

/// Dense A and C carry no stride, so their lengths pin down K and N.
fn check_operands(m: usize, a: &[f32], packed_b: &PackedMatrix, c: &[f32]) -> Result<()> {
    check_len("A", a, m, packed_b.num_rows())?;
    check_len("C", c, m, packed_b.num_cols())
}

fn check_len(name: &str, buf: &[f32], rows: usize, cols: usize) -> Result<()> {
    if buf.len() != rows * cols {
        return Err(GemmError::DimensionMismatch(format!(
            "{name}: expected {rows}x{cols}={} elements, got {}",
            rows * cols,
            buf.len()
        )));
    }
    Ok(())
}
