use super::Transpose;

/// Naive GEMM using i-k-j loop order: `C = alpha * op(A) * B + beta * C`.
///
/// The innermost loop walks B and C with stride 1, so this is the scalar
/// baseline the packed kernels are checked and benchmarked against.
/// `beta == 0` overwrites C without reading it.
///
/// # Arguments
///
/// * `a` - Matrix A (m × k) row-major, or (k × m) row-major when transposed
/// * `b` - Matrix B (k × n), row-major
/// * `c` - Matrix C (m × n), row-major
///
/// # Panics
///
/// Panics if a slice is shorter than its dimensions require.
#[allow(clippy::too_many_arguments)]
pub fn gemm_naive(
    trans_a: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    beta: f32,
) {
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        if beta == 0.0 {
            c_row.fill(0.0);
        } else {
            c_row.iter_mut().for_each(|v| *v *= beta);
        }

        for p in 0..k {
            let a_ip = match trans_a {
                Transpose::NoTrans => a[i * k + p],
                Transpose::Trans => a[p * m + i],
            };
            let scaled = alpha * a_ip;
            for (c_ij, b_pj) in c_row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *c_ij += scaled * b_pj;
            }
        }
    }
}
