use matmul_dispatch::matrix::naive::gemm_naive;
use matmul_dispatch::{
    CapabilityLevel, Driver, GemmError, PackOptions, PackedMatrix, Transpose, capability, gemm,
    gemm_parallel, multiply, multiply_parallel, pack_b,
};

fn assert_matrices_close(expected: &[f32], actual: &[f32], name: &str) {
    assert_eq!(expected.len(), actual.len(), "{}: length mismatch", name);
    for i in 0..expected.len() {
        let tol = 1e-5 * expected[i].abs().max(1.0);
        assert!(
            (expected[i] - actual[i]).abs() <= tol,
            "{}: mismatch at index {}: expected {}, got {}",
            name,
            i,
            expected[i],
            actual[i]
        );
    }
}

/// Quarter-integers keep every product and partial sum exact in f32.
fn test_data(len: usize, seed: usize) -> Vec<f32> {
    (0..len).map(|i| ((i * 7 + seed) % 13) as f32 * 0.25 - 1.5).collect()
}

fn runnable_levels() -> Vec<CapabilityLevel> {
    CapabilityLevel::ALL
        .into_iter()
        .filter(|&level| Driver::new(level).is_ok())
        .collect()
}

// ============================================================
// Small scenarios
// ============================================================

#[test]
fn test_all_ones_3x2x4() {
    let (m, n, k) = (3, 2, 4);
    let a = vec![1.0f32; m * k];
    let b = vec![1.0f32; k * n];
    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();

    let mut c = vec![f32::NAN; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c, 0, 1).unwrap();
    assert_eq!(c, vec![4.0; m * n]);

    let mut c = vec![10.0f32; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 1.0, &mut c, 0, 1).unwrap();
    assert_eq!(c, vec![14.0; m * n]);
}

#[test]
fn test_2x3_times_3x2() {
    let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
    let b = vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]; // 3x2

    let mut c = vec![0.0; 4];
    multiply(&a, &b, &mut c, 2, 2, 3).unwrap();
    assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
}

#[test]
fn test_capability_is_stable() {
    let first = capability().unwrap();
    assert_eq!(capability().unwrap(), first);
    assert!(Driver::new(first).is_ok());
}

// ============================================================
// Every runnable level against the reference kernels
// ============================================================

#[test]
fn test_levels_match_reference() {
    let shapes = [
        (1, 1, 1),
        (3, 5, 7),
        (6, 16, 9),
        (7, 17, 13),
        (13, 31, 5),
        (14, 32, 33),
        (15, 33, 64),
        (29, 47, 70),
    ];
    let reference = Driver::reference();

    for level in runnable_levels() {
        let driver = Driver::new(level).unwrap();
        for (m, n, k) in shapes {
            let a = test_data(m * k, 1);
            let b = test_data(k * n, 5);
            let c0 = test_data(m * n, 9);
            // Small K-blocks so multi-block accumulation is covered.
            let packed =
                PackedMatrix::pack_with(level, &b, k, n, n, PackOptions::default().block_rows(8))
                    .unwrap();

            for beta in [0.0, 1.0, 0.5] {
                let mut expected = c0.clone();
                reference
                    .run(Transpose::NoTrans, m, &a, k, &packed, &mut expected, n, 1.0, beta, 1)
                    .unwrap();

                let mut actual = c0.clone();
                driver
                    .run(Transpose::NoTrans, m, &a, k, &packed, &mut actual, n, 1.0, beta, 1)
                    .unwrap();

                assert_matrices_close(
                    &expected,
                    &actual,
                    &format!("{} {}x{}x{} beta={}", level, m, n, k, beta),
                );
            }
        }
    }
}

#[test]
fn test_levels_match_naive_with_alpha() {
    let (m, n, k) = (23, 41, 19);
    let a = test_data(m * k, 2);
    let b = test_data(k * n, 3);

    let mut expected = test_data(m * n, 4);
    let c0 = expected.clone();
    gemm_naive(Transpose::NoTrans, &a, &b, &mut expected, m, n, k, 2.0, 0.5);

    for level in runnable_levels() {
        let packed = PackedMatrix::pack(level, &b, k, n, n).unwrap();
        let mut c = c0.clone();
        Driver::new(level)
            .unwrap()
            .run(Transpose::NoTrans, m, &a, k, &packed, &mut c, n, 2.0, 0.5, 1)
            .unwrap();
        assert_matrices_close(&expected, &c, &format!("{} alpha", level));
    }
}

#[test]
fn test_tile_boundaries() {
    // Row counts around each family's tile heights, columns around the
    // 8/16/32-wide column blocks.
    let rows = [1, 5, 6, 7, 12, 13, 14, 15, 28, 29];
    let cols = [1, 7, 8, 9, 15, 16, 17, 31, 32, 33];
    let k = 11;

    for level in runnable_levels() {
        let driver = Driver::new(level).unwrap();
        for &m in &rows {
            for &n in &cols {
                let a = test_data(m * k, m);
                let b = test_data(k * n, n);
                let mut expected = vec![0.0; m * n];
                gemm_naive(Transpose::NoTrans, &a, &b, &mut expected, m, n, k, 1.0, 0.0);

                let packed = PackedMatrix::pack(level, &b, k, n, n).unwrap();
                let mut c = vec![f32::NAN; m * n];
                driver
                    .run(Transpose::NoTrans, m, &a, k, &packed, &mut c, n, 1.0, 0.0, 1)
                    .unwrap();
                assert_matrices_close(&expected, &c, &format!("{} {}x{}", level, m, n));
            }
        }
    }
}

#[test]
fn test_transposed_a() {
    let (m, n, k) = (17, 20, 9);
    let at = test_data(k * m, 6); // K×m
    let b = test_data(k * n, 7);

    let mut expected = vec![0.0; m * n];
    gemm_naive(Transpose::Trans, &at, &b, &mut expected, m, n, k, 1.0, 0.0);

    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();
    let mut c = vec![0.0; m * n];
    gemm_parallel(Transpose::Trans, m as i64, &at, &packed, 0.0, &mut c, 2).unwrap();
    assert_matrices_close(&expected, &c, "trans_a");
}

#[test]
fn test_transposed_b_with_folded_alpha() {
    let (m, n, k) = (9, 19, 12);
    let a = test_data(m * k, 8);
    let b = test_data(k * n, 9);
    let bt: Vec<f32> = (0..n * k).map(|idx| b[(idx % k) * n + idx / k]).collect(); // N×K

    let mut expected = vec![0.0; m * n];
    gemm_naive(Transpose::NoTrans, &a, &b, &mut expected, m, n, k, 0.5, 0.0);

    let level = capability().unwrap();
    let opts = PackOptions::default().trans(Transpose::Trans).alpha(0.5);
    let packed = PackedMatrix::pack_with(level, &bt, k, n, k, opts).unwrap();
    let mut c = vec![0.0; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c, 0, 1).unwrap();
    assert_matrices_close(&expected, &c, "trans_b");
}

// ============================================================
// beta semantics
// ============================================================

#[test]
fn test_beta_zero_ignores_prior_c() {
    let (m, n, k) = (10, 21, 6);
    let a = test_data(m * k, 1);
    let b = test_data(k * n, 2);
    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();

    let mut c_nan = vec![f32::NAN; m * n];
    let mut c_junk = vec![1e30; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c_nan, 0, 1).unwrap();
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c_junk, 0, 1).unwrap();

    assert!(c_nan.iter().all(|v| v.is_finite()));
    assert_eq!(c_nan, c_junk);
}

#[test]
fn test_beta_one_accumulates() {
    let (m, n, k) = (12, 18, 14);
    let a = test_data(m * k, 3);
    let b = test_data(k * n, 4);
    let prior = test_data(m * n, 5);
    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();

    let mut product = vec![0.0; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut product, 0, 1).unwrap();

    let mut c = prior.clone();
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 1.0, &mut c, 0, 1).unwrap();

    let expected: Vec<f32> = product.iter().zip(&prior).map(|(p, c)| p + c).collect();
    assert_matrices_close(&expected, &c, "beta=1");
}

// ============================================================
// Degenerate and invalid shapes
// ============================================================

#[test]
fn test_zero_dims_leave_c_untouched() {
    let b = vec![1.0f32; 4 * 3];
    let packed = pack_b(&b, 4, 3, 3).unwrap();
    let mut empty_c: Vec<f32> = Vec::new();
    gemm(Transpose::NoTrans, 0, &[], &packed, 0.0, &mut empty_c, 0, 1).unwrap();
    assert!(empty_c.is_empty());

    let empty_n = pack_b(&[], 4, 0, 0).unwrap();
    let a = vec![1.0f32; 2 * 4];
    gemm(Transpose::NoTrans, 2, &a, &empty_n, 0.0, &mut empty_c, 0, 1).unwrap();
    assert!(empty_c.is_empty());

    // K = 0 still has an m×N output, which must not be touched.
    let mut c = vec![7.0f32; 6];
    let empty_k = pack_b(&[], 0, 3, 3).unwrap();
    gemm(Transpose::NoTrans, 2, &[], &empty_k, 0.0, &mut c, 0, 1).unwrap();
    assert_eq!(c, vec![7.0; 6]);
    gemm_parallel(Transpose::NoTrans, 2, &[], &empty_k, 0.0, &mut c, 2).unwrap();
    assert_eq!(c, vec![7.0; 6]);
}

#[test]
fn test_negative_dims_are_rejected() {
    let b = vec![1.0f32; 4];
    assert_eq!(
        pack_b(&b, -1, 2, 2).unwrap_err(),
        GemmError::InvalidDimension { name: "k", value: -1 }
    );
    assert_eq!(
        pack_b(&b, 2, -2, 2).unwrap_err(),
        GemmError::InvalidDimension { name: "n", value: -2 }
    );

    let packed = pack_b(&b, 2, 2, 2).unwrap();
    let mut c = vec![0.0f32; 4];
    assert_eq!(
        gemm(Transpose::NoTrans, -3, &[], &packed, 0.0, &mut c, 0, 1).unwrap_err(),
        GemmError::InvalidDimension { name: "m", value: -3 }
    );
}

#[test]
fn test_k_mismatch_is_rejected() {
    let b = vec![1.0f32; 4 * 2];
    let packed = pack_b(&b, 4, 2, 2).unwrap();
    let a = vec![1.0f32; 3 * 3]; // built for K = 3
    let mut c = vec![5.0f32; 3 * 2];

    let err = gemm(Transpose::NoTrans, 3, &a, &packed, 0.0, &mut c, 0, 1).unwrap_err();
    assert!(matches!(err, GemmError::DimensionMismatch(_)));
    assert_eq!(c, vec![5.0; 6]);
}

#[test]
fn test_larger_k_is_rejected() {
    let b = vec![1.0f32; 4 * 2];
    let packed = pack_b(&b, 4, 2, 2).unwrap();
    let a: Vec<f32> = (0..3 * 5).map(|i| i as f32).collect(); // built for K = 5
    let mut c = vec![5.0f32; 3 * 2];

    for trans in [Transpose::NoTrans, Transpose::Trans] {
        let err = gemm(trans, 3, &a, &packed, 0.0, &mut c, 0, 1).unwrap_err();
        assert!(matches!(err, GemmError::DimensionMismatch(_)));
        let err = gemm_parallel(trans, 3, &a, &packed, 0.0, &mut c, 2).unwrap_err();
        assert!(matches!(err, GemmError::DimensionMismatch(_)));
    }
    assert_eq!(c, vec![5.0; 6]);

    // An over-long C is rejected the same way.
    let a = vec![1.0f32; 3 * 4];
    let mut long_c = vec![5.0f32; 3 * 2 + 1];
    let err = gemm_parallel(Transpose::NoTrans, 3, &a, &packed, 0.0, &mut long_c, 1).unwrap_err();
    assert!(matches!(err, GemmError::DimensionMismatch(_)));
    assert_eq!(long_c, vec![5.0; 7]);
}

#[test]
fn test_short_c_is_rejected() {
    let b = vec![1.0f32; 2 * 2];
    let packed = pack_b(&b, 2, 2, 2).unwrap();
    let a = vec![1.0f32; 3 * 2];
    let mut c = vec![0.0f32; 5];
    let err = gemm_parallel(Transpose::NoTrans, 3, &a, &packed, 0.0, &mut c, 2).unwrap_err();
    assert!(matches!(err, GemmError::DimensionMismatch(_)));
}

#[test]
fn test_multiply_checks_lengths() {
    let a = vec![1.0f32; 5];
    let b = vec![1.0f32; 6];
    let mut c = vec![0.0f32; 4];
    assert!(matches!(
        multiply(&a, &b, &mut c, 2, 2, 3),
        Err(GemmError::DimensionMismatch(_))
    ));
}

#[test]
fn test_invalid_thread_context() {
    let b = vec![1.0f32; 4];
    let packed = pack_b(&b, 2, 2, 2).unwrap();
    let a = vec![1.0f32; 4];
    let mut c = vec![0.0f32; 4];
    assert!(gemm(Transpose::NoTrans, 2, &a, &packed, 0.0, &mut c, 2, 2).is_err());
    assert!(gemm(Transpose::NoTrans, 2, &a, &packed, 0.0, &mut c, 0, 0).is_err());
}

// ============================================================
// Multi-threaded
// ============================================================

#[test]
fn test_thread_count_does_not_change_result() {
    let (m, n, k) = (128, 64, 64);
    let a = test_data(m * k, 1);
    let b = test_data(k * n, 2);
    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();

    let mut c_single = vec![0.0; m * n];
    let mut c_multi = vec![0.0; m * n];
    gemm_parallel(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c_single, 1).unwrap();
    gemm_parallel(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c_multi, 8).unwrap();

    assert_eq!(c_single, c_multi);
}

#[test]
fn test_thread_ids_partition_rows() {
    let (m, n, k) = (50, 24, 16);
    let a = test_data(m * k, 3);
    let b = test_data(k * n, 4);
    let packed = pack_b(&b, k as i64, n as i64, n).unwrap();

    let mut expected = vec![0.0; m * n];
    gemm_parallel(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut expected, 1).unwrap();

    let num_threads = 3;
    let mut c = vec![0.0; m * n];
    for tid in 0..num_threads {
        gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut c, tid, num_threads).unwrap();
    }
    assert_eq!(expected, c);

    // A single id covers only part of the rows.
    let mut partial = vec![f32::NAN; m * n];
    gemm(Transpose::NoTrans, m as i64, &a, &packed, 0.0, &mut partial, 0, num_threads).unwrap();
    assert!(partial[..n].iter().all(|v| v.is_finite()));
    assert!(partial[(m - 1) * n..].iter().all(|v| v.is_nan()));
}

#[test]
fn test_multiply_parallel_matches_single() {
    let size = 256;
    let a = test_data(size * size, 5);
    let b = test_data(size * size, 6);

    let mut c_single = vec![0.0; size * size];
    let mut c_mt = vec![0.0; size * size];
    multiply(&a, &b, &mut c_single, size, size, size).unwrap();
    multiply_parallel(&a, &b, &mut c_mt, size, size, size, 4).unwrap();

    assert_eq!(c_single, c_mt);
}

#[test]
fn test_large_matches_naive() {
    let (m, n, k) = (130, 70, 600);
    let a = test_data(m * k, 1);
    let b = test_data(k * n, 2);

    let mut expected = vec![0.0; m * n];
    gemm_naive(Transpose::NoTrans, &a, &b, &mut expected, m, n, k, 1.0, 0.0);

    let mut c = vec![0.0; m * n];
    multiply_parallel(&a, &b, &mut c, m, n, k, 4).unwrap();
    assert_matrices_close(&expected, &c, "130x70x600");
}
