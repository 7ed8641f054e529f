use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use matmul_dispatch::matrix::Transpose;
use matmul_dispatch::matrix::naive::gemm_naive;
use matmul_dispatch::{CapabilityLevel, Driver, PackedMatrix};
use std::hint::black_box;

fn operands(n: usize) -> (Vec<f32>, Vec<f32>) {
    let a: Vec<f32> = (0..n * n).map(|i| (i as f32 * 0.001).sin()).collect();
    let b: Vec<f32> = (0..n * n).map(|i| (i as f32 * 0.002).cos()).collect();
    (a, b)
}

fn bench_naive(c: &mut Criterion) {
    let mut group = c.benchmark_group("sgemm_naive");
    for &n in &[64, 128, 256] {
        let (a, b) = operands(n);
        let mut c_mat = vec![0.0f32; n * n];
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
            bench.iter(|| gemm_naive(Transpose::NoTrans, &a, &b, &mut c_mat, n, n, n, 1.0, 0.0));
        });
    }
    group.finish();
}

fn bench_levels(c: &mut Criterion) {
    for level in CapabilityLevel::ALL {
        let Ok(driver) = Driver::new(level) else {
            continue;
        };
        let mut group = c.benchmark_group(format!("sgemm_{}", level.name().to_lowercase()));
        for &n in &[64, 128, 256, 512] {
            let (a, b) = operands(n);
            let Ok(packed) = PackedMatrix::pack(level, &b, n, n, n) else {
                continue;
            };
            let mut c_mat = vec![0.0f32; n * n];
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
                bench.iter(|| {
                    black_box(driver.run(Transpose::NoTrans, n, &a, n, &packed, &mut c_mat, n, 1.0, 0.0, 1))
                });
            });
        }
        group.finish();
    }
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_b");
    for &n in &[128, 512] {
        let (_, b) = operands(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, &n| {
            bench.iter(|| black_box(PackedMatrix::pack(CapabilityLevel::Avx2, &b, n, n, n)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_naive, bench_levels, bench_pack);
criterion_main!(benches);
