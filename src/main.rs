//! Benchmark runner: naive GEMM against every kernel level this CPU runs.

use matmul_dispatch::matrix::Transpose;
use matmul_dispatch::matrix::naive::gemm_naive;
use matmul_dispatch::{CapabilityLevel, Driver, PackedMatrix, capability, choose_thread_count};
use std::time::Instant;

const THREADS: usize = 4;

fn main() {
    println!("=== Dispatched SGEMM Benchmark ===\n");

    let sizes = [256, 512, 1024];
    let iterations = 3;

    let levels: Vec<CapabilityLevel> = CapabilityLevel::ALL
        .into_iter()
        .filter(|&level| Driver::new(level).is_ok())
        .collect();

    match capability() {
        Ok(level) => println!("Dispatch level: {}", level),
        Err(e) => println!("Dispatch level: unavailable ({})", e),
    }
    let names: Vec<&str> = levels.iter().map(|l| l.name()).collect();
    println!("Runnable levels: {}\n", names.join(", "));

    let mut all_results = Vec::new();

    for &size in &sizes {
        println!("Matrix: {}×{}", size, size);
        println!("{}", "-".repeat(50));

        let (m, n, k) = (size, size, size);
        let a: Vec<f32> = (0..m * k).map(|i| (i % 100) as f32 * 0.01).collect();
        let b: Vec<f32> = (0..k * n).map(|i| (i % 100) as f32 * 0.01).collect();

        let mut results: Vec<(String, (f64, f64))> = vec![(
            "Naive (i-k-j)".to_string(),
            bench_fn(m, n, k, iterations, |c| {
                gemm_naive(Transpose::NoTrans, &a, &b, c, m, n, k, 1.0, 0.0)
            }),
        )];

        for &level in &levels {
            let (driver, packed) = match Driver::new(level)
                .and_then(|d| PackedMatrix::pack(level, &b, k, n, n).map(|p| (d, p)))
            {
                Ok(pair) => pair,
                Err(e) => {
                    println!("Skipping {} - {}", level, e);
                    continue;
                }
            };

            results.push((
                level.to_string(),
                bench_fn(m, n, k, iterations, |c| {
                    run_or_report(&driver, &a, &packed, c, m, 1)
                }),
            ));

            let threads = choose_thread_count(m, n, k, THREADS);
            results.push((
                format!("{} MT", level),
                bench_fn(m, n, k, iterations, |c| {
                    run_or_report(&driver, &a, &packed, c, m, threads)
                }),
            ));
        }

        // Print results
        let baseline_time = results[0].1.0;
        for (i, (name, (time_ms, gflops))) in results.iter().enumerate() {
            let speedup = baseline_time / time_ms;
            println!(
                "{}. {:16} {:8.2} ms  {:6.2} GFLOPS  ({:.1}×)",
                i + 1,
                name,
                time_ms,
                gflops,
                speedup
            );
        }
        println!();

        all_results.push((size, results));
    }

    print_summary_table(&all_results, &sizes);
}

fn run_or_report(
    driver: &Driver,
    a: &[f32],
    packed: &PackedMatrix,
    c: &mut [f32],
    m: usize,
    threads: usize,
) {
    let n = packed.num_cols();
    let k = packed.num_rows();
    if let Err(e) = driver.run(Transpose::NoTrans, m, a, k, packed, c, n, 1.0, 0.0, threads) {
        eprintln!("{} run failed: {}", driver.level(), e);
    }
}

/// Time `f` writing into a fresh m×n output.
fn bench_fn<F>(m: usize, n: usize, k: usize, iterations: usize, f: F) -> (f64, f64)
where
    F: Fn(&mut [f32]),
{
    // Warmup
    let mut c = vec![0.0; m * n];
    f(&mut c);

    // Timed runs
    let mut total = 0.0;
    for _ in 0..iterations {
        let mut c = vec![0.0; m * n];
        let start = Instant::now();
        f(&mut c);
        total += start.elapsed().as_secs_f64();
    }

    let avg = total / iterations as f64;
    let gflops = 2.0 * (m * n * k) as f64 / avg / 1e9;
    (avg * 1000.0, gflops)
}

#[allow(clippy::type_complexity)]
fn print_summary_table(all_results: &[(usize, Vec<(String, (f64, f64))>)], sizes: &[usize]) {
    println!("\n{}", "=".repeat(90));
    println!("SUMMARY");
    println!("{}", "=".repeat(90));

    print!("\n{:<18}", "Method");
    for size in sizes {
        print!(" {:>14}", format!("{}×{}", size, size));
    }
    println!(" {:>12}", "Speedup");
    println!("{}", "-".repeat(90));

    let num_methods = all_results[0].1.len();

    for method_idx in 0..num_methods {
        let method_name = &all_results[0].1[method_idx].0;

        let mut speedups = Vec::new();
        print!("{:<18}", method_name);
        for (_, results) in all_results {
            let (time_ms, gflops) = results[method_idx].1;
            let baseline_time = results[0].1.0;
            print!(" {:>11.2} GF", gflops);
            speedups.push(baseline_time / time_ms);
        }

        let avg_speedup: f64 = speedups.iter().sum::<f64>() / speedups.len() as f64;
        println!(" {:>11.1}×", avg_speedup);
    }

    println!("{}", "=".repeat(90));
    println!("\nGF = GFLOPS (billion floating point operations per second)");
    println!("Speedup relative to Naive (i-k-j). Higher is better.\n");
}
