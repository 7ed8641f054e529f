use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Barrier;
use std::thread;

use crate::blocked::partition::Tile;
use crate::error::{GemmError, Result};

/// Identity of one worker among `num_threads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadContext {
    pub thread_id: usize,
    pub num_threads: usize,
}

impl ThreadContext {
    pub fn new(thread_id: usize, num_threads: usize) -> Result<Self> {
        if num_threads == 0 || thread_id >= num_threads {
            return Err(GemmError::DimensionMismatch(format!(
                "thread {thread_id} out of range for {num_threads} threads"
            )));
        }
        Ok(Self {
            thread_id,
            num_threads,
        })
    }

    pub fn single() -> Self {
        Self {
            thread_id: 0,
            num_threads: 1,
        }
    }

    /// Span of `total` work items owned by this thread.
    pub fn span(&self, total: usize) -> Range<usize> {
        partition_1d(self.thread_id, self.num_threads, total)
    }
}

/// Split `0..total` into `num_threads` contiguous spans whose sizes differ
/// by at most one; earlier threads take the extra items.
pub fn partition_1d(thread_id: usize, num_threads: usize, total: usize) -> Range<usize> {
    let per = total / num_threads;
    let extra = total % num_threads;
    let start = thread_id * per + thread_id.min(extra);
    let len = per + usize::from(thread_id < extra);
    start..start + len
}

/// Pick a thread count for an `m × n × k` problem.
///
/// Small problems don't repay thread start-up:
/// - < 100M FLOPs: 1 thread
/// - < 300M FLOPs: 2 threads
/// - Otherwise: up to `max_threads`
///
/// Never more than one thread per 64 rows of C.
pub fn choose_thread_count(m: usize, n: usize, k: usize, max_threads: usize) -> usize {
    let flops = 2.0 * m as f64 * n as f64 * k as f64;

    const SINGLE_THREAD_THRESHOLD: f64 = 100_000_000.0;
    const TWO_THREAD_THRESHOLD: f64 = 300_000_000.0;

    let optimal_threads = if flops < SINGLE_THREAD_THRESHOLD {
        1
    } else if flops < TWO_THREAD_THRESHOLD {
        2
    } else {
        max_threads
    };

    let threads_by_rows = (m / 64).max(1);

    optimal_threads.min(threads_by_rows).min(max_threads).max(1)
}

/// Run `work` over `tiles` on `num_threads` scoped workers.
///
/// `c` starts at row 0 of the tiles with row stride `ldc`. Each worker gets
/// its span of tiles, the band of `c` those tiles cover, and the global row
/// at which that band starts. Returns the summed counts from `work`.
pub(crate) fn run_workers<F>(
    c: &mut [f32],
    ldc: usize,
    tiles: &[Tile],
    num_threads: usize,
    work: F,
) -> Result<usize>
where
    F: Fn(&mut [f32], &[Tile], usize) -> Result<usize> + Sync,
{
    let threads = num_threads.min(tiles.len()).max(1);
    if threads == 1 {
        return work(c, tiles, 0);
    }

    let spans: Vec<Range<usize>> = (0..threads)
        .map(|t| partition_1d(t, threads, tiles.len()))
        .collect();

    // Every span is non-empty because threads <= tiles.len().
    let mut bands = Vec::with_capacity(threads);
    let mut rest = c;
    let mut offset = 0;
    for span in spans.iter().skip(1) {
        let split = (tiles[span.start].row * ldc).min(offset + rest.len());
        let (band, tail) = rest.split_at_mut(split - offset);
        bands.push(band);
        rest = tail;
        offset = split;
    }
    bands.push(rest);

    let barrier = Barrier::new(threads);
    let barrier = &barrier;
    let work = &work;

    thread::scope(|s| {
        let handles: Vec<_> = bands
            .into_iter()
            .zip(&spans)
            .map(|(band, span)| {
                let span_tiles = &tiles[span.clone()];
                s.spawn(move || {
                    barrier.wait();
                    let row_base = span_tiles[0].row;
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| work(band, span_tiles, row_base)));
                    barrier.wait();
                    outcome
                })
            })
            .collect();

        let mut calls = 0;
        let mut first_error = None;
        for (tid, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(Ok(n))) => calls += n,
                Ok(Ok(Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Ok(Err(_)) | Err(_) => {
                    first_error.get_or_insert(GemmError::WorkerPanicked(tid));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(calls),
        }
    })
}
