//! Execution driver: tiles × K-blocks → micro-kernel calls.

use crate::blocked::pack::{PackedMatrix, check_source};
use crate::blocked::partition::{Tile, tiles};
use crate::error::{GemmError, Result};
use crate::isa::{self, CapabilityLevel};
use crate::kernels::reference::ReferenceFamily;
use crate::kernels::{self, GemmParams, KernelFamily};
use crate::matrix::Transpose;
use crate::threaded::{ThreadContext, run_workers};

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Row tiles covered by this run.
    pub tiles: usize,
    /// Micro-kernel invocations.
    pub kernel_calls: usize,
}

/// Left operand as the kernels read it: element `(i, p)` of op(A).
#[derive(Debug, Clone, Copy)]
struct Lhs<'a> {
    data: &'a [f32],
    trans: Transpose,
    ld: usize,
}

impl Lhs<'_> {
    #[inline]
    fn get(&self, i: usize, p: usize) -> f32 {
        match self.trans {
            Transpose::NoTrans => self.data[i * self.ld + p],
            Transpose::Trans => self.data[p * self.ld + i],
        }
    }
}

/// Shape and scaling of one GEMM call, shared by every worker.
#[derive(Clone, Copy)]
struct Problem<'a> {
    a: Lhs<'a>,
    panel: &'a PackedMatrix,
    ldc: usize,
    alpha: f32,
    beta: f32,
}

/// Runs packed GEMMs on one kernel family.
#[derive(Clone, Copy)]
pub struct Driver {
    family: &'static dyn KernelFamily,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("level", &self.family.level())
            .finish()
    }
}

static REFERENCE: ReferenceFamily = ReferenceFamily;

impl Driver {
    /// Driver for `level`. `Baseline` selects the reference kernels; any
    /// other level must be registered and runnable on this CPU.
    pub fn new(level: CapabilityLevel) -> Result<Self> {
        if level == CapabilityLevel::Baseline {
            return Ok(Self::reference());
        }
        if !isa::is_supported(level) {
            return Err(GemmError::UnsupportedLevel(level));
        }
        let family = kernels::lookup(level)?;
        log::debug!(
            "selected {level} kernels: up to {} rows, block width {}",
            family.table().max_rows(),
            family.block_width()
        );
        Ok(Self { family })
    }

    /// Driver for the detected capability level.
    pub fn detected() -> Result<Self> {
        Self::new(isa::detect()?)
    }

    /// Driver on the portable reference kernels.
    pub fn reference() -> Self {
        Self {
            family: &REFERENCE,
        }
    }

    pub fn level(&self) -> CapabilityLevel {
        self.family.level()
    }

    pub fn family(&self) -> &'static dyn KernelFamily {
        self.family
    }

    /// Row tiles for an `m`-row output.
    pub fn tiles(&self, m: usize) -> Result<Vec<Tile>> {
        Ok(tiles(&self.family.partition(m)?))
    }

    /// `C = alpha · op(A) · B + beta · C` on `num_threads` workers.
    ///
    /// `op(A)` is `m × K` with leading dimension `lda`; K and N come from
    /// `panel`. C is `m × N` with row stride `ldc`. With `beta == 0` prior
    /// contents of C are never read.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        trans_a: Transpose,
        m: usize,
        a: &[f32],
        lda: usize,
        panel: &PackedMatrix,
        c: &mut [f32],
        ldc: usize,
        alpha: f32,
        beta: f32,
        num_threads: usize,
    ) -> Result<RunStats> {
        if num_threads == 0 {
            return Err(GemmError::DimensionMismatch(
                "num_threads must be at least 1".to_string(),
            ));
        }
        let problem = self.validate(trans_a, m, a, lda, panel, c, ldc, alpha, beta)?;
        if m == 0 || panel.num_rows() == 0 || panel.num_cols() == 0 {
            return Ok(RunStats::default());
        }

        let tiles = self.tiles(m)?;
        let kernel_calls = run_workers(c, ldc, &tiles, num_threads, |band, span, row_base| {
            self.run_span(&problem, band, span, row_base)
        })?;

        log::trace!(
            "{} gemm {m}x{}x{}: {} tiles, {kernel_calls} kernel calls, {num_threads} threads",
            self.level(),
            panel.num_cols(),
            panel.num_rows(),
            tiles.len()
        );
        Ok(RunStats {
            tiles: tiles.len(),
            kernel_calls,
        })
    }

    /// Like [`Driver::run`], but computes only the tiles `ctx` owns.
    ///
    /// Threads that share one C must coordinate outside this call; prefer
    /// [`Driver::run`] with `num_threads > 1`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_thread(
        &self,
        trans_a: Transpose,
        m: usize,
        a: &[f32],
        lda: usize,
        panel: &PackedMatrix,
        c: &mut [f32],
        ldc: usize,
        alpha: f32,
        beta: f32,
        ctx: ThreadContext,
    ) -> Result<RunStats> {
        let problem = self.validate(trans_a, m, a, lda, panel, c, ldc, alpha, beta)?;
        if m == 0 || panel.num_rows() == 0 || panel.num_cols() == 0 {
            return Ok(RunStats::default());
        }

        let tiles = self.tiles(m)?;
        let span = &tiles[ctx.span(tiles.len())];
        let kernel_calls = self.run_span(&problem, c, span, 0)?;
        Ok(RunStats {
            tiles: span.len(),
            kernel_calls,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn validate<'a>(
        &self,
        trans_a: Transpose,
        m: usize,
        a: &'a [f32],
        lda: usize,
        panel: &'a PackedMatrix,
        c: &[f32],
        ldc: usize,
        alpha: f32,
        beta: f32,
    ) -> Result<Problem<'a>> {
        let (k, n) = (panel.num_rows(), panel.num_cols());

        if !self.family.accepts_block_width(panel.block_col_size()) {
            return Err(GemmError::DimensionMismatch(format!(
                "panel packed for {} (block width {}) cannot feed {} kernels (block width {})",
                panel.level(),
                panel.block_col_size(),
                self.level(),
                self.family.block_width()
            )));
        }

        match trans_a {
            Transpose::NoTrans => check_source(a, m, k, lda)?,
            Transpose::Trans => check_source(a, k, m, lda)?,
        }
        if n > 0 && ldc < n {
            return Err(GemmError::DimensionMismatch(format!(
                "ldc {ldc} is smaller than N = {n}"
            )));
        }
        check_source(c, m, n, ldc)?;

        Ok(Problem {
            a: Lhs {
                data: a,
                trans: trans_a,
                ld: lda,
            },
            panel,
            ldc,
            alpha,
            beta,
        })
    }

    /// Compute `span` into `c`, whose first row is global row `row_base`.
    fn run_span(
        &self,
        problem: &Problem<'_>,
        c: &mut [f32],
        span: &[Tile],
        row_base: usize,
    ) -> Result<usize> {
        let panel = problem.panel;
        let (k, n) = (panel.num_rows(), panel.num_cols());
        let bw = panel.block_col_size();
        let nb = panel.num_block_cols();
        let full_blocks = n / bw;
        let max_rows = span.iter().map(|t| t.kernel_rows).max().unwrap_or(0);

        let mut a_pack = vec![0.0f32; max_rows * panel.block_row_size().min(k)];
        // Masked tiles stage every column block; ragged ones only the last.
        let tmp_width = if span.iter().any(Tile::is_masked) {
            nb * bw
        } else if full_blocks < nb {
            bw
        } else {
            0
        };
        let mut c_tmp = vec![0.0f32; max_rows * tmp_width];
        let mut calls = 0;

        for tile in span {
            let kernel = self.family.kernel(tile.kernel_rows)?;
            let local_row = tile
                .row
                .checked_sub(row_base)
                .ok_or_else(|| out_of_bounds(tile, "tile starts before its band".to_string()))?;
            if tile.rows == 0 {
                return Err(out_of_bounds(tile, "empty tile".to_string()));
            }
            let needed = (local_row + tile.rows - 1) * problem.ldc + n;
            if needed > c.len() {
                return Err(out_of_bounds(
                    tile,
                    format!("needs {needed} elements of C, band has {}", c.len()),
                ));
            }
            let kr = tile.kernel_rows;
            let c_tile = &mut c[local_row * problem.ldc..];

            for k0 in (0..k).step_by(panel.block_row_size()) {
                let b_block = panel.k_block(k0);
                let kb = b_block.len() / (nb * bw);
                // Only the first K-block sees the caller's beta.
                let beta = if k0 == 0 { problem.beta } else { 1.0 };

                let a_tile = &mut a_pack[..kr * kb];
                pack_a(&problem.a, tile, k0, kb, problem.alpha, a_tile);

                let mut gp = GemmParams {
                    k: kb,
                    a: a_tile.as_ptr(),
                    b: b_block.as_ptr(),
                    beta,
                    c: c_tile.as_mut_ptr(),
                    ldc: problem.ldc,
                    b_block_cols: full_blocks,
                    block_width: bw,
                };

                if !tile.is_masked() {
                    if full_blocks > 0 {
                        // SAFETY: the tile was checked to cover `kr` rows of
                        // `n >= full_blocks * bw` columns at stride `ldc`, the
                        // packed A tile holds `kb * kr` values and the K-block
                        // holds `nb >= full_blocks` column blocks.
                        unsafe { kernel(&gp) };
                        calls += 1;
                    }
                    if full_blocks < nb {
                        let tmp = &mut c_tmp[..kr * bw];
                        gp.b = b_block[full_blocks * kb * bw..].as_ptr();
                        gp.beta = 0.0;
                        gp.c = tmp.as_mut_ptr();
                        gp.ldc = bw;
                        gp.b_block_cols = 1;
                        // SAFETY: `tmp` is `kr × bw`, the final column block
                        // holds `kb * bw` packed values.
                        unsafe { kernel(&gp) };
                        calls += 1;
                        merge(c_tile, problem.ldc, tmp, bw, tile.rows, full_blocks * bw..n, beta);
                    }
                } else {
                    let width = nb * bw;
                    let tmp = &mut c_tmp[..kr * width];
                    gp.beta = 0.0;
                    gp.c = tmp.as_mut_ptr();
                    gp.ldc = width;
                    gp.b_block_cols = nb;
                    // SAFETY: `tmp` is `kr × (nb · bw)` and the K-block holds
                    // `nb` column blocks of `kb × bw`.
                    unsafe { kernel(&gp) };
                    calls += 1;
                    merge(c_tile, problem.ldc, tmp, width, tile.rows, 0..n, beta);
                }
            }
        }
        Ok(calls)
    }
}

/// Pack rows `tile.row .. tile.row + kernel_rows` of op(A), depth
/// `k0 .. k0 + kb`, scaled by `alpha`. Rows past the tile are zero.
fn pack_a(a: &Lhs<'_>, tile: &Tile, k0: usize, kb: usize, alpha: f32, out: &mut [f32]) {
    let kr = tile.kernel_rows;
    for (p, col) in out.chunks_exact_mut(kr).take(kb).enumerate() {
        for (i, v) in col.iter_mut().enumerate() {
            *v = if i < tile.rows {
                alpha * a.get(tile.row + i, k0 + p)
            } else {
                0.0
            };
        }
    }
}

/// Fold a temporary tile into columns `cols` of C: `C = tmp` for
/// `beta == 0`, else `C = beta · C + tmp`. Column 0 of `tmp` maps to
/// `cols.start`.
fn merge(
    c: &mut [f32],
    ldc: usize,
    tmp: &[f32],
    ld_tmp: usize,
    rows: usize,
    cols: std::ops::Range<usize>,
    beta: f32,
) {
    for i in 0..rows {
        let c_row = &mut c[i * ldc + cols.start..i * ldc + cols.end];
        let t_row = &tmp[i * ld_tmp..][..c_row.len()];
        for (dst, &t) in c_row.iter_mut().zip(t_row) {
            *dst = if beta == 0.0 { t } else { beta.mul_add(*dst, t) };
        }
    }
}

fn out_of_bounds(tile: &Tile, reason: String) -> GemmError {
    GemmError::TileOutOfBounds {
        row: tile.row,
        rows: tile.rows,
        reason,
    }
}
