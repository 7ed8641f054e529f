//! Packing of the reused right-hand operand into kernel panels.
//!
//! Layout of a packed K×N matrix with K-block height `br` and column-block
//! width `bw` (`nb = ceil(N / bw)` column blocks):
//!
//! ```text
//! K-block 0 (rows 0..br)          K-block 1 (rows br..2br)      ...
//! ┌────────┬────────┬─────┐       ┌────────┬────────┬─────┐
//! │ jb = 0 │ jb = 1 │ ... │       │ jb = 0 │ jb = 1 │ ... │
//! │ br×bw  │ br×bw  │     │       │ br×bw  │ br×bw  │     │
//! └────────┴────────┴─────┘       └────────┴────────┴─────┘
//! ```
//!
//! Each column block is row-major, so for a fixed k the `bw` columns a
//! kernel consumes are contiguous and a K-block is streamed front to back.
//! The last K-block may be shorter than `br`. Columns past N are zero.

use crate::config::DispatchConfig;
use crate::error::{GemmError, Result};
use crate::isa::CapabilityLevel;
use crate::matrix::Transpose;

/// How B is read while packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackOptions {
    /// `Trans` reads B from an N×K row-major buffer.
    pub trans: Transpose,
    /// Folded into every packed value.
    pub alpha: f32,
    /// K-block height; the configured default when `None`.
    pub block_rows: Option<usize>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            trans: Transpose::NoTrans,
            alpha: 1.0,
            block_rows: None,
        }
    }
}

impl PackOptions {
    pub fn trans(mut self, trans: Transpose) -> Self {
        self.trans = trans;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = Some(block_rows);
        self
    }
}

/// A K×N operand packed for the kernels of one capability level.
///
/// Owned by the caller; pack once and pass to as many GEMM calls as reuse B.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedMatrix {
    level: CapabilityLevel,
    k: usize,
    n: usize,
    block_rows: usize,
    block_width: usize,
    alpha: f32,
    data: Vec<f32>,
}

impl PackedMatrix {
    /// Pack row-major K×N `b` (row stride `ldb`) for `level`.
    pub fn pack(level: CapabilityLevel, b: &[f32], k: usize, n: usize, ldb: usize) -> Result<Self> {
        Self::pack_with(level, b, k, n, ldb, PackOptions::default())
    }

    pub fn pack_with(
        level: CapabilityLevel,
        b: &[f32],
        k: usize,
        n: usize,
        ldb: usize,
        options: PackOptions,
    ) -> Result<Self> {
        let block_rows = match options.block_rows {
            Some(rows) => rows,
            None => DispatchConfig::global()?.block_rows,
        };
        if block_rows == 0 {
            return Err(GemmError::DimensionMismatch(
                "K-block height must be positive".to_string(),
            ));
        }

        let (stored_rows, stored_cols) = match options.trans {
            Transpose::NoTrans => (k, n),
            Transpose::Trans => (n, k),
        };
        check_source(b, stored_rows, stored_cols, ldb)?;

        let block_width = level.block_width();
        let nb = n.div_ceil(block_width);
        let mut data = vec![0.0; k * nb * block_width];
        let alpha = options.alpha;

        for k0 in (0..k).step_by(block_rows) {
            let kb = block_rows.min(k - k0);
            let k_block = &mut data[k0 * nb * block_width..(k0 + kb) * nb * block_width];

            for (jb, col_block) in k_block.chunks_exact_mut(kb * block_width).enumerate() {
                let j0 = jb * block_width;
                let width = block_width.min(n - j0);

                for (p, dst_row) in col_block.chunks_exact_mut(block_width).enumerate() {
                    let dst = &mut dst_row[..width];
                    match options.trans {
                        Transpose::NoTrans => {
                            let src = &b[(k0 + p) * ldb + j0..][..width];
                            for (d, &s) in dst.iter_mut().zip(src) {
                                *d = alpha * s;
                            }
                        }
                        Transpose::Trans => {
                            for (j, d) in dst.iter_mut().enumerate() {
                                *d = alpha * b[(j0 + j) * ldb + k0 + p];
                            }
                        }
                    }
                }
            }
        }

        log::trace!("packed {k}x{n} operand for {level}: {nb} column blocks of {block_width}");

        Ok(Self {
            level,
            k,
            n,
            block_rows,
            block_width,
            alpha,
            data,
        })
    }

    /// Level whose kernels this panel layout targets.
    pub fn level(&self) -> CapabilityLevel {
        self.level
    }

    /// K.
    pub fn num_rows(&self) -> usize {
        self.k
    }

    /// N.
    pub fn num_cols(&self) -> usize {
        self.n
    }

    pub fn block_row_size(&self) -> usize {
        self.block_rows
    }

    pub fn block_col_size(&self) -> usize {
        self.block_width
    }

    pub fn num_block_rows(&self) -> usize {
        self.k.div_ceil(self.block_rows)
    }

    /// Column blocks, including a zero-padded final one.
    pub fn num_block_cols(&self) -> usize {
        self.n.div_ceil(self.block_width)
    }

    /// Height of the final K-block.
    pub fn last_block_rows(&self) -> usize {
        match self.k % self.block_rows {
            0 if self.k > 0 => self.block_rows,
            rem => rem,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Raw packed storage, padding included.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Packed rows `k0 .. k0 + kb` for every column block; `k0` must be a
    /// multiple of the block height.
    pub(crate) fn k_block(&self, k0: usize) -> &[f32] {
        let kb = self.block_rows.min(self.k - k0);
        let stride = self.num_block_cols() * self.block_width;
        &self.data[k0 * stride..(k0 + kb) * stride]
    }

    fn index(&self, row: usize, col: usize) -> usize {
        let k0 = row - row % self.block_rows;
        let kb = self.block_rows.min(self.k - k0);
        let stride = self.num_block_cols() * self.block_width;
        k0 * stride
            + (col / self.block_width) * kb * self.block_width
            + (row - k0) * self.block_width
            + col % self.block_width
    }

    /// Packed value at `(row, col)`; columns up to the padded width read
    /// back as zero past N.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.k || col >= self.num_block_cols() * self.block_width {
            return None;
        }
        Some(self.data[self.index(row, col)])
    }

    /// Rebuild the dense row-major K×N matrix (alpha stays folded in).
    pub fn unpack(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.k * self.n);
        for row in 0..self.k {
            out.extend((0..self.n).map(|col| self.data[self.index(row, col)]));
        }
        out
    }
}

/// Check that a row-major `rows × cols` source with stride `ld` fits in `src`.
pub(crate) fn check_source(src: &[f32], rows: usize, cols: usize, ld: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Ok(());
    }
    if ld < cols {
        return Err(GemmError::DimensionMismatch(format!(
            "leading dimension {ld} is smaller than {cols} columns"
        )));
    }
    let needed = (rows - 1) * ld + cols;
    if src.len() < needed {
        return Err(GemmError::DimensionMismatch(format!(
            "{rows}x{cols} matrix with leading dimension {ld} needs {needed} elements, got {}",
            src.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::transpose::transpose;

    fn options(block_rows: usize) -> PackOptions {
        PackOptions::default().block_rows(block_rows)
    }

    #[test]
    fn test_layout_single_block() {
        // K=2, N=3, bw=16: one padded column block.
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let packed =
            PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, 2, 3, 3, options(512)).unwrap();

        assert_eq!(packed.as_slice().len(), 2 * 16);
        assert_eq!(&packed.as_slice()[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&packed.as_slice()[16..19], &[4.0, 5.0, 6.0]);
        assert!(packed.as_slice()[3..16].iter().all(|&v| v == 0.0));
        assert_eq!(packed.num_block_cols(), 1);
    }

    #[test]
    fn test_k_blocks_are_contiguous() {
        let (k, n) = (5, 20);
        let b: Vec<f32> = (0..k * n).map(|i| i as f32).collect();
        let packed =
            PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, k, n, n, options(2)).unwrap();

        assert_eq!(packed.num_block_rows(), 3);
        assert_eq!(packed.last_block_rows(), 1);
        assert_eq!(packed.k_block(0).len(), 2 * 2 * 16);
        assert_eq!(packed.k_block(4).len(), 2 * 16);
        // Second column block of the first K-block starts at row 0, col 16.
        assert_eq!(packed.k_block(0)[2 * 16], b[16]);
        assert_eq!(packed.get(3, 17), Some(b[3 * n + 17]));
        assert_eq!(packed.get(3, 25), Some(0.0));
        assert_eq!(packed.get(3, 32), None);
    }

    #[test]
    fn test_unpack_round_trip() {
        let (k, n) = (37, 45);
        let b: Vec<f32> = (0..k * n).map(|i| (i % 23) as f32 - 11.0).collect();
        for level in [CapabilityLevel::Avx2, CapabilityLevel::Avx512, CapabilityLevel::Neon] {
            let packed = PackedMatrix::pack_with(level, &b, k, n, n, options(16)).unwrap();
            assert_eq!(packed.unpack(), b, "{level}");
        }
    }

    #[test]
    fn test_transposed_source_and_alpha() {
        let (k, n) = (4, 3);
        let b: Vec<f32> = (0..k * n).map(|i| i as f32).collect();
        let mut bt = vec![0.0; k * n];
        transpose(&b, &mut bt, k, n);

        let opts = options(512).trans(Transpose::Trans).alpha(2.0);
        let packed = PackedMatrix::pack_with(CapabilityLevel::Avx2, &bt, k, n, k, opts).unwrap();
        let doubled: Vec<f32> = b.iter().map(|v| v * 2.0).collect();
        assert_eq!(packed.unpack(), doubled);
        assert_eq!(packed.alpha(), 2.0);
    }

    #[test]
    fn test_strided_source() {
        // 2×2 matrix embedded in a 2×4 buffer.
        let b = [1.0, 2.0, -1.0, -1.0, 3.0, 4.0, -1.0, -1.0];
        let packed = PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, 2, 2, 4, options(8)).unwrap();
        assert_eq!(packed.unpack(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_rejects_short_buffers() {
        let b = [0.0; 5];
        assert!(matches!(
            PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, 2, 3, 3, options(8)),
            Err(GemmError::DimensionMismatch(_))
        ));
        assert!(matches!(
            PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, 1, 3, 2, options(8)),
            Err(GemmError::DimensionMismatch(_))
        ));
        assert!(matches!(
            PackedMatrix::pack_with(CapabilityLevel::Avx2, &b, 1, 3, 3, options(0)),
            Err(GemmError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_empty_operands() {
        let packed = PackedMatrix::pack_with(CapabilityLevel::Avx2, &[], 0, 7, 7, options(8)).unwrap();
        assert!(packed.as_slice().is_empty());
        assert_eq!(packed.num_block_rows(), 0);
        assert_eq!(packed.last_block_rows(), 0);
        assert!(packed.unpack().is_empty());
    }
}
