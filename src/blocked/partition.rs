//! Row-dimension partitioning into micro-kernel tiles.

use crate::error::{GemmError, Result};
use crate::kernels::KernelTable;

/// One kernel call along M: `kernel_rows` is the table index used, `rows`
/// how many of its rows are real.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStep {
    pub kernel_rows: usize,
    pub rows: usize,
}

impl TileStep {
    /// A masked step runs a kernel taller than the rows it covers.
    pub fn is_masked(&self) -> bool {
        self.rows < self.kernel_rows
    }
}

/// A [`TileStep`] placed at its first output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub row: usize,
    pub rows: usize,
    pub kernel_rows: usize,
}

impl Tile {
    pub fn is_masked(&self) -> bool {
        self.rows < self.kernel_rows
    }

    /// One past the last output row.
    pub fn end(&self) -> usize {
        self.row + self.rows
    }
}

/// Greedy largest-kernel-first partition policy.
///
/// `max_rows` caps the kernels considered, so two families sharing kernel
/// bodies can still be tuned to different tile heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    max_rows: usize,
}

impl Partitioner {
    pub const fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Split `m` rows into kernel calls.
    ///
    /// Repeatedly takes the largest available kernel that fits the remaining
    /// rows. A remainder smaller than every available kernel becomes one
    /// masked step on the smallest kernel. The `rows` of the result always
    /// sum to `m`.
    pub fn partition(&self, table: &KernelTable, m: usize) -> Result<Vec<TileStep>> {
        let mut sizes: Vec<usize> = table.available().filter(|&r| r <= self.max_rows).collect();
        if sizes.is_empty() {
            sizes = table.available().collect();
        }
        let Some(&smallest) = sizes.first() else {
            return Err(GemmError::KernelIndex {
                level: table.level(),
                rows: m,
                max: table.max_rows(),
            });
        };
        let largest = sizes.last().copied().unwrap_or(smallest);

        let mut steps = Vec::with_capacity(m / largest + sizes.len());
        let mut remaining = m;
        while remaining > 0 {
            match sizes.iter().rev().find(|&&s| s <= remaining) {
                Some(&s) => {
                    let count = remaining / s;
                    steps.extend(std::iter::repeat_n(
                        TileStep {
                            kernel_rows: s,
                            rows: s,
                        },
                        count,
                    ));
                    remaining -= count * s;
                }
                None => {
                    steps.push(TileStep {
                        kernel_rows: smallest,
                        rows: remaining,
                    });
                    remaining = 0;
                }
            }
        }
        Ok(steps)
    }
}

/// Lay steps out along M, starting at row 0.
pub fn tiles(steps: &[TileStep]) -> Vec<Tile> {
    let mut row = 0;
    steps
        .iter()
        .map(|step| {
            let tile = Tile {
                row,
                rows: step.rows,
                kernel_rows: step.kernel_rows,
            };
            row += step.rows;
            tile
        })
        .collect()
}
