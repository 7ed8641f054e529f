//! Basic matrix operations and the naive baseline.
//!
//! These provide correctness baselines and utility functions used by
//! the packed kernels and their tests.

pub mod naive;
pub mod transpose;

/// Whether an operand is consumed as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transpose {
    #[default]
    NoTrans,
    Trans,
}
