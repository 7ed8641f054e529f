//! CPU capability levels and their runtime detection.
//!
//! A [`CapabilityLevel`] classifies the vector instruction sets the host can
//! execute. Levels are totally ordered by feature richness, so a forced level
//! can be compared against the detected one.
//!
//! Available items:
//! - [`detect`]: cached, process-wide capability query
//! - [`host_level`]: raw CPU query, ignoring configuration
//! - [`is_supported`]: whether the host can run a given level

mod detect;

pub use detect::{detect, host_level, is_supported};

use std::fmt;
use std::str::FromStr;

use crate::error::GemmError;
use crate::kernels::KERNEL_NCOL_BLOCKS;

/// Vector instruction-set support, ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityLevel {
    /// No usable vector extension; the reference kernels run.
    Baseline,
    /// aarch64 Advanced SIMD, 128-bit lanes.
    Neon,
    /// AVX2 + FMA, 16 ymm registers.
    Avx2,
    /// AVX-512 register file (32 registers) driven with 256-bit lanes.
    Avx512Ymm,
    /// AVX-512F + FMA with full 512-bit lanes.
    Avx512,
}

impl CapabilityLevel {
    /// Every level, in ascending order.
    pub const ALL: [CapabilityLevel; 5] = [
        CapabilityLevel::Baseline,
        CapabilityLevel::Neon,
        CapabilityLevel::Avx2,
        CapabilityLevel::Avx512Ymm,
        CapabilityLevel::Avx512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CapabilityLevel::Baseline => "BASELINE",
            CapabilityLevel::Neon => "NEON",
            CapabilityLevel::Avx2 => "AVX2",
            CapabilityLevel::Avx512Ymm => "AVX512_YMM",
            CapabilityLevel::Avx512 => "AVX512",
        }
    }

    /// Number of `f32` lanes in one vector register at this level.
    ///
    /// Baseline reports the AVX2 width so that panels packed on machines
    /// without vector support keep the common 16-column block layout.
    pub fn simd_width(self) -> usize {
        match self {
            CapabilityLevel::Neon => 4,
            CapabilityLevel::Baseline | CapabilityLevel::Avx2 | CapabilityLevel::Avx512Ymm => 8,
            CapabilityLevel::Avx512 => 16,
        }
    }

    /// Column-block width of packed B panels for this level.
    pub fn block_width(self) -> usize {
        self.simd_width() * KERNEL_NCOL_BLOCKS
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CapabilityLevel {
    type Err = GemmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASELINE" | "ANYARCH" | "SCALAR" => Ok(CapabilityLevel::Baseline),
            "NEON" => Ok(CapabilityLevel::Neon),
            "AVX2" => Ok(CapabilityLevel::Avx2),
            "AVX512_YMM" | "AVX512_256" => Ok(CapabilityLevel::Avx512Ymm),
            "AVX512" => Ok(CapabilityLevel::Avx512),
            other => Err(GemmError::Environment(format!(
                "unknown instruction set {other:?}"
            ))),
        }
    }
}
