//! Capability level → kernel family.

use super::KernelFamily;
use crate::error::{GemmError, Result};
use crate::isa::CapabilityLevel;

/// Kernel family compiled for `level`.
///
/// Levels without a family in this build, including `Baseline`, are a
/// configuration error. The reference kernels are never substituted here;
/// callers select them explicitly (see [`crate::blocked::driver::Driver::new`]).
pub fn lookup(level: CapabilityLevel) -> Result<&'static dyn KernelFamily> {
    match level {
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx2 => Ok(&super::avx2::Avx2Family),
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx512Ymm => Ok(&super::avx2::Avx512YmmFamily),
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx512 => Ok(&super::avx512::Avx512Family),
        #[cfg(target_arch = "aarch64")]
        CapabilityLevel::Neon => Ok(&super::neon::NeonFamily),
        other => Err(GemmError::UnsupportedLevel(other)),
    }
}
