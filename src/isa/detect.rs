//! Runtime CPU feature detection, cached for the process lifetime.

use std::sync::OnceLock;

use super::CapabilityLevel;
use crate::config::DispatchConfig;
use crate::error::Result;

static DETECTED: OnceLock<Result<CapabilityLevel>> = OnceLock::new();

/// Returns the capability level kernels should be dispatched for.
///
/// The CPU is queried exactly once; every later call returns the cached
/// value. If `MATMUL_DISPATCH_ISA` names a level the host supports, that
/// level is used instead. A malformed override is an environment error and
/// is cached like a successful result.
pub fn detect() -> Result<CapabilityLevel> {
    DETECTED
        .get_or_init(|| {
            let config = DispatchConfig::global()?;
            let level = resolve(host_level(), config.isa_override);
            log::debug!("dispatching GEMM kernels for {level}");
            Ok(level)
        })
        .clone()
}

/// Apply a configured override to the detected level.
fn resolve(host: CapabilityLevel, requested: Option<CapabilityLevel>) -> CapabilityLevel {
    match requested {
        None => host,
        Some(level) if is_supported(level) => level,
        Some(level) => {
            log::warn!("requested ISA {level} is not supported by this CPU, using {host}");
            host
        }
    }
}

/// Best level the host CPU supports, without configuration applied.
///
/// `Avx512Ymm` is never reported here; it is selected only on request.
#[cfg(target_arch = "x86_64")]
pub fn host_level() -> CapabilityLevel {
    if is_supported(CapabilityLevel::Avx512) {
        CapabilityLevel::Avx512
    } else if is_supported(CapabilityLevel::Avx2) {
        CapabilityLevel::Avx2
    } else {
        CapabilityLevel::Baseline
    }
}

#[cfg(target_arch = "aarch64")]
pub fn host_level() -> CapabilityLevel {
    if is_supported(CapabilityLevel::Neon) {
        CapabilityLevel::Neon
    } else {
        CapabilityLevel::Baseline
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn host_level() -> CapabilityLevel {
    CapabilityLevel::Baseline
}

/// Whether the host CPU can execute kernels built for `level`.
pub fn is_supported(level: CapabilityLevel) -> bool {
    match level {
        CapabilityLevel::Baseline => true,
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx2 => {
            is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
        }
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx512 => {
            is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("fma")
        }
        // ymm16-31 are only addressable with VL.
        #[cfg(target_arch = "x86_64")]
        CapabilityLevel::Avx512Ymm => {
            is_x86_feature_detected!("avx512f")
                && is_x86_feature_detected!("avx512vl")
                && is_x86_feature_detected!("fma")
        }
        #[cfg(target_arch = "aarch64")]
        CapabilityLevel::Neon => std::arch::is_aarch64_feature_detected!("neon"),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}
