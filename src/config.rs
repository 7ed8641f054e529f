//! Environment-driven dispatch configuration.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `MATMUL_DISPATCH_ISA` | Force a capability level (`AVX2`, `AVX512_YMM`, ...) | detected |
//! | `MATMUL_DISPATCH_BLOCK_ROWS` | K-block height of packed panels | 512 |

use std::sync::OnceLock;

use crate::error::{GemmError, Result};
use crate::isa::CapabilityLevel;

pub const ISA_ENV: &str = "MATMUL_DISPATCH_ISA";
pub const BLOCK_ROWS_ENV: &str = "MATMUL_DISPATCH_BLOCK_ROWS";

/// Rows of B packed into one K-block unless configured otherwise.
pub const DEFAULT_BLOCK_ROWS: usize = 512;

static GLOBAL: OnceLock<Result<DispatchConfig>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Level to use instead of the detected one, if the host supports it.
    pub isa_override: Option<CapabilityLevel>,
    /// K-block height used when packing B.
    pub block_rows: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            isa_override: None,
            block_rows: DEFAULT_BLOCK_ROWS,
        }
    }
}

impl DispatchConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(isa) = value(ISA_ENV) {
            config.isa_override = Some(
                isa.parse()
                    .map_err(|e| GemmError::Environment(format!("{ISA_ENV}: {e}")))?,
            );
        }

        if let Some(rows) = value(BLOCK_ROWS_ENV) {
            config.block_rows = match rows.trim().parse::<usize>() {
                Ok(r) if r > 0 => r,
                _ => {
                    return Err(GemmError::Environment(format!(
                        "{BLOCK_ROWS_ENV}: expected a positive integer, got {rows:?}"
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> Result<&'static DispatchConfig> {
        GLOBAL
            .get_or_init(Self::from_env)
            .as_ref()
            .map_err(Clone::clone)
    }
}
