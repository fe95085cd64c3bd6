//! Pool configuration types

use rpcpool_core::{Result, RpcError};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls how many connections are opened eagerly and how many idle
/// connections the pool keeps at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPoolConfig")]
pub struct PoolConfig {
    /// Number of connections created when the pool is constructed
    initial_size: usize,
    /// Maximum number of idle connections kept by the pool
    max_size: usize,
}

/// Unvalidated shape of [`PoolConfig`] as it appears in config files
///
/// Signed so that a negative size is reported as a configuration error
/// rather than a type mismatch.
#[derive(Deserialize)]
struct RawPoolConfig {
    #[serde(default)]
    initial_size: i64,
    #[serde(default = "default_max_size")]
    max_size: i64,
}

fn default_max_size() -> i64 {
    DEFAULT_MAX_SIZE as i64
}

const DEFAULT_MAX_SIZE: usize = 10;

impl TryFrom<RawPoolConfig> for PoolConfig {
    type Error = RpcError;

    fn try_from(raw: RawPoolConfig) -> Result<Self> {
        if raw.initial_size < 0 {
            return Err(RpcError::Configuration(format!(
                "invalid capacity settings: initial_size ({}) cannot be negative",
                raw.initial_size
            )));
        }
        if raw.max_size <= 0 {
            return Err(RpcError::Configuration(format!(
                "invalid capacity settings: max_size must be greater than 0, got {}",
                raw.max_size
            )));
        }
        Self::new(raw.initial_size as usize, raw.max_size as usize)
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given initial and max sizes
    ///
    /// Fails if `max_size` is 0 or `initial_size > max_size`.
    pub fn new(initial_size: usize, max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(RpcError::Configuration(
                "invalid capacity settings: max_size must be greater than 0, got 0".into(),
            ));
        }
        if initial_size > max_size {
            return Err(RpcError::Configuration(format!(
                "invalid capacity settings: initial_size ({}) cannot exceed max_size ({})",
                initial_size, max_size
            )));
        }

        Ok(Self {
            initial_size,
            max_size,
        })
    }

    /// Parse a configuration from a TOML document
    ///
    /// Both keys are optional and fall back to the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawPoolConfig = toml::from_str(source)
            .map_err(|e| RpcError::Configuration(e.message().to_string()))?;
        Self::try_from(raw)
    }

    /// Get the number of connections opened at construction
    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    /// Get the maximum number of idle connections
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - initial_size: 0
    /// - max_size: 10
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}
