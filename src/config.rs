//! Runtime configuration
//!
//! Loaded from an optional JSON file; every field falls back to its default
//! when absent.

use crate::authority::{ExpiryLimits, DEFAULT_EXPIRY_HOURS, MAX_EXPIRY_HOURS};
use crate::storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Upper bound on `max_expiry_hours`, ten years
pub const EXPIRY_HOURS_CEILING: i64 = 24 * 365 * 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Lifetime of a proposal when none is requested
    pub default_expiry_hours: i64,
    /// Longest lifetime a proposal may request
    pub max_expiry_hours: i64,
    /// Seconds between expiry sweeps in the API server; 0 disables sweeping
    pub sweep_interval_secs: u64,
    pub api_port: u16,
    pub storage: StorageConfig,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: DEFAULT_EXPIRY_HOURS,
            max_expiry_hours: MAX_EXPIRY_HOURS,
            sweep_interval_secs: 60,
            api_port: 3000,
            storage: StorageConfig::default(),
        }
    }
}

impl AuthorityConfig {
    /// Read a config file, or the defaults when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let data = fs::read_to_string(path)?;
                let config: Self = serde_json::from_str(&data)?;
                log::debug!("Loaded config from {}", path.display());
                config
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=EXPIRY_HOURS_CEILING).contains(&self.max_expiry_hours) {
            return Err(ConfigError::Invalid(format!(
                "max_expiry_hours must be within 1..={}, got {}",
                EXPIRY_HOURS_CEILING, self.max_expiry_hours
            )));
        }
        if self.default_expiry_hours < 1 || self.default_expiry_hours > self.max_expiry_hours {
            return Err(ConfigError::Invalid(format!(
                "default_expiry_hours must be within 1..={}, got {}",
                self.max_expiry_hours, self.default_expiry_hours
            )));
        }
        Ok(())
    }

    pub fn expiry_limits(&self) -> ExpiryLimits {
        ExpiryLimits {
            default_hours: self.default_expiry_hours,
            max_hours: self.max_expiry_hours,
        }
    }
}
