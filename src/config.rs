//! Query configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Validators requested per page when fetching a validator set
pub const DEFAULT_VALIDATORS_PER_PAGE: usize = 10_000;

/// Query configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Block height to query at; `0` means the latest height
    pub height: i64,

    /// Page size for validator set queries
    pub validators_per_page: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            height: 0,
            validators_per_page: DEFAULT_VALIDATORS_PER_PAGE,
        }
    }
}

impl QueryConfig {
    /// Configuration pinned to a block height
    pub fn at_height(height: i64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.height < 0 {
            return Err(Error::InvalidConfig(format!(
                "height must not be negative, got {}",
                self.height
            )));
        }

        if self.validators_per_page == 0 {
            return Err(Error::InvalidConfig(
                "validators_per_page must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
