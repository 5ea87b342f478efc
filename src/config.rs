use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Amount;

/// Bytes one delegation entry occupies in contract storage.
pub const DEFAULT_REGISTRATION_STORAGE_BYTES: u64 = 16;

/// Cost of one byte of storage in the smallest deposit unit (1e19 on a
/// 1e24-per-token scale).
pub const DEFAULT_STORAGE_BYTE_COST: Amount = 10_000_000_000_000_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("registration_storage_bytes must be > 0")]
    ZeroStorageBytes,
    #[error("registration cost {bytes} * {byte_cost} overflows")]
    CostOverflow { bytes: u64, byte_cost: Amount },
}

/// Parameters supplied by the storage-fee model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DelegationConfig {
    pub registration_storage_bytes: u64,
    pub storage_byte_cost: Amount,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            registration_storage_bytes: DEFAULT_REGISTRATION_STORAGE_BYTES,
            storage_byte_cost: DEFAULT_STORAGE_BYTE_COST,
        }
    }
}

impl DelegationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registration_storage_bytes == 0 {
            return Err(ConfigError::ZeroStorageBytes);
        }
        self.checked_registration_cost().map(|_| ())
    }

    fn checked_registration_cost(&self) -> Result<Amount, ConfigError> {
        Amount::from(self.registration_storage_bytes)
            .checked_mul(self.storage_byte_cost)
            .ok_or(ConfigError::CostOverflow {
                bytes: self.registration_storage_bytes,
                byte_cost: self.storage_byte_cost,
            })
    }

    /// Exact deposit `register` accepts. Validated configs never saturate here.
    pub fn registration_cost(&self) -> Amount {
        Amount::from(self.registration_storage_bytes).saturating_mul(self.storage_byte_cost)
    }
}
