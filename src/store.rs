use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{ConfigError, DelegationConfig},
    contract::DelegationContract,
    error::DelegationError,
    ledger::LedgerSnapshot,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed state file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config in state file: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] DelegationError),
}

/// On-disk form: the fee parameters plus the ledger snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredState {
    pub config: DelegationConfig,
    pub ledger: LedgerSnapshot,
}

impl StoredState {
    pub fn capture(contract: &DelegationContract) -> Self {
        Self {
            config: contract.config().clone(),
            ledger: contract.snapshot(),
        }
    }

    /// Validates the fee parameters before restoring, so a hand-edited file
    /// cannot make registration free or unpayable.
    pub fn into_contract(self) -> Result<DelegationContract, StoreError> {
        self.config.validate()?;
        Ok(DelegationContract::restore(self.config, self.ledger)?)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes the state next to `path` and renames it into place, so a reader
/// never sees a half-written file.
pub fn save(path: &Path, state: &StoredState) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let bytes = serde_json::to_vec_pretty(state)?;
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(&bytes).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<StoredState, StoreError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Loads and restores in one step, running the snapshot invariant checks.
pub fn load_contract(path: &Path) -> Result<DelegationContract, StoreError> {
    load(path)?.into_contract()
}

pub fn save_contract(path: &Path, contract: &DelegationContract) -> Result<(), StoreError> {
    save(path, &StoredState::capture(contract))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_restores_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let config = DelegationConfig {
            registration_storage_bytes: 16,
            storage_byte_cost: 1,
        };
        let mut contract = DelegationContract::new(config.clone());
        contract.set_staking_authority("staking");
        contract.register("staking", "alice", 16).unwrap();
        contract.delegate("staking", "alice", 1_000_000_000_000_000_000_000_000).unwrap();

        save_contract(&path, &contract).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let state = load(&path).unwrap();
        assert_eq!(state.config, config);
        let restored = state.into_contract().unwrap();
        assert_eq!(restored.balance_of("alice"), 1_000_000_000_000_000_000_000_000);
        assert_eq!(restored.snapshot().state_root, contract.snapshot().state_root);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn tampered_state_is_refused_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut contract = DelegationContract::new(DelegationConfig::default());
        contract.set_staking_authority("staking");
        let mut state = StoredState::capture(&contract);
        state.ledger.staking_authority = Some("mallory".into());
        save(&path, &state).unwrap();

        let err = load_contract(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(DelegationError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn zero_storage_bytes_in_state_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut contract = DelegationContract::new(DelegationConfig::default());
        contract.set_staking_authority("staking");
        save_contract(&path, &contract).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let edited = json.replace(
            "\"registration_storage_bytes\": 16",
            "\"registration_storage_bytes\": 0",
        );
        assert_ne!(json, edited);
        std::fs::write(&path, edited).unwrap();

        let err = load_contract(&path).unwrap_err();
        assert!(matches!(err, StoreError::Config(ConfigError::ZeroStorageBytes)));
    }

    #[test]
    fn overflowing_cost_in_state_file_is_refused() {
        let mut contract = DelegationContract::new(DelegationConfig::default());
        contract.set_staking_authority("staking");
        let mut state = StoredState::capture(&contract);
        state.config.storage_byte_cost = u128::MAX;

        let err = state.into_contract().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::CostOverflow { bytes: 16, .. })
        ));
    }
}
