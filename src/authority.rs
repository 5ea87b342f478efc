use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::DelegationError, ledger::AccountId};

/// The one account allowed to mutate the delegation ledger.
///
/// Starts unset. Only the governance path writes it; every mutating ledger
/// operation reads it through [`StakingAuthority::authorize`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakingAuthority {
    staking_id: Option<AccountId>,
}

impl StakingAuthority {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn bound_to(staking_id: impl Into<AccountId>) -> Self {
        Self {
            staking_id: Some(staking_id.into()),
        }
    }

    pub fn staking_id(&self) -> Option<&AccountId> {
        self.staking_id.as_ref()
    }

    /// Last write wins. Returns the replaced binding.
    pub fn bind(&mut self, staking_id: impl Into<AccountId>) -> Option<AccountId> {
        self.staking_id.replace(staking_id.into())
    }

    pub fn authorize(&self, caller: &str) -> Result<(), DelegationError> {
        let expected = self.staking_id.as_ref().ok_or_else(|| {
            warn!(caller, "mutation attempted before a staking contract was bound");
            DelegationError::NoStakingAuthority
        })?;
        if expected != caller {
            warn!(caller, expected = %expected, "rejected caller");
            return Err(DelegationError::InvalidCaller {
                caller: caller.to_owned(),
                expected: expected.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_binding_rejects_everyone() {
        let authority = StakingAuthority::unset();
        assert_eq!(
            authority.authorize("staking.near"),
            Err(DelegationError::NoStakingAuthority)
        );
    }

    #[test]
    fn bound_binding_checks_caller() {
        let authority = StakingAuthority::bound_to("staking.near");
        authority.authorize("staking.near").unwrap();
        assert_eq!(
            authority.authorize("mallory.near"),
            Err(DelegationError::InvalidCaller {
                caller: "mallory.near".into(),
                expected: "staking.near".into(),
            })
        );
    }

    #[test]
    fn rebinding_overwrites() {
        let mut authority = StakingAuthority::unset();
        assert_eq!(authority.bind("old.near"), None);
        assert_eq!(authority.bind("new.near").as_deref(), Some("old.near"));
        assert!(authority.authorize("old.near").is_err());
        authority.authorize("new.near").unwrap();
    }
}
