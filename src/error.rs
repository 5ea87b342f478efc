use thiserror::Error;

use crate::ledger::{AccountId, Amount};

/// Every way a delegation ledger operation can be refused.
///
/// A returned error always means the ledger is exactly as it was before the
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// Governance has not bound a staking contract yet.
    #[error("no staking contract has been bound by governance")]
    NoStakingAuthority,

    /// The caller is not the bound staking contract.
    #[error("caller {caller} is not the staking contract {expected}")]
    InvalidCaller { caller: AccountId, expected: AccountId },

    /// The account never went through registration.
    #[error("account {account} is not registered for delegation")]
    NotRegistered { account: AccountId },

    /// Undelegation asked for more than the account holds.
    #[error("account {account} holds {available}, cannot undelegate {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    /// The registration deposit was not exactly the storage cost.
    #[error("registration requires a deposit of exactly {required}, got {attached}")]
    DepositMismatch { required: Amount, attached: Amount },

    #[error("delegated balance of {account} would overflow")]
    BalanceOverflow { account: AccountId },

    #[error("delegation total supply would overflow")]
    TotalSupplyOverflow,

    #[error("locked registration deposit would overflow")]
    DepositOverflow,

    /// A restored snapshot does not satisfy the ledger invariants.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl DelegationError {
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            DelegationError::NoStakingAuthority | DelegationError::InvalidCaller { .. }
        )
    }
}
