use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::DelegationConfig,
    contract::{DelegationContract, Registration},
    error::DelegationError,
    governance::{ApprovedProposal, GovernanceHook},
    ledger::{Amount, DelegateOutcome, LedgerSnapshot, UndelegateOutcome},
};

/// Cloneable handle for hosts that call into the ledger from several threads.
///
/// Each mutation runs entirely under the write lock, so the supply invariant
/// is never observable mid-update.
#[derive(Clone, Debug, Default)]
pub struct SharedDelegationContract {
    inner: Arc<RwLock<DelegationContract>>,
}

impl SharedDelegationContract {
    pub fn new(config: DelegationConfig) -> Self {
        Self::from_contract(DelegationContract::new(config))
    }

    pub fn from_contract(contract: DelegationContract) -> Self {
        Self {
            inner: Arc::new(RwLock::new(contract)),
        }
    }

    pub fn apply_proposal(&self, proposal: &ApprovedProposal) {
        self.inner.write().on_proposal_approved(proposal);
    }

    pub fn register(
        &self,
        caller: &str,
        account_id: &str,
        attached_deposit: Amount,
    ) -> Result<Registration, DelegationError> {
        self.inner.write().register(caller, account_id, attached_deposit)
    }

    pub fn delegate(
        &self,
        caller: &str,
        account_id: &str,
        amount: Amount,
    ) -> Result<DelegateOutcome, DelegationError> {
        self.inner.write().delegate(caller, account_id, amount)
    }

    pub fn undelegate(
        &self,
        caller: &str,
        account_id: &str,
        amount: Amount,
    ) -> Result<UndelegateOutcome, DelegationError> {
        self.inner.write().undelegate(caller, account_id, amount)
    }

    pub fn balance_of(&self, account_id: &str) -> Amount {
        self.inner.read().balance_of(account_id)
    }

    pub fn total_supply(&self) -> Amount {
        self.inner.read().total_supply()
    }

    pub fn balance_ratio(&self, account_id: &str) -> (Amount, Amount) {
        self.inner.read().balance_ratio(account_id)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().snapshot()
    }
}
