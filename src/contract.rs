use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    authority::StakingAuthority,
    config::DelegationConfig,
    error::DelegationError,
    governance::{ApprovedProposal, ConfigChange, GovernanceHook},
    ledger::{
        AccountId, Amount, DelegateOutcome, DelegationLedger, LedgerSnapshot, UndelegateOutcome,
    },
};

/// Outcome of a successful `register` call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub account_id: AccountId,
    /// `false` when the entry already existed.
    pub newly_registered: bool,
    /// Part of the attached deposit handed back to the caller.
    pub refund: Amount,
}

/// Delegation accounting as seen by the staking contract.
///
/// `caller` is the identity of whoever invoked the operation; the host
/// environment is responsible for deriving it.
#[derive(Clone, Debug, Default)]
pub struct DelegationContract {
    config: DelegationConfig,
    authority: StakingAuthority,
    ledger: DelegationLedger,
}

impl DelegationContract {
    pub fn new(config: DelegationConfig) -> Self {
        Self {
            config,
            authority: StakingAuthority::unset(),
            ledger: DelegationLedger::new(),
        }
    }

    /// Rebuilds a contract from a snapshot. `config` is taken as given; use
    /// `store::StoredState::into_contract` for parameters read from disk.
    pub fn restore(
        config: DelegationConfig,
        snapshot: LedgerSnapshot,
    ) -> Result<Self, DelegationError> {
        let (ledger, staking_id) = DelegationLedger::from_snapshot(snapshot)?;
        let authority = match staking_id {
            Some(id) => StakingAuthority::bound_to(id),
            None => StakingAuthority::unset(),
        };
        Ok(Self {
            config,
            authority,
            ledger,
        })
    }

    pub fn config(&self) -> &DelegationConfig {
        &self.config
    }

    pub fn ledger(&self) -> &DelegationLedger {
        &self.ledger
    }

    pub fn staking_authority(&self) -> Option<&AccountId> {
        self.authority.staking_id()
    }

    pub fn registration_cost(&self) -> Amount {
        self.config.registration_cost()
    }

    /// Governance-facing setter. Callers must already have passed the
    /// governance layer's own approval.
    pub fn set_staking_authority(&mut self, staking_id: &str) {
        let previous = self.authority.bind(staking_id);
        info!(staking_id, previous = ?previous, "staking contract bound");
        self.ledger.record_authority(previous, staking_id);
    }

    pub fn register(
        &mut self,
        caller: &str,
        account_id: &str,
        attached_deposit: Amount,
    ) -> Result<Registration, DelegationError> {
        self.authority.authorize(caller)?;
        let required = self.registration_cost();
        if attached_deposit != required {
            debug!(account_id, required, attached_deposit, "registration deposit mismatch");
            return Err(DelegationError::DepositMismatch {
                required,
                attached: attached_deposit,
            });
        }
        let newly_registered = self.ledger.insert_entry(account_id, required)?;
        if newly_registered {
            info!(account_id, deposit = required, "account registered for delegation");
        } else {
            debug!(account_id, "account already registered, refunding deposit");
        }
        Ok(Registration {
            account_id: account_id.to_owned(),
            newly_registered,
            refund: if newly_registered { 0 } else { attached_deposit },
        })
    }

    pub fn delegate(
        &mut self,
        caller: &str,
        account_id: &str,
        amount: Amount,
    ) -> Result<DelegateOutcome, DelegationError> {
        self.authority.authorize(caller)?;
        let outcome = self.ledger.credit(account_id, amount)?;
        debug!(
            account_id,
            amount,
            previous = outcome.previous_balance,
            total_supply = outcome.total_supply,
            "delegated"
        );
        Ok(outcome)
    }

    pub fn undelegate(
        &mut self,
        caller: &str,
        account_id: &str,
        amount: Amount,
    ) -> Result<UndelegateOutcome, DelegationError> {
        self.authority.authorize(caller)?;
        let outcome = self.ledger.debit(account_id, amount)?;
        debug!(
            account_id,
            amount,
            previous = outcome.previous_balance,
            balance = outcome.new_balance,
            "undelegated"
        );
        Ok(outcome)
    }

    pub fn balance_of(&self, account_id: &str) -> Amount {
        self.ledger.balance_of(account_id)
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    /// `(balance, total_supply)` read together.
    pub fn balance_ratio(&self, account_id: &str) -> (Amount, Amount) {
        (self.ledger.balance_of(account_id), self.ledger.total_supply())
    }

    pub fn is_registered(&self, account_id: &str) -> bool {
        self.ledger.is_registered(account_id)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot(self.authority.staking_id())
    }
}

impl GovernanceHook for DelegationContract {
    fn on_proposal_approved(&mut self, proposal: &ApprovedProposal) {
        match &proposal.change {
            ConfigChange::SetStakingContract { staking_id } => {
                debug!(proposal = proposal.id, "applying approved staking change");
                self.set_staking_authority(staking_id);
            }
        }
    }
}
