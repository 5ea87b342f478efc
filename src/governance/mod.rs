//! Surface shared with the proposal/voting layer.
//!
//! Proposals and votes live elsewhere. What reaches the delegation core is an
//! [`ApprovedProposal`]: a configuration change that already passed.

use serde::{Deserialize, Serialize};

use crate::ledger::AccountId;

pub type ProposalId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigChange {
    SetStakingContract { staking_id: AccountId },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovedProposal {
    pub id: ProposalId,
    pub change: ConfigChange,
}

impl ApprovedProposal {
    pub fn set_staking_contract(id: ProposalId, staking_id: impl Into<AccountId>) -> Self {
        Self {
            id,
            change: ConfigChange::SetStakingContract {
                staking_id: staking_id.into(),
            },
        }
    }
}

/// Implemented by state that reacts to passed proposals.
pub trait GovernanceHook {
    fn on_proposal_approved(&mut self, proposal: &ApprovedProposal);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_serializes_with_tag() {
        let proposal = ApprovedProposal::set_staking_contract(3, "staking.near");
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["change"]["type"], "set_staking_contract");
        assert_eq!(json["change"]["staking_id"], "staking.near");
    }
}
