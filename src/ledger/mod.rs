use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DelegationError;

pub type AccountId = String;
pub type Amount = u128;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    /// Number of committed state transitions.
    pub height: u64,
}

// Externally tagged: internally tagged enums cannot carry u128 amounts
// through serde_json.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    AuthorityBound {
        previous: Option<AccountId>,
        staking_id: AccountId,
    },
    Registered {
        account: AccountId,
        deposit: Amount,
    },
    Delegated {
        account: AccountId,
        amount: Amount,
        balance: Amount,
        total_supply: Amount,
    },
    Undelegated {
        account: AccountId,
        amount: Amount,
        balance: Amount,
        total_supply: Amount,
    },
}

/// Result of a committed delegation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegateOutcome {
    pub previous_balance: Amount,
    pub amount: Amount,
    pub total_supply: Amount,
}

impl DelegateOutcome {
    pub fn into_parts(self) -> (Amount, Amount, Amount) {
        (self.previous_balance, self.amount, self.total_supply)
    }
}

/// Result of a committed undelegation. Reports the account's own new balance,
/// not the aggregate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UndelegateOutcome {
    pub previous_balance: Amount,
    pub amount: Amount,
    pub new_balance: Amount,
}

impl UndelegateOutcome {
    pub fn into_parts(self) -> (Amount, Amount, Amount) {
        (self.previous_balance, self.amount, self.new_balance)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub staking_authority: Option<AccountId>,
    pub entries: BTreeMap<AccountId, Amount>,
    pub total_supply: Amount,
    pub locked_deposit: Amount,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "crate::ledger::serde_hex32")]
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }
}

/// Account balances plus the running total they must always sum to.
///
/// Every mutating method validates first and writes last, so an `Err` leaves
/// the ledger untouched.
#[derive(Clone, Debug, Default)]
pub struct DelegationLedger {
    meta: SnapshotMetadata,
    entries: BTreeMap<AccountId, Amount>,
    total_supply: Amount,
    locked_deposit: Amount,
    events: Vec<LedgerEvent>,
}

impl DelegationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero for accounts that never registered.
    pub fn balance_of(&self, account: &str) -> Amount {
        self.entries.get(account).copied().unwrap_or_default()
    }

    pub fn is_registered(&self, account: &str) -> bool {
        self.entries.contains_key(account)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn locked_deposit(&self) -> Amount {
        self.locked_deposit
    }

    pub fn height(&self) -> u64 {
        self.meta.height
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, Amount)> + '_ {
        self.entries.iter().map(|(account, balance)| (account, *balance))
    }

    pub fn registered_count(&self) -> usize {
        self.entries.len()
    }

    /// Creates a zero-balance entry. Returns `false` without touching the
    /// existing entry when the account is already registered.
    pub fn insert_entry(
        &mut self,
        account: &str,
        deposit: Amount,
    ) -> Result<bool, DelegationError> {
        if self.entries.contains_key(account) {
            return Ok(false);
        }
        let locked = self
            .locked_deposit
            .checked_add(deposit)
            .ok_or(DelegationError::DepositOverflow)?;
        self.entries.insert(account.to_owned(), 0);
        self.locked_deposit = locked;
        self.commit(LedgerEvent::Registered {
            account: account.to_owned(),
            deposit,
        });
        Ok(true)
    }

    pub fn credit(
        &mut self,
        account: &str,
        amount: Amount,
    ) -> Result<DelegateOutcome, DelegationError> {
        let balance = self
            .entries
            .get_mut(account)
            .ok_or_else(|| DelegationError::NotRegistered {
                account: account.to_owned(),
            })?;
        let previous_balance = *balance;
        let new_balance =
            previous_balance
                .checked_add(amount)
                .ok_or_else(|| DelegationError::BalanceOverflow {
                    account: account.to_owned(),
                })?;
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(DelegationError::TotalSupplyOverflow)?;

        *balance = new_balance;
        self.total_supply = total_supply;
        self.commit(LedgerEvent::Delegated {
            account: account.to_owned(),
            amount,
            balance: new_balance,
            total_supply,
        });
        Ok(DelegateOutcome {
            previous_balance,
            amount,
            total_supply,
        })
    }

    pub fn debit(
        &mut self,
        account: &str,
        amount: Amount,
    ) -> Result<UndelegateOutcome, DelegationError> {
        let balance = self
            .entries
            .get_mut(account)
            .ok_or_else(|| DelegationError::NotRegistered {
                account: account.to_owned(),
            })?;
        let previous_balance = *balance;
        if previous_balance < amount {
            return Err(DelegationError::InsufficientBalance {
                account: account.to_owned(),
                available: previous_balance,
                requested: amount,
            });
        }
        let new_balance = previous_balance - amount;
        // Unreachable while the supply invariant holds; checked so a broken
        // snapshot surfaces instead of wrapping.
        let total_supply = self.total_supply.checked_sub(amount).ok_or_else(|| {
            DelegationError::CorruptSnapshot("total supply below account balance".into())
        })?;

        *balance = new_balance;
        self.total_supply = total_supply;
        self.commit(LedgerEvent::Undelegated {
            account: account.to_owned(),
            amount,
            balance: new_balance,
            total_supply,
        });
        Ok(UndelegateOutcome {
            previous_balance,
            amount,
            new_balance,
        })
    }

    pub fn record_authority(&mut self, previous: Option<AccountId>, staking_id: &str) {
        self.commit(LedgerEvent::AuthorityBound {
            previous,
            staking_id: staking_id.to_owned(),
        });
    }

    fn commit(&mut self, event: LedgerEvent) {
        self.meta.height += 1;
        self.events.push(event);
    }

    pub fn snapshot(&self, staking_authority: Option<&AccountId>) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            staking_authority: staking_authority.cloned(),
            entries: self.entries.clone(),
            total_supply: self.total_supply,
            locked_deposit: self.locked_deposit,
            events: self.events.clone(),
            state_root: compute_state_root(
                self.meta.height,
                &self.entries,
                self.total_supply,
                self.locked_deposit,
                staking_authority,
            ),
        }
    }

    /// Rebuilds a ledger from a snapshot, refusing one whose supply, event
    /// count or root does not recompute.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
    ) -> Result<(Self, Option<AccountId>), DelegationError> {
        if snapshot.meta.height != snapshot.events.len() as u64 {
            return Err(DelegationError::CorruptSnapshot(format!(
                "height {} does not match {} recorded events",
                snapshot.meta.height,
                snapshot.events.len()
            )));
        }
        let mut sum: Amount = 0;
        for balance in snapshot.entries.values() {
            sum = sum.checked_add(*balance).ok_or_else(|| {
                DelegationError::CorruptSnapshot("entry balances overflow".into())
            })?;
        }
        if sum != snapshot.total_supply {
            return Err(DelegationError::CorruptSnapshot(format!(
                "total supply {} does not match entry sum {}",
                snapshot.total_supply, sum
            )));
        }
        let root = compute_state_root(
            snapshot.meta.height,
            &snapshot.entries,
            snapshot.total_supply,
            snapshot.locked_deposit,
            snapshot.staking_authority.as_ref(),
        );
        if root != snapshot.state_root {
            return Err(DelegationError::CorruptSnapshot("state root mismatch".into()));
        }
        let ledger = Self {
            meta: snapshot.meta,
            entries: snapshot.entries,
            total_supply: snapshot.total_supply,
            locked_deposit: snapshot.locked_deposit,
            events: snapshot.events,
        };
        Ok((ledger, snapshot.staking_authority))
    }
}

fn compute_state_root(
    height: u64,
    entries: &BTreeMap<AccountId, Amount>,
    total_supply: Amount,
    locked_deposit: Amount,
    staking_authority: Option<&AccountId>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(entries.len() + 2);
    for (account, balance) in entries {
        let mut hasher = Sha256::new();
        hasher.update(b"entry");
        hasher.update((account.len() as u64).to_le_bytes());
        hasher.update(account.as_bytes());
        hasher.update(balance.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    let mut hasher = Sha256::new();
    hasher.update(b"supply");
    hasher.update(height.to_le_bytes());
    hasher.update(total_supply.to_le_bytes());
    hasher.update(locked_deposit.to_le_bytes());
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"authority");
    if let Some(staking_id) = staking_authority {
        hasher.update(staking_id.as_bytes());
    }
    leaves.push(hasher.finalize().into());
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

pub(crate) mod serde_hex32 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(accounts: &[&str]) -> DelegationLedger {
        let mut ledger = DelegationLedger::new();
        for account in accounts {
            assert!(ledger.insert_entry(account, 16).unwrap());
        }
        ledger
    }

    #[test]
    fn state_root_is_deterministic() {
        let mut ledger = ledger_with(&["alice", "bob"]);
        ledger.credit("alice", 1_000).unwrap();
        ledger.credit("bob", 2_000).unwrap();
        let authority = "staking".to_string();
        let root1 = ledger.snapshot(Some(&authority)).state_root;
        let root2 = ledger.snapshot(Some(&authority)).state_root;
        assert_eq!(root1, root2);
        assert_ne!(root1, ledger.snapshot(None).state_root);
    }

    #[test]
    fn duplicate_entry_keeps_balance() {
        let mut ledger = ledger_with(&["alice"]);
        ledger.credit("alice", 7).unwrap();
        assert!(!ledger.insert_entry("alice", 16).unwrap());
        assert_eq!(ledger.balance_of("alice"), 7);
        assert_eq!(ledger.locked_deposit(), 16);
        assert_eq!(ledger.height(), 2);
    }

    #[test]
    fn credit_and_debit_track_total_supply() {
        let mut ledger = ledger_with(&["alice", "bob"]);
        let out = ledger.credit("alice", 10).unwrap();
        assert_eq!(out.into_parts(), (0, 10, 10));
        let out = ledger.credit("bob", 20).unwrap();
        assert_eq!(out.into_parts(), (0, 20, 30));
        let out = ledger.debit("bob", 5).unwrap();
        assert_eq!(out.into_parts(), (20, 5, 15));
        assert_eq!(ledger.total_supply(), 25);
        assert_eq!(ledger.events().len(), 5);
    }

    #[test]
    fn failed_operations_leave_no_trace() {
        let mut ledger = ledger_with(&["alice"]);
        ledger.credit("alice", Amount::MAX - 1).unwrap();
        let before = ledger.snapshot(None);

        assert_eq!(
            ledger.credit("alice", 2).unwrap_err(),
            DelegationError::BalanceOverflow {
                account: "alice".into()
            }
        );
        assert!(matches!(
            ledger.debit("alice", Amount::MAX),
            Err(DelegationError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            ledger.credit("carol", 1),
            Err(DelegationError::NotRegistered { .. })
        ));
        assert_eq!(ledger.snapshot(None), before);
    }

    #[test]
    fn total_supply_overflow_is_detected_across_accounts() {
        let mut ledger = ledger_with(&["alice", "bob"]);
        ledger.credit("alice", Amount::MAX).unwrap();
        assert_eq!(
            ledger.credit("bob", 1).unwrap_err(),
            DelegationError::TotalSupplyOverflow
        );
        assert_eq!(ledger.balance_of("bob"), 0);
    }

    #[test]
    fn snapshot_restores_and_rejects_tampering() {
        let mut ledger = ledger_with(&["alice"]);
        ledger.credit("alice", 42).unwrap();
        let authority = "staking".to_string();
        let snapshot = ledger.snapshot(Some(&authority));

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        let (restored, bound) = DelegationLedger::from_snapshot(decoded).unwrap();
        assert_eq!(bound.as_deref(), Some("staking"));
        assert_eq!(restored.balance_of("alice"), 42);
        assert_eq!(restored.height(), ledger.height());

        let mut skewed = snapshot.clone();
        skewed.total_supply = 41;
        assert!(matches!(
            DelegationLedger::from_snapshot(skewed),
            Err(DelegationError::CorruptSnapshot(_))
        ));

        let mut rebalanced = snapshot.clone();
        rebalanced.entries.insert("alice".into(), 41);
        rebalanced.total_supply = 41;
        assert!(matches!(
            DelegationLedger::from_snapshot(rebalanced),
            Err(DelegationError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn snapshot_with_truncated_event_log_is_refused() {
        let mut ledger = ledger_with(&["alice"]);
        ledger.credit("alice", 5).unwrap();
        ledger.debit("alice", 2).unwrap();
        let snapshot = ledger.snapshot(None);

        let mut truncated = snapshot.clone();
        truncated.events.pop();
        assert!(matches!(
            DelegationLedger::from_snapshot(truncated),
            Err(DelegationError::CorruptSnapshot(_))
        ));

        // Rewinding the height along with the log still breaks the root.
        let mut rewound = snapshot;
        rewound.events.pop();
        rewound.meta.height -= 1;
        assert!(matches!(
            DelegationLedger::from_snapshot(rewound),
            Err(DelegationError::CorruptSnapshot(_))
        ));
    }
}
