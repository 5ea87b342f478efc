//! Delegation accounting for a DAO's staking contract.
//!
//! The crate tracks how much weight each account has delegated through an
//! external staking contract:
//!
//! * [`authority`]: the governance-set identity of the only caller allowed to
//!   mutate the ledger.
//! * [`ledger`]: per-account balances, the running total supply, an event log
//!   and hashed snapshots.
//! * [`contract`]: the registration gate plus `delegate`/`undelegate`, with
//!   the caller passed explicitly into each call.
//! * [`shared`]: a lock-guarded handle for multi-threaded hosts.
//! * [`store`]: JSON persistence of snapshots.
//!
//! Proposal and voting logic stays outside; it hands finished decisions to
//! [`governance::GovernanceHook`].

pub mod authority;
pub mod config;
pub mod contract;
pub mod governance;
pub mod ledger;
pub mod shared;
pub mod store;

mod error;

pub use config::DelegationConfig;
pub use contract::{DelegationContract, Registration};
pub use error::DelegationError;
pub use ledger::{AccountId, Amount, DelegateOutcome, UndelegateOutcome};
pub use shared::SharedDelegationContract;
