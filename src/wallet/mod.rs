//! Account, balance and stake ledger collaborators

pub mod account;
pub mod balance;
pub mod ledger;

pub use account::{AccountGuard, IdentityProvider};
pub use balance::{BalanceCheck, BalanceGate};
pub use ledger::{
    ConsumedStake, Ledger, LedgerEntry, PendingDebit, StakeLedgerClient, TransactionKind,
    TransactionMetadata,
};
