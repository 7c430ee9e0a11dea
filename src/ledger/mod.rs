//! Ledger domain models: users, accounts, and their transaction histories.

pub mod account;
pub mod log;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountKind, AccountState, AccountType, PeriodicOutcome};
pub use log::TransactionLog;
pub use transaction::{format_date, parse_date, today, Transaction, TransactionKind, DATE_FORMAT};
pub use user::{Privilege, Role, User};
