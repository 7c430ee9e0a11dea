#![allow(dead_code)]

use account_ledger::{
    config::SystemConfiguration,
    ledger::{AccountType, Role, User},
    AccountRegistry, FlatFileStorage,
};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tempfile::TempDir;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Storage rooted in a fresh temp dir; keep the guard alive for the test.
pub fn setup_storage() -> (FlatFileStorage, TempDir) {
    let temp = TempDir::new().expect("create temp dir");
    let storage = FlatFileStorage::new(Some(temp.path().to_path_buf()), Some(3))
        .expect("create flat file storage");
    (storage, temp)
}

/// Two users with a mix of account types and some history.
pub fn sample_registry(config: &SystemConfiguration) -> AccountRegistry {
    let mut registry = AccountRegistry::new();

    let mut alice = User::new("1", "alice", "a1b2c3", "alice@example.com");
    alice
        .open_account(AccountType::Savings, config, dec!(1200), day(2025, 1, 2))
        .expect("open savings");
    alice
        .open_account(AccountType::Checking, config, dec!(100), day(2025, 1, 2))
        .expect("open checking");
    alice
        .account_mut("SA-1-1")
        .expect("savings")
        .withdraw_on(dec!(50.25), day(2025, 1, 10))
        .expect("withdraw");
    alice
        .account_mut("CA-1-2")
        .expect("checking")
        .withdraw_on(dec!(300), day(2025, 1, 11))
        .expect("overdraw");

    let mut root = User::with_role("2", "root", "ffee", "root@example.com", Role::SuperAdmin);
    root.open_account(AccountType::Checking, config, dec!(5000), day(2025, 1, 3))
        .expect("open checking");

    registry.add_user(alice).expect("add alice");
    registry.add_user(root).expect("add root");
    registry
}
