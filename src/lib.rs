#![doc(test(attr(deny(warnings))))]

//! Account Ledger keeps users, their savings and checking accounts, and each
//! account's transaction history, and round-trips all of it through
//! delimiter-separated flat files.

pub mod config;
pub mod core;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

pub use crate::config::SystemConfiguration;
pub use crate::core::{services, AccountRegistry};
pub use crate::errors::{AccountError, LedgerError, RegistryError};
pub use crate::storage::{FlatFileStorage, LoadReport, StorageBackend};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Account Ledger tracing initialized.");
    });
}
