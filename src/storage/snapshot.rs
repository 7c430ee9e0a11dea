use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    config::{SystemConfiguration, MAX_USERS},
    core::{registry::AccountRegistry, utils::write_atomic},
    errors::LedgerError,
    ledger::{Account, AccountType, Transaction, User},
};

use super::Result;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// JSON export of the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub schema_version: u32,
    pub config: SystemConfiguration,
    pub users: Vec<User>,
}

/// JSON export of one account's ordered history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: rust_decimal::Decimal,
    pub transactions: Vec<Transaction>,
}

impl RegistrySnapshot {
    pub fn capture(registry: &AccountRegistry, config: &SystemConfiguration) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            config: config.clone(),
            users: registry.users().to_vec(),
        }
    }

    /// Rebuilds a registry, re-checking uniqueness and capacity.
    pub fn into_registry(self) -> Result<(AccountRegistry, SystemConfiguration)> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(LedgerError::Persistence(format!(
                "snapshot schema {} is newer than supported {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            )));
        }
        let mut registry = AccountRegistry::with_capacity(MAX_USERS);
        for user in self.users {
            registry
                .add_user(user)
                .map_err(|err| LedgerError::InvalidRef(err.to_string()))?;
        }
        Ok((registry, self.config))
    }
}

impl HistorySnapshot {
    pub fn capture(account: &Account) -> Self {
        Self {
            account_number: account.number().to_string(),
            account_type: account.account_type(),
            balance: account.balance(),
            transactions: account.transactions().iter().cloned().collect(),
        }
    }
}

pub fn registry_to_json(registry: &AccountRegistry, config: &SystemConfiguration) -> Result<String> {
    Ok(serde_json::to_string_pretty(&RegistrySnapshot::capture(
        registry, config,
    ))?)
}

pub fn history_to_json(account: &Account) -> Result<String> {
    Ok(serde_json::to_string_pretty(&HistorySnapshot::capture(account))?)
}

pub fn export_registry(
    path: &Path,
    registry: &AccountRegistry,
    config: &SystemConfiguration,
) -> Result<()> {
    let json = registry_to_json(registry, config)?;
    write_atomic(path, &json)?;
    Ok(())
}

pub fn import_registry(path: &Path) -> Result<(AccountRegistry, SystemConfiguration)> {
    let data = fs::read_to_string(path)?;
    let snapshot: RegistrySnapshot = serde_json::from_str(&data)?;
    snapshot.into_registry()
}
