use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{SystemConfiguration, MAX_ACCOUNTS_PER_USER},
    errors::{AccountError, RegistryError},
};

use super::account::{Account, AccountKind, AccountType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Regular,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    ManageUsers,
    ApplyPeriodicFeatures,
    ManageConfiguration,
    ManageAdmins,
    DeleteAllData,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "REGULAR",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPERADMIN",
        }
    }

    pub fn has_privilege(&self, privilege: Privilege) -> bool {
        match self {
            Role::Regular => false,
            Role::Admin => matches!(privilege, Privilege::ManageUsers),
            Role::SuperAdmin => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "REGULAR" => Ok(Role::Regular),
            "ADMIN" => Ok(Role::Admin),
            "SUPERADMIN" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown user type `{}`", other)),
        }
    }
}

/// A registered user and the accounts they own, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Already-hashed credential; hashing happens before it reaches the ledger.
    pub credential_hash: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    accounts: Vec<Account>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        credential_hash: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self::with_role(id, username, credential_hash, email, Role::Regular)
    }

    pub fn with_role(
        id: impl Into<String>,
        username: impl Into<String>,
        credential_hash: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            credential_hash: credential_hash.into(),
            email: email.into(),
            role,
            accounts: Vec::new(),
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> std::slice::IterMut<'_, Account> {
        self.accounts.iter_mut()
    }

    pub fn account(&self, number: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.number() == number)
    }

    pub fn account_mut(&mut self, number: &str) -> Option<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|account| account.number() == number)
    }

    pub fn account_at(&self, index: usize) -> Option<&Account> {
        self.accounts.get(index)
    }

    pub fn count_by_type(&self, account_type: AccountType) -> usize {
        self.accounts
            .iter()
            .filter(|account| account.account_type() == account_type)
            .count()
    }

    pub fn total_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .fold(Decimal::ZERO, |total, account| total.saturating_add(account.balance()))
    }

    /// Attaches an existing account, enforcing the per-user cap and unique numbers.
    pub fn add_account(&mut self, account: Account) -> Result<(), RegistryError> {
        if self.accounts.len() >= MAX_ACCOUNTS_PER_USER {
            return Err(RegistryError::AccountLimitReached(MAX_ACCOUNTS_PER_USER));
        }
        if self.account(account.number()).is_some() {
            return Err(RegistryError::DuplicateAccountNumber(
                account.number().to_string(),
            ));
        }
        self.accounts.push(account);
        Ok(())
    }

    /// Sequence for the next account number; one past the highest in use.
    pub fn next_account_sequence(&self) -> Result<u32, RegistryError> {
        self.accounts
            .iter()
            .filter_map(Account::sequence)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(RegistryError::AccountLimitReached(MAX_ACCOUNTS_PER_USER))
    }

    /// Opens a new account seeded with the configured policy defaults.
    pub fn open_account(
        &mut self,
        account_type: AccountType,
        config: &SystemConfiguration,
        initial_deposit: Decimal,
        date: NaiveDate,
    ) -> Result<&Account, RegistryError> {
        if initial_deposit < Decimal::ZERO {
            return Err(AccountError::InvalidAmount.into());
        }
        let number = Account::make_number(account_type, &self.id, self.next_account_sequence()?);
        let kind = AccountKind::from_config(account_type, config);
        self.add_account(Account::open(number, kind, initial_deposit, date))?;
        let opened = &self.accounts[self.accounts.len() - 1];
        info!(user = %self.username, account = %opened.number(), "account opened");
        Ok(opened)
    }

    /// Transfers between two accounts owned by this user.
    pub fn transfer_between(
        &mut self,
        source: &str,
        target: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<(), RegistryError> {
        let (from, to) = self.account_pair_mut(source, target)?;
        from.transfer_on(amount, to, date)?;
        Ok(())
    }

    /// Closes `number`, first moving any positive balance to `destination`.
    ///
    /// Fails without changes when the balance is negative, or when money
    /// remains and no distinct destination of this user is given.
    pub fn close_account(
        &mut self,
        number: &str,
        destination: Option<&str>,
        date: NaiveDate,
    ) -> Result<Account, RegistryError> {
        let index = self
            .index_of(number)
            .ok_or_else(|| RegistryError::AccountNotFound(number.to_string()))?;
        let balance = self.accounts[index].balance();
        if balance < Decimal::ZERO {
            return Err(AccountError::NegativeBalance.into());
        }
        if balance > Decimal::ZERO {
            let target = destination.ok_or(AccountError::ClosureTargetRequired)?;
            if target == number {
                return Err(AccountError::InvalidTarget(
                    "closure destination must be a different account".into(),
                )
                .into());
            }
            let (from, to) = self.account_pair_mut(number, target)?;
            let moved = from.drain_into(to, date)?;
            info!(account = number, destination = target, %moved, "closing balance moved");
        }
        let closed = self.accounts.remove(index);
        info!(user = %self.username, account = number, "account closed");
        Ok(closed)
    }

    fn index_of(&self, number: &str) -> Option<usize> {
        self.accounts
            .iter()
            .position(|account| account.number() == number)
    }

    fn account_pair_mut(
        &mut self,
        first: &str,
        second: &str,
    ) -> Result<(&mut Account, &mut Account), RegistryError> {
        let a = self
            .index_of(first)
            .ok_or_else(|| RegistryError::AccountNotFound(first.to_string()))?;
        let b = self
            .index_of(second)
            .ok_or_else(|| RegistryError::AccountNotFound(second.to_string()))?;
        if a == b {
            return Err(AccountError::InvalidTarget("cannot transfer to the same account".into()).into());
        }
        Ok(pair_mut(&mut self.accounts, a, b))
    }
}

/// Two distinct mutable elements of one slice.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (head, tail) = items.split_at_mut(b);
        (&mut head[a], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(a);
        (&mut tail[0], &mut head[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionKind;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    fn user_with_two_accounts() -> User {
        let config = SystemConfiguration::default();
        let mut user = User::new("7", "alice", "hash", "alice@example.com");
        user.open_account(AccountType::Savings, &config, dec!(400), date())
            .unwrap();
        user.open_account(AccountType::Checking, &config, dec!(100), date())
            .unwrap();
        user
    }

    #[test]
    fn roles_grant_expected_privileges() {
        assert!(!Role::Regular.has_privilege(Privilege::ManageUsers));
        assert!(Role::Admin.has_privilege(Privilege::ManageUsers));
        assert!(!Role::Admin.has_privilege(Privilege::DeleteAllData));
        assert!(Role::SuperAdmin.has_privilege(Privilege::ManageAdmins));
        assert_eq!("SUPERADMIN".parse::<Role>(), Ok(Role::SuperAdmin));
    }

    #[test]
    fn open_account_numbers_by_type_and_sequence() {
        let user = user_with_two_accounts();
        let numbers: Vec<_> = user.accounts().iter().map(Account::number).collect();
        assert_eq!(numbers, vec!["SA-7-1", "CA-7-2"]);
        assert_eq!(user.total_balance(), dec!(500));
    }

    #[test]
    fn sequence_stays_unique_after_close() {
        let mut user = user_with_two_accounts();
        user.close_account("SA-7-1", Some("CA-7-2"), date()).unwrap();
        let config = SystemConfiguration::default();
        let number = user
            .open_account(AccountType::Savings, &config, Decimal::ZERO, date())
            .unwrap()
            .number()
            .to_string();
        assert_eq!(number, "SA-7-3");
    }

    #[test]
    fn account_cap_is_enforced() {
        let config = SystemConfiguration::default();
        let mut user = User::new("1", "bob", "hash", "bob@example.com");
        for _ in 0..MAX_ACCOUNTS_PER_USER {
            user.open_account(AccountType::Checking, &config, Decimal::ZERO, date())
                .unwrap();
        }
        assert_eq!(
            user.open_account(AccountType::Checking, &config, Decimal::ZERO, date())
                .unwrap_err(),
            RegistryError::AccountLimitReached(MAX_ACCOUNTS_PER_USER)
        );
    }

    #[test]
    fn exhausted_sequence_is_refused() {
        let config = SystemConfiguration::default();
        let mut user = User::new("1", "dora", "hash", "dora@example.com");
        user.add_account(Account::new(
            format!("SA-1-{}", u32::MAX),
            AccountKind::from_config(AccountType::Savings, &config),
        ))
        .unwrap();
        assert_eq!(
            user.open_account(AccountType::Checking, &config, Decimal::ZERO, date())
                .unwrap_err(),
            RegistryError::AccountLimitReached(MAX_ACCOUNTS_PER_USER)
        );
        assert_eq!(user.accounts().len(), 1);
    }

    #[test]
    fn closing_moves_balance_to_destination() {
        let mut user = user_with_two_accounts();
        let closed = user.close_account("SA-7-1", Some("CA-7-2"), date()).unwrap();
        assert_eq!(closed.balance(), Decimal::ZERO);
        assert_eq!(user.accounts().len(), 1);
        let remaining = user.account("CA-7-2").unwrap();
        assert_eq!(remaining.balance(), dec!(500));
        assert_eq!(
            remaining.transactions().last().unwrap().kind,
            TransactionKind::ClosureTransfer
        );
        assert_eq!(remaining.balance(), remaining.transactions().net_total());
    }

    #[test]
    fn closing_requires_destination_and_non_negative_balance() {
        let mut user = user_with_two_accounts();
        assert_eq!(
            user.close_account("SA-7-1", None, date()).unwrap_err(),
            RegistryError::Account(AccountError::ClosureTargetRequired)
        );

        user.account_mut("CA-7-2")
            .unwrap()
            .withdraw_on(dec!(150), date())
            .unwrap();
        assert_eq!(
            user.close_account("CA-7-2", Some("SA-7-1"), date()).unwrap_err(),
            RegistryError::Account(AccountError::NegativeBalance)
        );
        assert_eq!(user.accounts().len(), 2);
    }

    #[test]
    fn empty_account_closes_without_destination() {
        let config = SystemConfiguration::default();
        let mut user = User::new("3", "carol", "hash", "carol@example.com");
        user.open_account(AccountType::Savings, &config, Decimal::ZERO, date())
            .unwrap();
        assert!(user.close_account("SA-3-1", None, date()).is_ok());
        assert!(user.accounts().is_empty());
    }

    #[test]
    fn transfer_between_own_accounts() {
        let mut user = user_with_two_accounts();
        user.transfer_between("SA-7-1", "CA-7-2", dec!(150), date())
            .unwrap();
        assert_eq!(user.account("SA-7-1").unwrap().balance(), dec!(250));
        assert_eq!(user.account("CA-7-2").unwrap().balance(), dec!(250));
        assert!(user
            .transfer_between("SA-7-1", "SA-7-1", dec!(1), date())
            .is_err());
    }
}
