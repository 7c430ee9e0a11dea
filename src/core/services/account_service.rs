use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    config::{SystemConfiguration, DEFAULT_INITIAL_DEPOSIT},
    core::registry::AccountRegistry,
    errors::RegistryError,
    ledger::{Account, AccountState, AccountType, TransactionLog},
};

use super::ServiceResult;

/// Account operations addressed by username and account number.
pub struct AccountService;

impl AccountService {
    /// Opens an account for `username` seeded from `config`.
    ///
    /// `None` opens with [`DEFAULT_INITIAL_DEPOSIT`]. Returns the new number.
    pub fn open(
        registry: &mut AccountRegistry,
        config: &SystemConfiguration,
        username: &str,
        account_type: AccountType,
        initial_deposit: Option<Decimal>,
        date: NaiveDate,
    ) -> ServiceResult<String> {
        let user = registry
            .find_by_username_mut(username)
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        let deposit = initial_deposit.unwrap_or(DEFAULT_INITIAL_DEPOSIT);
        let account = user.open_account(account_type, config, deposit, date)?;
        Ok(account.number().to_string())
    }

    pub fn deposit(
        registry: &mut AccountRegistry,
        number: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> ServiceResult<Decimal> {
        let account = Self::account_mut(registry, number)?;
        account.deposit_on(amount, date)?;
        Ok(account.balance())
    }

    pub fn withdraw(
        registry: &mut AccountRegistry,
        number: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> ServiceResult<AccountState> {
        let account = Self::account_mut(registry, number)?;
        Ok(account.withdraw_on(amount, date)?)
    }

    pub fn transfer(
        registry: &mut AccountRegistry,
        from: &str,
        to: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> ServiceResult<()> {
        registry.transfer(from, to, amount, date)?;
        Ok(())
    }

    /// Closes `number`, moving any remaining balance to `destination`.
    pub fn close(
        registry: &mut AccountRegistry,
        username: &str,
        number: &str,
        destination: Option<&str>,
        date: NaiveDate,
    ) -> ServiceResult<Account> {
        let user = registry
            .find_by_username_mut(username)
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        Ok(user.close_account(number, destination, date)?)
    }

    pub fn history<'a>(
        registry: &'a AccountRegistry,
        number: &str,
    ) -> ServiceResult<&'a TransactionLog> {
        registry
            .find_by_account_number(number)
            .map(Account::transactions)
            .ok_or_else(|| RegistryError::AccountNotFound(number.to_string()).into())
    }

    pub fn list<'a>(registry: &'a AccountRegistry, username: &str) -> ServiceResult<&'a [Account]> {
        registry
            .find_by_username(username)
            .map(|user| user.accounts())
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()).into())
    }

    fn account_mut<'a>(
        registry: &'a mut AccountRegistry,
        number: &str,
    ) -> ServiceResult<&'a mut Account> {
        registry
            .find_account_mut(number)
            .ok_or_else(|| RegistryError::AccountNotFound(number.to_string()).into())
    }
}
