use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config::SystemConfiguration, errors::AccountError};

use super::{
    log::TransactionLog,
    transaction::{today, Transaction, TransactionKind},
};

const MONTHS_PER_YEAR: u32 = 12;

/// Type tag used in account numbers and persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Checking => "CHECKING",
        }
    }

    /// Prefix of every account number of this type.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            AccountType::Savings => "SA-",
            AccountType::Checking => "CA-",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CHECKING" => Ok(AccountType::Checking),
            other => Err(format!("unknown account type `{}`", other)),
        }
    }
}

/// Type-specific policy carried by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Savings {
        /// Annual rate as a fraction, e.g. `0.03`.
        interest_rate: Decimal,
        max_withdrawals_per_month: u32,
    },
    Checking {
        /// Largest negative balance the account may reach.
        overdraft_limit: Decimal,
        overdraft_fee: Decimal,
    },
}

impl AccountKind {
    /// Savings policy seeded from the configured defaults.
    pub fn savings_from(config: &SystemConfiguration) -> Self {
        AccountKind::Savings {
            interest_rate: config.default_savings_interest_rate(),
            max_withdrawals_per_month: config.default_savings_max_withdrawals(),
        }
    }

    /// Checking policy seeded from the configured defaults.
    pub fn checking_from(config: &SystemConfiguration) -> Self {
        AccountKind::Checking {
            overdraft_limit: config.default_checking_overdraft_limit(),
            overdraft_fee: config.default_checking_overdraft_fee(),
        }
    }

    pub fn from_config(account_type: AccountType, config: &SystemConfiguration) -> Self {
        match account_type {
            AccountType::Savings => Self::savings_from(config),
            AccountType::Checking => Self::checking_from(config),
        }
    }

    pub fn account_type(&self) -> AccountType {
        match self {
            AccountKind::Savings { .. } => AccountType::Savings,
            AccountKind::Checking { .. } => AccountType::Checking,
        }
    }

    /// Checks every policy field against the bounds the setters enforce.
    pub fn validate(&self) -> Result<(), AccountError> {
        match self {
            AccountKind::Savings {
                interest_rate,
                max_withdrawals_per_month,
            } => {
                check_interest_rate(*interest_rate)?;
                check_max_withdrawals(*max_withdrawals_per_month)
            }
            AccountKind::Checking {
                overdraft_limit,
                overdraft_fee,
            } => {
                check_overdraft_limit(*overdraft_limit)?;
                check_overdraft_fee(*overdraft_fee)
            }
        }
    }
}

pub fn check_interest_rate(rate: Decimal) -> Result<(), AccountError> {
    if rate < Decimal::ZERO {
        return Err(AccountError::InvalidPolicy(format!(
            "interest rate {} must not be negative",
            rate
        )));
    }
    Ok(())
}

pub fn check_max_withdrawals(max: u32) -> Result<(), AccountError> {
    if max == 0 {
        return Err(AccountError::InvalidPolicy(
            "monthly withdrawal limit must be positive".into(),
        ));
    }
    Ok(())
}

pub fn check_overdraft_limit(limit: Decimal) -> Result<(), AccountError> {
    if limit < Decimal::ZERO {
        return Err(AccountError::InvalidPolicy(format!(
            "overdraft limit {} must not be negative",
            limit
        )));
    }
    Ok(())
}

pub fn check_overdraft_fee(fee: Decimal) -> Result<(), AccountError> {
    if fee < Decimal::ZERO {
        return Err(AccountError::InvalidPolicy(format!(
            "overdraft fee {} must not be negative",
            fee
        )));
    }
    Ok(())
}

/// Derived from the sign of the balance; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    Normal,
    Overdrawn,
}

/// Result of one periodic-feature pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicOutcome {
    InterestPaid(Decimal),
    FeeCharged(Decimal),
    Unchanged,
}

impl PeriodicOutcome {
    /// Signed balance change produced by the pass.
    pub fn net_change(&self) -> Decimal {
        match self {
            PeriodicOutcome::InterestPaid(amount) => *amount,
            PeriodicOutcome::FeeCharged(amount) => -*amount,
            PeriodicOutcome::Unchanged => Decimal::ZERO,
        }
    }
}

/// A savings or checking account owning its balance and history.
///
/// The balance only changes through the operations below, each of which
/// appends exactly the transactions that explain the change, so the balance
/// always equals the signed sum of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    number: String,
    balance: Decimal,
    kind: AccountKind,
    transactions: TransactionLog,
}

impl Account {
    /// Creates an empty account with a zero balance.
    pub fn new(number: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            number: number.into(),
            balance: Decimal::ZERO,
            kind,
            transactions: TransactionLog::new(),
        }
    }

    /// Creates an account, recording a positive `initial_deposit` as its first transaction.
    pub fn open(
        number: impl Into<String>,
        kind: AccountKind,
        initial_deposit: Decimal,
        date: NaiveDate,
    ) -> Self {
        let mut account = Self::new(number, kind);
        if initial_deposit > Decimal::ZERO {
            // Starts from zero, so the first credit always fits.
            account.balance = initial_deposit;
            account.transactions.append(Transaction::new(
                initial_deposit,
                TransactionKind::InitialDeposit,
                date,
            ));
        }
        account
    }

    /// Rebuilds an account from stored state without synthesising transactions.
    pub fn restore(
        number: impl Into<String>,
        kind: AccountKind,
        balance: Decimal,
        transactions: TransactionLog,
    ) -> Self {
        Self {
            number: number.into(),
            balance,
            kind,
            transactions,
        }
    }

    /// Formats `<prefix><user_id>-<sequence>`.
    pub fn make_number(account_type: AccountType, user_id: &str, sequence: u32) -> String {
        format!("{}{}-{}", account_type.number_prefix(), user_id, sequence)
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn kind(&self) -> &AccountKind {
        &self.kind
    }

    pub fn account_type(&self) -> AccountType {
        self.kind.account_type()
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.count()
    }

    pub fn transaction(&self, index: usize) -> Option<&Transaction> {
        self.transactions.at(index)
    }

    /// Trailing sequence number of the account number, if it has one.
    pub fn sequence(&self) -> Option<u32> {
        self.number.rsplit('-').next()?.parse().ok()
    }

    pub fn state(&self) -> AccountState {
        if self.balance < Decimal::ZERO {
            AccountState::Overdrawn
        } else {
            AccountState::Normal
        }
    }

    pub fn is_overdrawn(&self) -> bool {
        self.state() == AccountState::Overdrawn
    }

    /// Funds a withdrawal may draw on, including any overdraft allowance.
    pub fn available_funds(&self) -> Decimal {
        match &self.kind {
            AccountKind::Savings { .. } => self.balance,
            AccountKind::Checking {
                overdraft_limit, ..
            } => self.balance.saturating_add(*overdraft_limit),
        }
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        self.deposit_on(amount, today())
    }

    pub fn deposit_on(&mut self, amount: Decimal, date: NaiveDate) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return self.rejected("deposit", AccountError::InvalidAmount);
        }
        if let Err(err) = self.record(amount, TransactionKind::Deposit, date) {
            return self.rejected("deposit", err);
        }
        Ok(())
    }

    /// Withdraws `amount`, returning the state the account is left in.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<AccountState, AccountError> {
        self.withdraw_on(amount, today())
    }

    pub fn withdraw_on(
        &mut self,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<AccountState, AccountError> {
        if amount <= Decimal::ZERO {
            return self.rejected("withdrawal", AccountError::InvalidAmount);
        }
        match &self.kind {
            AccountKind::Savings {
                max_withdrawals_per_month,
                ..
            } => {
                let cap = *max_withdrawals_per_month;
                let used = self.transactions.count_in_month(
                    TransactionKind::Withdrawal,
                    date.year(),
                    date.month(),
                );
                if used >= cap as usize {
                    return self.rejected("withdrawal", AccountError::WithdrawalLimitReached(cap));
                }
                if self.balance < amount {
                    return self.rejected("withdrawal", AccountError::InsufficientFunds);
                }
            }
            AccountKind::Checking { .. } => {
                if amount > self.available_funds() {
                    return self.rejected("withdrawal", AccountError::OverdraftLimitExceeded);
                }
            }
        }

        if let Err(err) = self.record(amount, TransactionKind::Withdrawal, date) {
            return self.rejected("withdrawal", err);
        }
        let state = self.state();
        if state == AccountState::Overdrawn {
            warn!(account = %self.number, balance = %self.balance, "account is in overdraft");
        }
        Ok(state)
    }

    /// Moves `amount` to `target`. Target-side policy is not consulted.
    pub fn transfer(&mut self, amount: Decimal, target: &mut Account) -> Result<(), AccountError> {
        self.transfer_on(amount, target, today())
    }

    pub fn transfer_on(
        &mut self,
        amount: Decimal,
        target: &mut Account,
        date: NaiveDate,
    ) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return self.rejected("transfer", AccountError::InvalidAmount);
        }
        if target.number == self.number {
            return self.rejected(
                "transfer",
                AccountError::InvalidTarget("cannot transfer to the same account".into()),
            );
        }
        if self.balance < amount {
            return self.rejected("transfer", AccountError::InsufficientFunds);
        }
        if target.balance.checked_add(amount).is_none() {
            return self.rejected("transfer", AccountError::BalanceOverflow);
        }
        self.record(amount, TransactionKind::TransferOut, date)?;
        target.record(amount, TransactionKind::TransferIn, date)
    }

    /// Accrues monthly interest (savings) or charges the overdraft fee (checking).
    pub fn apply_periodic_feature(&mut self) -> PeriodicOutcome {
        self.apply_periodic_feature_on(today())
    }

    pub fn apply_periodic_feature_on(&mut self, date: NaiveDate) -> PeriodicOutcome {
        match self.kind.clone() {
            AccountKind::Savings { interest_rate, .. } => {
                let interest = self
                    .balance
                    .checked_mul(interest_rate)
                    .and_then(|yearly| yearly.checked_div(Decimal::from(MONTHS_PER_YEAR)))
                    .map(|monthly| monthly.round_dp(2));
                let Some(interest) = interest else {
                    warn!(account = %self.number, "interest calculation overflowed");
                    return PeriodicOutcome::Unchanged;
                };
                if interest <= Decimal::ZERO {
                    return PeriodicOutcome::Unchanged;
                }
                if let Err(err) = self.record(interest, TransactionKind::Interest, date) {
                    warn!(account = %self.number, error = %err, "interest not applied");
                    return PeriodicOutcome::Unchanged;
                }
                debug!(account = %self.number, %interest, "interest applied");
                PeriodicOutcome::InterestPaid(interest)
            }
            AccountKind::Checking { overdraft_fee, .. } => {
                if self.balance >= Decimal::ZERO || overdraft_fee <= Decimal::ZERO {
                    return PeriodicOutcome::Unchanged;
                }
                if let Err(err) = self.record(overdraft_fee, TransactionKind::OverdraftFee, date) {
                    warn!(account = %self.number, error = %err, "overdraft fee not charged");
                    return PeriodicOutcome::Unchanged;
                }
                debug!(account = %self.number, fee = %overdraft_fee, "overdraft fee charged");
                PeriodicOutcome::FeeCharged(overdraft_fee)
            }
        }
    }

    /// Balance after `months` of monthly compounding at the current rate.
    pub fn projected_balance(&self, months: u32) -> Result<Decimal, AccountError> {
        let AccountKind::Savings { interest_rate, .. } = &self.kind else {
            return Err(AccountError::WrongAccountType(AccountType::Checking.label()));
        };
        let monthly_rate = *interest_rate / Decimal::from(MONTHS_PER_YEAR);
        if monthly_rate.is_zero() {
            return Ok(self.balance.round_dp(2));
        }
        let projected = (0..months)
            .try_fold(self.balance, |acc, _| {
                acc.checked_mul(monthly_rate)
                    .and_then(|growth| acc.checked_add(growth))
            })
            .ok_or(AccountError::BalanceOverflow)?;
        Ok(projected.round_dp(2))
    }

    pub fn set_interest_rate(&mut self, rate: Decimal) -> Result<(), AccountError> {
        check_interest_rate(rate)?;
        match &mut self.kind {
            AccountKind::Savings { interest_rate, .. } => {
                *interest_rate = rate;
                Ok(())
            }
            AccountKind::Checking { .. } => {
                Err(AccountError::WrongAccountType(AccountType::Checking.label()))
            }
        }
    }

    pub fn set_max_withdrawals_per_month(&mut self, max: u32) -> Result<(), AccountError> {
        check_max_withdrawals(max)?;
        match &mut self.kind {
            AccountKind::Savings {
                max_withdrawals_per_month,
                ..
            } => {
                *max_withdrawals_per_month = max;
                Ok(())
            }
            AccountKind::Checking { .. } => {
                Err(AccountError::WrongAccountType(AccountType::Checking.label()))
            }
        }
    }

    pub fn set_overdraft_limit(&mut self, limit: Decimal) -> Result<(), AccountError> {
        check_overdraft_limit(limit)?;
        match &mut self.kind {
            AccountKind::Checking {
                overdraft_limit, ..
            } => {
                *overdraft_limit = limit;
                Ok(())
            }
            AccountKind::Savings { .. } => {
                Err(AccountError::WrongAccountType(AccountType::Savings.label()))
            }
        }
    }

    pub fn set_overdraft_fee(&mut self, fee: Decimal) -> Result<(), AccountError> {
        check_overdraft_fee(fee)?;
        match &mut self.kind {
            AccountKind::Checking { overdraft_fee, .. } => {
                *overdraft_fee = fee;
                Ok(())
            }
            AccountKind::Savings { .. } => {
                Err(AccountError::WrongAccountType(AccountType::Savings.label()))
            }
        }
    }

    /// Moves the whole positive balance to `target` ahead of closing this account.
    pub(crate) fn drain_into(
        &mut self,
        target: &mut Account,
        date: NaiveDate,
    ) -> Result<Decimal, AccountError> {
        let amount = self.balance;
        if amount > Decimal::ZERO {
            if target.balance.checked_add(amount).is_none() {
                return Err(AccountError::BalanceOverflow);
            }
            self.record(amount, TransactionKind::TransferOut, date)?;
            target.record(amount, TransactionKind::ClosureTransfer, date)?;
        }
        Ok(amount)
    }

    /// Appends a transaction and applies it to the balance. Nothing changes
    /// when the new balance would not fit in a `Decimal`.
    fn record(
        &mut self,
        amount: Decimal,
        kind: TransactionKind,
        date: NaiveDate,
    ) -> Result<(), AccountError> {
        let transaction = Transaction::new(amount, kind, date);
        self.balance = self
            .balance
            .checked_add(transaction.signed_amount())
            .ok_or(AccountError::BalanceOverflow)?;
        self.transactions.append(transaction);
        Ok(())
    }

    fn rejected<T>(&self, operation: &str, err: AccountError) -> Result<T, AccountError> {
        debug!(account = %self.number, operation, error = %err, "operation rejected");
        Err(err)
    }
}
