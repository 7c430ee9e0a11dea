use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::SystemConfiguration,
    core::registry::AccountRegistry,
    errors::RegistryError,
    ledger::{AccountType, PeriodicOutcome, Privilege, Role, User},
    storage::StorageBackend,
};

use super::{ServiceError, ServiceResult};

/// Totals from one periodic-feature pass over a single account type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    pub accounts_processed: usize,
    pub accounts_changed: usize,
    pub total_interest: Decimal,
    pub total_fees: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemSummary {
    pub users: usize,
    pub savings_accounts: usize,
    pub checking_accounts: usize,
    pub total_balance: Decimal,
    pub total_transactions: usize,
    pub average_balance_per_user: Decimal,
}

/// A single policy value, applied either to the defaults or to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySetting {
    InterestRate(Decimal),
    MaxWithdrawals(u32),
    OverdraftLimit(Decimal),
    OverdraftFee(Decimal),
}

pub struct AdminService;

impl AdminService {
    pub fn ensure(role: Role, privilege: Privilege) -> ServiceResult<()> {
        if role.has_privilege(privilege) {
            Ok(())
        } else {
            warn!(%role, ?privilege, "privileged operation refused");
            Err(ServiceError::Forbidden(privilege))
        }
    }

    /// Runs interest or overdraft-fee assessment on every account of `account_type`.
    pub fn apply_periodic_features(
        actor: Role,
        registry: &mut AccountRegistry,
        account_type: AccountType,
        date: NaiveDate,
    ) -> ServiceResult<FeatureSummary> {
        Self::ensure(actor, Privilege::ApplyPeriodicFeatures)?;
        let mut summary = FeatureSummary::default();
        for account in registry.accounts_mut() {
            if account.account_type() != account_type {
                continue;
            }
            summary.accounts_processed += 1;
            match account.apply_periodic_feature_on(date) {
                PeriodicOutcome::InterestPaid(amount) => {
                    summary.accounts_changed += 1;
                    summary.total_interest = summary.total_interest.saturating_add(amount);
                }
                PeriodicOutcome::FeeCharged(amount) => {
                    summary.accounts_changed += 1;
                    summary.total_fees = summary.total_fees.saturating_add(amount);
                }
                PeriodicOutcome::Unchanged => {}
            }
        }
        info!(
            account_type = %account_type,
            processed = summary.accounts_processed,
            changed = summary.accounts_changed,
            interest = %summary.total_interest,
            fees = %summary.total_fees,
            "periodic features applied"
        );
        Ok(summary)
    }

    pub fn system_summary(registry: &AccountRegistry) -> SystemSummary {
        let mut summary = SystemSummary {
            users: registry.count(),
            ..SystemSummary::default()
        };
        for account in registry.accounts() {
            match account.account_type() {
                AccountType::Savings => summary.savings_accounts += 1,
                AccountType::Checking => summary.checking_accounts += 1,
            }
            summary.total_balance = summary.total_balance.saturating_add(account.balance());
            summary.total_transactions += account.transaction_count();
        }
        if summary.users > 0 {
            summary.average_balance_per_user =
                (summary.total_balance / Decimal::from(summary.users)).round_dp(2);
        }
        summary
    }

    /// Changes a default used for accounts opened from now on.
    pub fn update_default(
        actor: Role,
        config: &mut SystemConfiguration,
        setting: PolicySetting,
    ) -> ServiceResult<()> {
        Self::ensure(actor, Privilege::ManageConfiguration)?;
        match setting {
            PolicySetting::InterestRate(rate) => config.set_default_savings_interest_rate(rate)?,
            PolicySetting::MaxWithdrawals(max) => config.set_default_savings_max_withdrawals(max)?,
            PolicySetting::OverdraftLimit(limit) => {
                config.set_default_checking_overdraft_limit(limit)?
            }
            PolicySetting::OverdraftFee(fee) => config.set_default_checking_overdraft_fee(fee)?,
        }
        info!(?setting, "default policy updated");
        Ok(())
    }

    /// Changes the policy of one existing account.
    pub fn update_account_policy(
        actor: Role,
        registry: &mut AccountRegistry,
        number: &str,
        setting: PolicySetting,
    ) -> ServiceResult<()> {
        Self::ensure(actor, Privilege::ManageConfiguration)?;
        let account = registry
            .find_account_mut(number)
            .ok_or_else(|| RegistryError::AccountNotFound(number.to_string()))?;
        match setting {
            PolicySetting::InterestRate(rate) => account.set_interest_rate(rate)?,
            PolicySetting::MaxWithdrawals(max) => account.set_max_withdrawals_per_month(max)?,
            PolicySetting::OverdraftLimit(limit) => account.set_overdraft_limit(limit)?,
            PolicySetting::OverdraftFee(fee) => account.set_overdraft_fee(fee)?,
        }
        info!(account = number, ?setting, "account policy updated");
        Ok(())
    }

    pub fn register_user(
        actor: Role,
        registry: &mut AccountRegistry,
        user: User,
    ) -> ServiceResult<()> {
        Self::ensure(actor, Privilege::ManageUsers)?;
        if user.role != Role::Regular {
            Self::ensure(actor, Privilege::ManageAdmins)?;
        }
        registry.add_user(user)?;
        Ok(())
    }

    /// Removes a user; privileged users can only be removed by a role that manages admins.
    pub fn remove_user(
        actor: Role,
        registry: &mut AccountRegistry,
        username: &str,
    ) -> ServiceResult<User> {
        Self::ensure(actor, Privilege::ManageUsers)?;
        let target = registry
            .find_by_username(username)
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        if target.role != Role::Regular {
            Self::ensure(actor, Privilege::ManageAdmins)?;
        }
        Ok(registry.remove_user(username)?)
    }

    pub fn change_role(
        actor: Role,
        registry: &mut AccountRegistry,
        username: &str,
        role: Role,
    ) -> ServiceResult<()> {
        Self::ensure(actor, Privilege::ManageAdmins)?;
        let user = registry
            .find_by_username_mut(username)
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        info!(user = username, from = %user.role, to = %role, "role changed");
        user.role = role;
        Ok(())
    }

    /// Clears the registry and removes every persisted data file.
    pub fn delete_all_data(
        actor: Role,
        registry: &mut AccountRegistry,
        config: &mut SystemConfiguration,
        storage: &dyn StorageBackend,
    ) -> ServiceResult<()> {
        Self::ensure(actor, Privilege::DeleteAllData)?;
        storage.delete_all()?;
        registry.clear();
        *config = SystemConfiguration::default();
        warn!("all ledger data deleted");
        Ok(())
    }
}
