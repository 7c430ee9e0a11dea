use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    config::MAX_USERS,
    errors::{AccountError, RegistryError},
    ledger::{user::pair_mut, Account, User},
};

/// In-memory owner of every user for the running process.
///
/// Lookups are linear scans over the user list. That is fine at the
/// supported capacity; an index would be needed to go much further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    users: Vec<User>,
    capacity: usize,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_USERS)
    }
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            users: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn iter(&self) -> std::slice::Iter<'_, User> {
        self.users.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.users.iter().flat_map(|user| user.accounts().iter())
    }

    pub fn accounts_mut(&mut self) -> impl Iterator<Item = &mut Account> {
        self.users.iter_mut().flat_map(|user| user.accounts_mut())
    }

    pub fn add_user(&mut self, user: User) -> Result<(), RegistryError> {
        if self.users.len() >= self.capacity {
            return Err(RegistryError::CapacityReached(self.capacity));
        }
        if self.find_by_username(&user.username).is_some() {
            return Err(RegistryError::DuplicateUsername(user.username));
        }
        if self.find_by_id(&user.id).is_some() {
            return Err(RegistryError::DuplicateUserId(user.id));
        }
        if let Some(taken) = user
            .accounts()
            .iter()
            .find(|account| self.find_by_account_number(account.number()).is_some())
        {
            return Err(RegistryError::DuplicateAccountNumber(
                taken.number().to_string(),
            ));
        }
        info!(user = %user.username, role = %user.role, "user registered");
        self.users.push(user);
        Ok(())
    }

    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|user| user.username == username)
    }

    pub fn find_by_username_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.username == username)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.id == id)
    }

    pub fn find_by_account_number(&self, number: &str) -> Option<&Account> {
        self.users.iter().find_map(|user| user.account(number))
    }

    pub fn find_account_mut(&mut self, number: &str) -> Option<&mut Account> {
        self.users
            .iter_mut()
            .find_map(|user| user.account_mut(number))
    }

    /// User owning the account `number`.
    pub fn owner_of(&self, number: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|user| user.account(number).is_some())
    }

    pub fn remove_user(&mut self, username: &str) -> Result<User, RegistryError> {
        let index = self
            .users
            .iter()
            .position(|user| user.username == username)
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        let removed = self.users.remove(index);
        info!(user = %removed.username, accounts = removed.accounts().len(), "user removed");
        Ok(removed)
    }

    pub fn rename_user(&mut self, current: &str, new_username: &str) -> Result<(), RegistryError> {
        if current != new_username && self.find_by_username(new_username).is_some() {
            return Err(RegistryError::DuplicateUsername(new_username.to_string()));
        }
        let user = self
            .find_by_username_mut(current)
            .ok_or_else(|| RegistryError::UserNotFound(current.to_string()))?;
        user.username = new_username.to_string();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    /// Moves `amount` between any two accounts, whoever owns them.
    pub fn transfer(
        &mut self,
        from: &str,
        to: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<(), RegistryError> {
        if from == to {
            return Err(AccountError::InvalidTarget("cannot transfer to the same account".into()).into());
        }
        let source_owner = self
            .owner_index(from)
            .ok_or_else(|| RegistryError::AccountNotFound(from.to_string()))?;
        let target_owner = self
            .owner_index(to)
            .ok_or_else(|| RegistryError::AccountNotFound(to.to_string()))?;

        if source_owner == target_owner {
            return self.users[source_owner].transfer_between(from, to, amount, date);
        }
        let (source_user, target_user) = pair_mut(&mut self.users, source_owner, target_owner);
        let source = source_user
            .account_mut(from)
            .ok_or_else(|| RegistryError::AccountNotFound(from.to_string()))?;
        let target = target_user
            .account_mut(to)
            .ok_or_else(|| RegistryError::AccountNotFound(to.to_string()))?;
        source.transfer_on(amount, target, date)?;
        Ok(())
    }

    fn owner_index(&self, number: &str) -> Option<usize> {
        self.users
            .iter()
            .position(|user| user.account(number).is_some())
    }
}

impl<'a> IntoIterator for &'a AccountRegistry {
    type Item = &'a User;
    type IntoIter = std::slice::Iter<'a, User>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.iter()
    }
}
