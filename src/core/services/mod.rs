pub mod account_service;
pub mod admin_service;

pub use account_service::AccountService;
pub use admin_service::{AdminService, FeatureSummary, PolicySetting, SystemSummary};

use crate::{
    errors::{AccountError, LedgerError, RegistryError},
    ledger::Privilege,
};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("missing privilege: {0:?}")]
    Forbidden(Privilege),
    #[error("{0}")]
    Invalid(String),
}

impl From<AccountError> for ServiceError {
    fn from(err: AccountError) -> Self {
        ServiceError::Registry(RegistryError::Account(err))
    }
}
