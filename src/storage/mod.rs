pub mod codec;
pub mod flat_file;
pub mod snapshot;

use crate::{config::SystemConfiguration, core::registry::AccountRegistry, errors::LedgerError};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Everything recovered by a load, including what had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub registry: AccountRegistry,
    pub config: SystemConfiguration,
    /// Individual records or settings that were skipped.
    pub warnings: Vec<String>,
    /// Whole files that could not be read.
    pub failures: Vec<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }
}

/// Persistence backend for the full registry and its configuration.
pub trait StorageBackend: Send + Sync {
    fn save(&self, registry: &AccountRegistry, config: &SystemConfiguration) -> Result<()>;
    fn load(&self) -> Result<LoadReport>;
    fn exists(&self) -> bool;
    fn delete_all(&self) -> Result<()>;
}

pub use flat_file::FlatFileStorage;
