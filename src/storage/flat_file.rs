use chrono::{Local, NaiveDateTime};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

use crate::{
    config::{ConfigManager, SystemConfiguration, MAX_USERS},
    core::{
        registry::AccountRegistry,
        utils::{ensure_dir, write_atomic, PathResolver},
    },
    errors::LedgerError,
};

use super::{codec, LoadReport, Result, StorageBackend};

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DEFAULT_RETENTION: usize = 5;

/// Stores the registry as `users.txt`, `accounts.txt`, `transactions.txt`
/// and `config.txt` under `<root>/data`.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    data_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl FlatFileStorage {
    pub fn new(root: Option<PathBuf>, retention: Option<usize>) -> Result<Self> {
        let app_root = PathResolver::resolve_base(root);
        let data_dir = PathResolver::data_dir_in(&app_root);
        let backups_dir = PathResolver::backup_dir_in(&app_root);
        ensure_dir(&data_dir)?;
        ensure_dir(&backups_dir)?;
        Ok(Self {
            root: app_root,
            data_dir,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None, None)
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn users_path(&self) -> PathBuf {
        PathResolver::users_file_in(&self.root)
    }

    pub fn accounts_path(&self) -> PathBuf {
        PathResolver::accounts_file_in(&self.root)
    }

    pub fn transactions_path(&self) -> PathBuf {
        PathResolver::transactions_file_in(&self.root)
    }

    pub fn config_path(&self) -> PathBuf {
        PathResolver::config_file_in(&self.root)
    }

    fn config_manager(&self) -> ConfigManager {
        ConfigManager::new(self.config_path())
    }

    fn data_files(&self) -> [PathBuf; 4] {
        [
            self.transactions_path(),
            self.accounts_path(),
            self.users_path(),
            self.config_path(),
        ]
    }

    /// Backup set names, newest first by timestamp and then collision suffix.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        entries.sort_by(|a, b| backup_sort_key(b).cmp(&backup_sort_key(a)));
        Ok(entries)
    }

    pub fn backup_path(&self, backup_name: &str) -> PathBuf {
        self.backups_dir.join(backup_name)
    }

    /// Copies the current data files into a new timestamped backup set.
    ///
    /// Returns `None` when there is nothing on disk to back up.
    pub fn backup_existing(&self) -> Result<Option<PathBuf>> {
        let existing: Vec<PathBuf> = self
            .data_files()
            .into_iter()
            .filter(|path| path.exists())
            .collect();
        if existing.is_empty() {
            return Ok(None);
        }
        let stamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        // Continue past the highest suffix used this second, even if pruned below it.
        let mut suffix = self
            .list_backups()?
            .iter()
            .filter(|name| name.starts_with(&stamp))
            .map(|name| backup_sort_key(name).1.saturating_add(1))
            .max();
        let mut dir = self.backups_dir.join(backup_name(&stamp, suffix));
        while dir.exists() {
            let next = suffix.unwrap_or(0).saturating_add(1);
            suffix = Some(next);
            dir = self.backups_dir.join(backup_name(&stamp, suffix));
        }
        ensure_dir(&dir)?;
        for path in &existing {
            if let Some(file_name) = path.file_name() {
                fs::copy(path, dir.join(file_name))?;
            }
        }
        self.prune_backups()?;
        Ok(Some(dir))
    }

    fn prune_backups(&self) -> Result<()> {
        let backups = self.list_backups()?;
        for name in backups.iter().skip(self.retention) {
            if let Err(err) = fs::remove_dir_all(self.backup_path(name)) {
                warn!(backup = %name, %err, "failed to prune backup");
            }
        }
        Ok(())
    }

    /// Copies a backup set over the data files and loads it.
    pub fn restore_backup(&self, backup_name: &str) -> Result<LoadReport> {
        let dir = self.backup_path(backup_name);
        if !dir.is_dir() {
            return Err(LedgerError::Persistence(format!(
                "backup `{}` not found",
                backup_name
            )));
        }
        for target in self.data_files() {
            let Some(file_name) = target.file_name() else {
                continue;
            };
            let source = dir.join(file_name);
            if source.exists() {
                fs::copy(&source, &target)?;
            } else if target.exists() {
                fs::remove_file(&target)?;
            }
        }
        info!(backup = backup_name, "backup restored");
        self.load()
    }

    fn read_optional(&self, path: &Path, failures: &mut Vec<String>) -> String {
        match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                error!(path = %path.display(), %err, "failed to read data file");
                failures.push(format!("{}: {}", display_name(path), err));
                String::new()
            }
        }
    }
}

impl StorageBackend for FlatFileStorage {
    /// Rewrites all four files in full. Every pass is attempted even when an
    /// earlier one fails; the error lists the files that were not written.
    fn save(&self, registry: &AccountRegistry, config: &SystemConfiguration) -> Result<()> {
        ensure_dir(&self.data_dir)?;
        if let Err(err) = self.backup_existing() {
            warn!(%err, "backup before save failed");
        }

        let encoded = codec::encode_registry(registry);
        let passes = [
            (
                self.transactions_path(),
                write_atomic(&self.transactions_path(), &encoded.transactions)
                    .map_err(LedgerError::from),
            ),
            (
                self.accounts_path(),
                write_atomic(&self.accounts_path(), &encoded.accounts)
                    .map_err(LedgerError::from),
            ),
            (
                self.users_path(),
                write_atomic(&self.users_path(), &encoded.users)
                    .map_err(LedgerError::from),
            ),
            (self.config_path(), self.config_manager().save(config)),
        ];
        let mut failed = Vec::new();
        for (path, outcome) in &passes {
            if let Err(err) = outcome {
                error!(path = %path.display(), %err, "failed to write data file");
                failed.push(display_name(path));
            }
        }
        if !failed.is_empty() {
            return Err(LedgerError::Persistence(format!(
                "failed to write {}",
                failed.join(", ")
            )));
        }
        info!(
            users = registry.count(),
            skipped = encoded.skipped.len(),
            dir = %self.data_dir.display(),
            "registry saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<LoadReport> {
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        let config = match self.config_manager().load() {
            Ok((config, config_warnings)) => {
                warnings.extend(config_warnings);
                config
            }
            Err(err) => {
                error!(path = %self.config_path().display(), %err, "failed to read data file");
                failures.push(format!("{}: {}", display_name(&self.config_path()), err));
                SystemConfiguration::default()
            }
        };

        let transactions = self.read_optional(&self.transactions_path(), &mut failures);
        let accounts = self.read_optional(&self.accounts_path(), &mut failures);
        let users = self.read_optional(&self.users_path(), &mut failures);
        let (registry, record_warnings) =
            codec::decode_registry(&users, &accounts, &transactions, &config, MAX_USERS);
        warnings.extend(record_warnings);

        info!(
            users = registry.count(),
            warnings = warnings.len(),
            failures = failures.len(),
            "registry loaded"
        );
        Ok(LoadReport {
            registry,
            config,
            warnings,
            failures,
        })
    }

    fn exists(&self) -> bool {
        self.data_files().iter().any(|path| path.exists())
    }

    /// Removes the data files. Backup sets are left in place.
    fn delete_all(&self) -> Result<()> {
        for path in self.data_files() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        warn!(dir = %self.data_dir.display(), "all data files deleted");
        Ok(())
    }
}

fn backup_name(stamp: &str, suffix: Option<u32>) -> String {
    match suffix {
        Some(n) => format!("{}_{}", stamp, n),
        None => stamp.to_string(),
    }
}

/// Splits `<YYYYmmdd_HHMMSS>[_<n>]` into its timestamp and suffix.
fn backup_sort_key(name: &str) -> (Option<NaiveDateTime>, u32, &str) {
    let stamp_len = "YYYYmmdd_HHMMSS".len();
    let stamp = name
        .get(..stamp_len)
        .and_then(|raw| NaiveDateTime::parse_from_str(raw, BACKUP_TIMESTAMP_FORMAT).ok());
    let suffix = name
        .get(stamp_len..)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);
    (stamp, suffix, name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
