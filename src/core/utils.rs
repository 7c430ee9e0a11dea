use dirs::home_dir;
use rust_decimal::Decimal;
use std::{
    env, fs,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

const DEFAULT_DIR_NAME: &str = ".account_ledger";
const HOME_ENV: &str = "ACCOUNT_LEDGER_HOME";
const DATA_DIR: &str = "data";
const BACKUP_DIR: &str = "backups";
const USERS_FILE: &str = "users.txt";
const ACCOUNTS_FILE: &str = "accounts.txt";
const TRANSACTIONS_FILE: &str = "transactions.txt";
const CONFIG_FILE: &str = "config.txt";
const TMP_SUFFIX: &str = "tmp";

/// Resolves every on-disk location relative to one application root.
pub struct PathResolver;

impl PathResolver {
    /// Explicit root, then `ACCOUNT_LEDGER_HOME`, then `~/.account_ledger`.
    pub fn resolve_base(root: Option<PathBuf>) -> PathBuf {
        if let Some(root) = root {
            return root;
        }
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn data_dir_in(root: &Path) -> PathBuf {
        root.join(DATA_DIR)
    }

    pub fn backup_dir_in(root: &Path) -> PathBuf {
        root.join(BACKUP_DIR)
    }

    pub fn users_file_in(root: &Path) -> PathBuf {
        Self::data_dir_in(root).join(USERS_FILE)
    }

    pub fn accounts_file_in(root: &Path) -> PathBuf {
        Self::data_dir_in(root).join(ACCOUNTS_FILE)
    }

    pub fn transactions_file_in(root: &Path) -> PathBuf {
        Self::data_dir_in(root).join(TRANSACTIONS_FILE)
    }

    pub fn config_file_in(root: &Path) -> PathBuf {
        Self::data_dir_in(root).join(CONFIG_FILE)
    }
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Sibling path used while staging a write, e.g. `users.txt.tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// Writes `data` to a staging file and renames it over `path`.
pub fn write_atomic(path: &Path, data: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

/// Parses plain or scientific decimal notation (`1500.25`, `1.5E3`).
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let root = PathBuf::from("/tmp/ledger-root");
        assert_eq!(PathResolver::resolve_base(Some(root.clone())), root);
        assert_eq!(
            PathResolver::users_file_in(&root),
            root.join("data").join("users.txt")
        );
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("data/users.txt")),
            PathBuf::from("data/users.txt.tmp")
        );
        assert_eq!(tmp_path(Path::new("data/raw")), PathBuf::from("data/raw.tmp"));
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("file.txt");
        write_atomic(&path, "first").expect("first write");
        write_atomic(&path, "second").expect("second write");
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn decimals_accept_scientific_notation() {
        assert_eq!(parse_decimal("1500.25"), Some(dec!(1500.25)));
        assert_eq!(parse_decimal("1.5E3"), Some(dec!(1500)));
        assert_eq!(parse_decimal("-35"), Some(dec!(-35)));
        assert_eq!(parse_decimal("abc"), None);
    }
}
