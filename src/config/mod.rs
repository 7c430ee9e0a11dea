use std::{
    fs,
    path::{Path, PathBuf},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    core::utils::{parse_decimal, write_atomic},
    errors::{AccountError, LedgerError},
};

pub const MAX_USERS: usize = 100;
pub const MAX_ACCOUNTS_PER_USER: usize = 10;
pub const DEFAULT_INITIAL_DEPOSIT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

const DEFAULT_SAVINGS_INTEREST_RATE: Decimal = Decimal::from_parts(3, 0, 0, false, 2);
const DEFAULT_CHECKING_OVERDRAFT_LIMIT: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
const DEFAULT_CHECKING_OVERDRAFT_FEE: Decimal = Decimal::from_parts(35, 0, 0, false, 0);
const DEFAULT_SAVINGS_MAX_WITHDRAWALS: u32 = 3;

pub const KEY_INTEREST_RATE: &str = "DEFAULT_SAVINGS_INTEREST_RATE";
pub const KEY_OVERDRAFT_LIMIT: &str = "DEFAULT_CHECKING_OVERDRAFT_LIMIT";
pub const KEY_OVERDRAFT_FEE: &str = "DEFAULT_CHECKING_OVERDRAFT_FEE";
pub const KEY_MAX_WITHDRAWALS: &str = "DEFAULT_SAVINGS_MAX_WITHDRAWALS";

/// Defaults applied to newly opened accounts.
///
/// Changing a value never touches accounts that already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    default_savings_interest_rate: Decimal,
    default_checking_overdraft_limit: Decimal,
    default_checking_overdraft_fee: Decimal,
    default_savings_max_withdrawals: u32,
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self {
            default_savings_interest_rate: DEFAULT_SAVINGS_INTEREST_RATE,
            default_checking_overdraft_limit: DEFAULT_CHECKING_OVERDRAFT_LIMIT,
            default_checking_overdraft_fee: DEFAULT_CHECKING_OVERDRAFT_FEE,
            default_savings_max_withdrawals: DEFAULT_SAVINGS_MAX_WITHDRAWALS,
        }
    }
}

impl SystemConfiguration {
    pub fn default_savings_interest_rate(&self) -> Decimal {
        self.default_savings_interest_rate
    }

    pub fn default_checking_overdraft_limit(&self) -> Decimal {
        self.default_checking_overdraft_limit
    }

    pub fn default_checking_overdraft_fee(&self) -> Decimal {
        self.default_checking_overdraft_fee
    }

    pub fn default_savings_max_withdrawals(&self) -> u32 {
        self.default_savings_max_withdrawals
    }

    pub fn set_default_savings_interest_rate(&mut self, rate: Decimal) -> Result<(), AccountError> {
        self.default_savings_interest_rate = non_negative(KEY_INTEREST_RATE, rate)?;
        Ok(())
    }

    pub fn set_default_checking_overdraft_limit(
        &mut self,
        limit: Decimal,
    ) -> Result<(), AccountError> {
        self.default_checking_overdraft_limit = non_negative(KEY_OVERDRAFT_LIMIT, limit)?;
        Ok(())
    }

    pub fn set_default_checking_overdraft_fee(&mut self, fee: Decimal) -> Result<(), AccountError> {
        self.default_checking_overdraft_fee = non_negative(KEY_OVERDRAFT_FEE, fee)?;
        Ok(())
    }

    pub fn set_default_savings_max_withdrawals(&mut self, max: u32) -> Result<(), AccountError> {
        if max == 0 {
            return Err(AccountError::InvalidPolicy(format!(
                "{} must be positive",
                KEY_MAX_WITHDRAWALS
            )));
        }
        self.default_savings_max_withdrawals = max;
        Ok(())
    }

    /// Renders the `KEY=value` lines written to the configuration file.
    pub fn to_lines(&self) -> Vec<String> {
        vec![
            format!("{}={}", KEY_INTEREST_RATE, self.default_savings_interest_rate),
            format!("{}={}", KEY_OVERDRAFT_LIMIT, self.default_checking_overdraft_limit),
            format!("{}={}", KEY_OVERDRAFT_FEE, self.default_checking_overdraft_fee),
            format!("{}={}", KEY_MAX_WITHDRAWALS, self.default_savings_max_withdrawals),
        ]
    }

    /// Parses configuration text, starting from defaults.
    ///
    /// Blank lines, `#` comments and unknown keys are ignored. Values that do
    /// not parse or fail validation keep the default and produce a warning.
    pub fn parse(text: &str) -> (Self, Vec<String>) {
        let mut config = Self::default();
        let mut warnings = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warnings.push(format!("config line {}: expected KEY=value", index + 1));
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let applied = match key {
                KEY_INTEREST_RATE => parse_decimal(value)
                    .ok_or_else(|| format!("`{}` is not a number", value))
                    .and_then(|rate| {
                        config
                            .set_default_savings_interest_rate(rate)
                            .map_err(|err| err.to_string())
                    }),
                KEY_OVERDRAFT_LIMIT => parse_decimal(value)
                    .ok_or_else(|| format!("`{}` is not a number", value))
                    .and_then(|limit| {
                        config
                            .set_default_checking_overdraft_limit(limit)
                            .map_err(|err| err.to_string())
                    }),
                KEY_OVERDRAFT_FEE => parse_decimal(value)
                    .ok_or_else(|| format!("`{}` is not a number", value))
                    .and_then(|fee| {
                        config
                            .set_default_checking_overdraft_fee(fee)
                            .map_err(|err| err.to_string())
                    }),
                KEY_MAX_WITHDRAWALS => value
                    .parse::<u32>()
                    .map_err(|_| format!("`{}` is not a whole number", value))
                    .and_then(|max| {
                        config
                            .set_default_savings_max_withdrawals(max)
                            .map_err(|err| err.to_string())
                    }),
                _ => Ok(()),
            };
            if let Err(reason) = applied {
                warnings.push(format!("config line {} ({}): {}", index + 1, key, reason));
            }
        }
        (config, warnings)
    }
}

fn non_negative(key: &str, value: Decimal) -> Result<Decimal, AccountError> {
    if value < Decimal::ZERO {
        Err(AccountError::InvalidPolicy(format!(
            "{} must not be negative",
            key
        )))
    } else {
        Ok(value)
    }
}

/// Reads and writes the `KEY=value` configuration file.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration; a missing file yields defaults.
    pub fn load(&self) -> Result<(SystemConfiguration, Vec<String>), LedgerError> {
        if !self.path.exists() {
            return Ok((SystemConfiguration::default(), Vec::new()));
        }
        let text = fs::read_to_string(&self.path)?;
        let (config, warnings) = SystemConfiguration::parse(&text);
        for warning in &warnings {
            warn!(path = %self.path.display(), "{}", warning);
        }
        Ok((config, warnings))
    }

    pub fn save(&self, config: &SystemConfiguration) -> Result<(), LedgerError> {
        let mut body = config.to_lines().join("\n");
        body.push('\n');
        write_atomic(&self.path, &body)?;
        info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}
