//! Line-oriented record layouts for the flat-file store.
//!
//! ```text
//! users.txt         ROLE|userId|username|credentialHash|email
//! accounts.txt      userId|SAVINGS|number|balance|interestRate|maxWithdrawals
//!                   userId|CHECKING|number|balance|overdraftLimit|overdraftFee
//! transactions.txt  number|amount|TYPE|MM/dd/yyyy
//! ```
//!
//! Decoding is staged: transactions are grouped by account number first, then
//! accounts are rebuilt around those logs and grouped by user id, then users
//! are created and handed their accounts. Each stage consumes the previous
//! stage's output, so the order cannot be inverted by a caller.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::warn;

use crate::{
    config::SystemConfiguration,
    core::{registry::AccountRegistry, utils::parse_decimal},
    errors::AccountError,
    ledger::{
        account::{
            check_interest_rate, check_max_withdrawals, check_overdraft_fee,
            check_overdraft_limit,
        },
        format_date, parse_date, Account, AccountKind, AccountType, Role, Transaction,
        TransactionKind, TransactionLog, User,
    },
};

pub const DELIMITER: char = '|';

const USER_FIELDS: usize = 5;
const ACCOUNT_FIELDS: usize = 4;
const TRANSACTION_FIELDS: usize = 4;

/// Encoded contents of the three record files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedRegistry {
    pub users: String,
    pub accounts: String,
    pub transactions: String,
    /// Records left out because a field could not be written safely.
    pub skipped: Vec<String>,
}

/// Transaction logs keyed by account number, in file order.
pub struct TransactionIndex {
    logs: HashMap<String, TransactionLog>,
    order: Vec<String>,
}

/// Rebuilt accounts keyed by owning user id, in file order, each with its
/// accounts.txt line number.
pub struct AccountIndex {
    accounts: HashMap<String, Vec<(usize, Account)>>,
    order: Vec<String>,
}

pub fn encode_user(user: &User) -> Result<String, String> {
    for (name, value) in [
        ("user id", user.id.as_str()),
        ("username", user.username.as_str()),
        ("credential hash", user.credential_hash.as_str()),
        ("email", user.email.as_str()),
    ] {
        check_field(name, value)?;
    }
    Ok(join(&[
        user.role.as_str(),
        &user.id,
        &user.username,
        &user.credential_hash,
        &user.email,
    ]))
}

pub fn encode_account(user_id: &str, account: &Account) -> Result<String, String> {
    check_field("user id", user_id)?;
    check_field("account number", account.number())?;
    let balance = account.balance().to_string();
    let line = match account.kind() {
        AccountKind::Savings {
            interest_rate,
            max_withdrawals_per_month,
        } => join(&[
            user_id,
            AccountType::Savings.as_str(),
            account.number(),
            &balance,
            &interest_rate.to_string(),
            &max_withdrawals_per_month.to_string(),
        ]),
        AccountKind::Checking {
            overdraft_limit,
            overdraft_fee,
        } => join(&[
            user_id,
            AccountType::Checking.as_str(),
            account.number(),
            &balance,
            &overdraft_limit.to_string(),
            &overdraft_fee.to_string(),
        ]),
    };
    Ok(line)
}

pub fn encode_transaction(account_number: &str, transaction: &Transaction) -> Result<String, String> {
    check_field("account number", account_number)?;
    Ok(join(&[
        account_number,
        &transaction.amount.to_string(),
        transaction.kind.as_str(),
        &format_date(transaction.date),
    ]))
}

/// Encodes every user, account and transaction of `registry`.
///
/// A record that cannot be written is skipped together with everything it
/// owns, so the output never contains orphans.
pub fn encode_registry(registry: &AccountRegistry) -> EncodedRegistry {
    let mut encoded = EncodedRegistry::default();
    for user in registry {
        let user_line = match encode_user(user) {
            Ok(line) => line,
            Err(reason) => {
                skip(&mut encoded.skipped, format!("user `{}`: {}", user.username, reason));
                continue;
            }
        };
        push_line(&mut encoded.users, &user_line);
        for account in user.accounts() {
            match encode_account(&user.id, account) {
                Ok(line) => push_line(&mut encoded.accounts, &line),
                Err(reason) => {
                    skip(
                        &mut encoded.skipped,
                        format!("account `{}`: {}", account.number(), reason),
                    );
                    continue;
                }
            }
            for (position, transaction) in account.transactions().iter().enumerate() {
                match encode_transaction(account.number(), transaction) {
                    Ok(line) => push_line(&mut encoded.transactions, &line),
                    Err(reason) => skip(
                        &mut encoded.skipped,
                        format!(
                            "transaction {} of `{}`: {}",
                            position + 1,
                            account.number(),
                            reason
                        ),
                    ),
                }
            }
        }
    }
    encoded
}

/// First stage: group transaction lines by account number.
pub fn decode_transactions(text: &str, warnings: &mut Vec<String>) -> TransactionIndex {
    let mut index = TransactionIndex {
        logs: HashMap::new(),
        order: Vec::new(),
    };
    for (line_no, fields) in records(text) {
        match parse_transaction(&fields) {
            Ok((number, transaction)) => {
                if !index.logs.contains_key(&number) {
                    index.order.push(number.clone());
                }
                index.logs.entry(number).or_default().append(transaction);
            }
            Err(reason) => malformed(warnings, "transactions", line_no, reason),
        }
    }
    index
}

/// Second stage: rebuild accounts around their pre-loaded logs.
///
/// Missing or out-of-range policy fields fall back to `config`. A repeated
/// account number is skipped. Logs whose account line never appears are
/// reported as orphans.
pub fn decode_accounts(
    text: &str,
    mut transactions: TransactionIndex,
    config: &SystemConfiguration,
    warnings: &mut Vec<String>,
) -> AccountIndex {
    let mut index = AccountIndex {
        accounts: HashMap::new(),
        order: Vec::new(),
    };
    let mut seen = HashSet::new();
    for (line_no, fields) in records(text) {
        let (user_id, number, kind, balance) = match parse_account(&fields, config) {
            Ok(parsed) => parsed,
            Err(reason) => {
                malformed(warnings, "accounts", line_no, reason);
                continue;
            }
        };
        if !seen.insert(number.clone()) {
            malformed(
                warnings,
                "accounts",
                line_no,
                format!("duplicate account number `{}`", number),
            );
            continue;
        }
        let (kind, rejected) = checked_policy(kind, config);
        for reason in rejected {
            defaulted(warnings, "accounts", line_no, format!("`{}`: {}", number, reason));
        }
        let log = transactions.logs.remove(&number).unwrap_or_default();
        let account = Account::restore(number, kind, balance, log);
        if !index.accounts.contains_key(&user_id) {
            index.order.push(user_id.clone());
        }
        index
            .accounts
            .entry(user_id)
            .or_default()
            .push((line_no, account));
    }
    for number in transactions.order {
        if let Some(log) = transactions.logs.get(&number) {
            orphan(
                warnings,
                format!("{} transaction(s) reference unknown account `{}`", log.count(), number),
            );
        }
    }
    index
}

/// Final stage: create users and attach their accounts.
pub fn decode_users(
    text: &str,
    mut accounts: AccountIndex,
    capacity: usize,
    warnings: &mut Vec<String>,
) -> AccountRegistry {
    let mut registry = AccountRegistry::with_capacity(capacity);
    for (line_no, fields) in records(text) {
        let mut user = match parse_user(&fields) {
            Ok(user) => user,
            Err(reason) => {
                malformed(warnings, "users", line_no, reason);
                continue;
            }
        };
        for (account_line, account) in accounts.accounts.remove(&user.id).unwrap_or_default() {
            let number = account.number().to_string();
            if let Err(err) = user.add_account(account) {
                malformed(warnings, "accounts", account_line, format!("`{}`: {}", number, err));
            }
        }
        let username = user.username.clone();
        if let Err(err) = registry.add_user(user) {
            malformed(warnings, "users", line_no, format!("`{}`: {}", username, err));
        }
    }
    for user_id in accounts.order {
        if let Some(orphaned) = accounts.accounts.get(&user_id) {
            orphan(
                warnings,
                format!("{} account(s) reference unknown user `{}`", orphaned.len(), user_id),
            );
        }
    }
    registry
}

/// Runs all three decode stages in dependency order.
pub fn decode_registry(
    users: &str,
    accounts: &str,
    transactions: &str,
    config: &SystemConfiguration,
    capacity: usize,
) -> (AccountRegistry, Vec<String>) {
    let mut warnings = Vec::new();
    let by_account = decode_transactions(transactions, &mut warnings);
    let by_user = decode_accounts(accounts, by_account, config, &mut warnings);
    let registry = decode_users(users, by_user, capacity, &mut warnings);
    (registry, warnings)
}

fn parse_transaction(fields: &[&str]) -> Result<(String, Transaction), String> {
    if fields.len() < TRANSACTION_FIELDS {
        return Err(field_count(TRANSACTION_FIELDS, fields.len()));
    }
    let number = non_empty("account number", fields[0])?;
    let amount = decimal("amount", fields[1])?;
    let kind = fields[2].parse::<TransactionKind>()?;
    let date = parse_date(fields[3]).ok_or_else(|| format!("invalid date `{}`", fields[3]))?;
    Ok((number, Transaction::new(amount, kind, date)))
}

fn parse_account(
    fields: &[&str],
    config: &SystemConfiguration,
) -> Result<(String, String, AccountKind, Decimal), String> {
    if fields.len() < ACCOUNT_FIELDS {
        return Err(field_count(ACCOUNT_FIELDS, fields.len()));
    }
    let user_id = non_empty("user id", fields[0])?;
    let account_type = fields[1].parse::<AccountType>()?;
    let number = non_empty("account number", fields[2])?;
    let balance = decimal("balance", fields[3])?;
    let kind = match account_type {
        AccountType::Savings => AccountKind::Savings {
            interest_rate: optional_decimal(fields, 4, "interest rate")?
                .unwrap_or_else(|| config.default_savings_interest_rate()),
            max_withdrawals_per_month: match fields.get(5).map(|f| f.trim()) {
                Some(raw) if !raw.is_empty() => raw
                    .parse::<u32>()
                    .map_err(|_| format!("invalid withdrawal limit `{}`", raw))?,
                _ => config.default_savings_max_withdrawals(),
            },
        },
        AccountType::Checking => AccountKind::Checking {
            overdraft_limit: optional_decimal(fields, 4, "overdraft limit")?
                .unwrap_or_else(|| config.default_checking_overdraft_limit()),
            overdraft_fee: optional_decimal(fields, 5, "overdraft fee")?
                .unwrap_or_else(|| config.default_checking_overdraft_fee()),
        },
    };
    Ok((user_id, number, kind, balance))
}

/// Replaces every policy value the account setters would refuse with the
/// configured default, returning the reasons.
fn checked_policy(kind: AccountKind, config: &SystemConfiguration) -> (AccountKind, Vec<String>) {
    let mut rejected = Vec::new();
    let mut keep = |check: Result<(), AccountError>| match check {
        Ok(()) => true,
        Err(err) => {
            rejected.push(format!("{}, using default", err));
            false
        }
    };
    let kind = match kind {
        AccountKind::Savings {
            interest_rate,
            max_withdrawals_per_month,
        } => AccountKind::Savings {
            interest_rate: if keep(check_interest_rate(interest_rate)) {
                interest_rate
            } else {
                config.default_savings_interest_rate()
            },
            max_withdrawals_per_month: if keep(check_max_withdrawals(max_withdrawals_per_month)) {
                max_withdrawals_per_month
            } else {
                config.default_savings_max_withdrawals()
            },
        },
        AccountKind::Checking {
            overdraft_limit,
            overdraft_fee,
        } => AccountKind::Checking {
            overdraft_limit: if keep(check_overdraft_limit(overdraft_limit)) {
                overdraft_limit
            } else {
                config.default_checking_overdraft_limit()
            },
            overdraft_fee: if keep(check_overdraft_fee(overdraft_fee)) {
                overdraft_fee
            } else {
                config.default_checking_overdraft_fee()
            },
        },
    };
    (kind, rejected)
}

fn parse_user(fields: &[&str]) -> Result<User, String> {
    if fields.len() < USER_FIELDS {
        return Err(field_count(USER_FIELDS, fields.len()));
    }
    let role = fields[0].parse::<Role>()?;
    let id = non_empty("user id", fields[1])?;
    let username = non_empty("username", fields[2])?;
    Ok(User::with_role(
        id,
        username,
        fields[3].trim(),
        fields[4].trim(),
        role,
    ))
}

/// Non-blank lines split on the delimiter, with 1-based line numbers.
fn records(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line.split(DELIMITER).collect()))
}

fn decimal(name: &str, raw: &str) -> Result<Decimal, String> {
    parse_decimal(raw).ok_or_else(|| format!("invalid {} `{}`", name, raw.trim()))
}

fn optional_decimal(
    fields: &[&str],
    index: usize,
    name: &str,
) -> Result<Option<Decimal>, String> {
    match fields.get(index).map(|f| f.trim()) {
        Some(raw) if !raw.is_empty() => decimal(name, raw).map(Some),
        _ => Ok(None),
    }
}

fn non_empty(name: &str, raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(format!("empty {}", name))
    } else {
        Ok(trimmed.to_string())
    }
}

fn field_count(expected: usize, found: usize) -> String {
    format!("expected at least {} fields, found {}", expected, found)
}

fn check_field(name: &str, value: &str) -> Result<(), String> {
    if value.contains(DELIMITER) || value.contains('\n') || value.contains('\r') {
        Err(format!("{} contains a delimiter or line break", name))
    } else {
        Ok(())
    }
}

fn join(fields: &[&str]) -> String {
    fields.join(&DELIMITER.to_string())
}

fn push_line(buffer: &mut String, line: &str) {
    buffer.push_str(line);
    buffer.push('\n');
}

fn skip(skipped: &mut Vec<String>, message: String) {
    warn!("skipping record on save: {}", message);
    skipped.push(message);
}

fn malformed(warnings: &mut Vec<String>, file: &str, line_no: usize, reason: String) {
    let message = format!("{}.txt line {}: {}", file, line_no, reason);
    warn!("skipping record on load: {}", message);
    warnings.push(message);
}

fn defaulted(warnings: &mut Vec<String>, file: &str, line_no: usize, reason: String) {
    let message = format!("{}.txt line {}: {}", file, line_no, reason);
    warn!("policy value replaced on load: {}", message);
    warnings.push(message);
}

fn orphan(warnings: &mut Vec<String>, message: String) {
    warn!("orphaned records on load: {}", message);
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_ACCOUNTS_PER_USER;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    #[test]
    fn record_layouts() {
        let config = SystemConfiguration::default();
        let mut user = User::new("42", "dana", "5f4d", "dana@example.com");
        user.open_account(AccountType::Savings, &config, dec!(1500.25), date())
            .unwrap();
        user.open_account(AccountType::Checking, &config, dec!(10), date())
            .unwrap();

        insta::assert_snapshot!(encode_user(&user).unwrap(), @"REGULAR|42|dana|5f4d|dana@example.com");
        insta::assert_snapshot!(
            encode_account(&user.id, &user.accounts()[0]).unwrap(),
            @"42|SAVINGS|SA-42-1|1500.25|0.03|3"
        );
        insta::assert_snapshot!(
            encode_account(&user.id, &user.accounts()[1]).unwrap(),
            @"42|CHECKING|CA-42-2|10|500|35"
        );
        insta::assert_snapshot!(
            encode_transaction("SA-42-1", user.accounts()[0].transaction(0).unwrap()).unwrap(),
            @"SA-42-1|1500.25|INITIAL DEPOSIT|01/31/2025"
        );
    }

    #[test]
    fn delimiter_in_field_is_rejected() {
        let user = User::new("1", "pipe|name", "hash", "a@b");
        assert!(encode_user(&user).is_err());

        let mut registry = AccountRegistry::new();
        registry.add_user(user).unwrap();
        let encoded = encode_registry(&registry);
        assert!(encoded.users.is_empty());
        assert_eq!(encoded.skipped.len(), 1);
        let deposit = Transaction::new(dec!(5), TransactionKind::Deposit, date());
        assert!(encode_transaction("SA|1", &deposit).is_err());
    }

    #[test]
    fn missing_policy_fields_use_configured_defaults() {
        let mut config = SystemConfiguration::default();
        config.set_default_savings_max_withdrawals(5).unwrap();
        let (registry, warnings) = decode_registry(
            "REGULAR|9|eve|h|e@x\n",
            "9|SAVINGS|SA-9-1|100\n9|CHECKING|CA-9-2|-20|250\n",
            "",
            &config,
            10,
        );
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        let user = registry.find_by_id("9").unwrap();
        assert_eq!(
            user.accounts()[0].kind(),
            &AccountKind::Savings {
                interest_rate: dec!(0.03),
                max_withdrawals_per_month: 5
            }
        );
        assert_eq!(
            user.accounts()[1].kind(),
            &AccountKind::Checking {
                overdraft_limit: dec!(250),
                overdraft_fee: dec!(35)
            }
        );
    }

    #[test]
    fn out_of_range_policies_fall_back_to_defaults() {
        let config = SystemConfiguration::default();
        let (registry, warnings) = decode_registry(
            "REGULAR|1|fay|h|f@x\n",
            "1|SAVINGS|SA-1-1|100|-0.5|0\n1|CHECKING|CA-1-2|10|-100|-5\n",
            "",
            &config,
            10,
        );
        assert_eq!(warnings.len(), 4, "warnings: {:?}", warnings);
        assert!(warnings.iter().all(|w| w.starts_with("accounts.txt line ")));

        let savings = registry.find_by_account_number("SA-1-1").unwrap();
        assert_eq!(savings.kind(), &AccountKind::savings_from(&config));
        let checking = registry.find_by_account_number("CA-1-2").unwrap();
        assert_eq!(checking.kind(), &AccountKind::checking_from(&config));
        assert_eq!(checking.available_funds(), dec!(510));

        let mut savings = savings.clone();
        assert!(savings.withdraw_on(dec!(1), date()).is_ok());
    }

    #[test]
    fn repeated_account_number_is_skipped() {
        let config = SystemConfiguration::default();
        let (registry, warnings) = decode_registry(
            "REGULAR|1|gil|h|g@x\nREGULAR|2|hana|h|h@x\n",
            "1|CHECKING|CA-1-1|40\n2|CHECKING|CA-1-1|70\n",
            "CA-1-1|40|INITIAL DEPOSIT|01/02/2025\n",
            &config,
            10,
        );
        assert_eq!(
            warnings,
            vec!["accounts.txt line 2: duplicate account number `CA-1-1`".to_string()]
        );
        assert_eq!(registry.accounts().count(), 1);
        assert_eq!(registry.owner_of("CA-1-1").unwrap().id, "1");
        let account = registry.find_by_account_number("CA-1-1").unwrap();
        assert_eq!(account.balance(), account.transactions().net_total());
    }

    #[test]
    fn attach_failures_cite_the_account_line() {
        let config = SystemConfiguration::default();
        let accounts: String = (1..=MAX_ACCOUNTS_PER_USER + 1)
            .map(|seq| format!("5|CHECKING|CA-5-{}|0\n", seq))
            .collect();
        let (registry, warnings) = decode_registry("REGULAR|5|ida|h|i@x\n", &accounts, "", &config, 10);
        assert_eq!(registry.accounts().count(), MAX_ACCOUNTS_PER_USER);
        assert_eq!(warnings.len(), 1, "warnings: {:?}", warnings);
        assert!(
            warnings[0].starts_with(&format!("accounts.txt line {}:", MAX_ACCOUNTS_PER_USER + 1)),
            "unexpected warning {}",
            warnings[0]
        );
    }

    #[test]
    fn orphans_and_malformed_lines_are_reported() {
        let config = SystemConfiguration::default();
        let (registry, warnings) = decode_registry(
            "ADMIN|1|root|h|r@x\nREGULAR|2\n",
            "1|CHECKING|CA-1-1|5.0E1\n3|SAVINGS|SA-3-1|10\n1|BROKERAGE|BA-1-9|1\n",
            "CA-1-1|50|DEPOSIT|02/01/2025\nXX-1-1|5|DEPOSIT|02/01/2025\nCA-1-1|oops|DEPOSIT|02/01/2025\n",
            &config,
            10,
        );
        assert_eq!(registry.count(), 1);
        let account = registry.find_by_account_number("CA-1-1").unwrap();
        assert_eq!(account.balance(), dec!(50));
        assert_eq!(account.transaction_count(), 1);
        assert_eq!(registry.find_by_id("1").unwrap().role, Role::Admin);
        // bad amount, unknown type, short user line, two orphan groups
        assert_eq!(warnings.len(), 5, "warnings: {:?}", warnings);
    }
}
