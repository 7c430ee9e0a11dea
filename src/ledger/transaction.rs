use std::{fmt, str::FromStr};

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// On-disk date layout for transaction records.
pub const DATE_FORMAT: &str = "%m/%d/%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// A single monetary event recorded against one account.
///
/// `amount` is always an unsigned magnitude; the direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub date: NaiveDate,
}

impl Transaction {
    pub fn new(amount: Decimal, kind: TransactionKind, date: NaiveDate) -> Self {
        Self {
            amount: amount.abs(),
            kind,
            date,
        }
    }

    /// Amount with the sign applied by the transaction kind.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn details(&self) -> String {
        format!(
            "[{}] {}: ${:.2}",
            self.date.format(DATE_FORMAT),
            self.kind,
            self.amount
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    InitialDeposit,
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    Interest,
    OverdraftFee,
    /// Balance moved in from an account that was closed.
    ClosureTransfer,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 8] = [
        TransactionKind::InitialDeposit,
        TransactionKind::Deposit,
        TransactionKind::Withdrawal,
        TransactionKind::TransferIn,
        TransactionKind::TransferOut,
        TransactionKind::Interest,
        TransactionKind::OverdraftFee,
        TransactionKind::ClosureTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::InitialDeposit => "INITIAL DEPOSIT",
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::TransferIn => "TRANSFER IN",
            TransactionKind::TransferOut => "TRANSFER OUT",
            TransactionKind::Interest => "INTEREST",
            TransactionKind::OverdraftFee => "OVERDRAFT FEE",
            TransactionKind::ClosureTransfer => "ACCOUNT CLOSURE TRANSFER",
        }
    }

    /// Whether the kind increases the account balance.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::InitialDeposit
                | TransactionKind::Deposit
                | TransactionKind::TransferIn
                | TransactionKind::Interest
                | TransactionKind::ClosureTransfer
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(kind) = Self::ALL.iter().find(|kind| kind.as_str() == trimmed) {
            return Ok(*kind);
        }
        // Older files annotate closure credits with their source, e.g. "(from SA-1-1)".
        if trimmed.starts_with(TransactionKind::ClosureTransfer.as_str()) {
            return Ok(TransactionKind::ClosureTransfer);
        }
        Err(format!("unknown transaction type `{}`", trimmed))
    }
}

/// Today's date on the local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses `MM/dd/yyyy`, falling back to ISO `yyyy-MM-dd`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT))
        .ok()
}
