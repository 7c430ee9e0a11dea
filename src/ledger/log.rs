use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionKind};

/// Ordered, append-only history of one account.
///
/// Entries are kept in insertion order and are never edited or removed once
/// appended. There is no upper bound on the history length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, transaction: Transaction) {
        self.entries.push(transaction);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Transaction> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&Transaction> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.entries.iter()
    }

    /// Number of entries of `kind` dated in the given calendar month.
    ///
    /// Scans the whole log on every call (O(n)); histories are small enough
    /// that no per-month counter is kept.
    pub fn count_in_month(&self, kind: TransactionKind, year: i32, month: u32) -> usize {
        self.entries
            .iter()
            .filter(|txn| txn.kind == kind && txn.date.year() == year && txn.date.month() == month)
            .count()
    }

    /// Signed sum of every entry.
    pub fn net_total(&self) -> Decimal {
        self.entries
            .iter()
            .fold(Decimal::ZERO, |total, entry| {
                total.saturating_add(entry.signed_amount())
            })
    }
}

impl<'a> IntoIterator for &'a TransactionLog {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<Transaction> for TransactionLog {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
