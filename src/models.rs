use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One row of a canonical ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub account: String,
    pub transaction_date: NaiveDate,
    pub payee: String,
    pub master_category: String,
    pub subcategory: String,
    pub memo: String,
    pub amount: Decimal,
}

impl Transaction {
    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            transaction_date: self.transaction_date,
            amount: self.amount.normalize(),
            payee: self.payee.clone(),
        }
    }

    pub fn category_pair(&self) -> (String, String) {
        (self.master_category.clone(), self.subcategory.clone())
    }
}

/// Deduplication key shared by bank and cash ledgers. Account is left out on
/// purpose so the same merge runs over both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub payee: String,
}

/// Authoritative opening/closing balance pair for one statement period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub statement_date: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
}

impl Checkpoint {
    pub fn net_change(&self) -> Decimal {
        self.closing_balance - self.opening_balance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub master_category: String,
    pub subcategory: String,
    pub enabled: bool,
}

/// Transactions from one statement destined for one master ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementSlice {
    pub ledger: String,
    pub statement_date: NaiveDate,
    pub rows: Vec<Transaction>,
}

/// A per-statement slice on disk, as handed over by file discovery.
#[derive(Debug, Clone)]
pub struct StatementFile {
    pub statement_date: NaiveDate,
    pub path: PathBuf,
}
