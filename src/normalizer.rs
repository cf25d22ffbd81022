//! Budgeting-tool exports → canonical per-ledger statement slices.
//!
//! An export row carries `Outflow`/`Inflow` columns and a combined
//! `"<master>: <subcategory>"` category. Transfers to the cash account are
//! mirrored into the cash ledger together with a discretionary-spend
//! placeholder, so withdrawn cash counts as spent until it is reclassified.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::Result;
use crate::ledger::{header_index, parse_amount, parse_date};
use crate::models::{StatementSlice, Transaction};
use crate::settings::Settings;

pub const BUDGET_HEADER: [&str; 6] = ["Date", "Payee", "Category", "Memo", "Outflow", "Inflow"];

const PLACEHOLDER_MASTER: &str = "Monthly";
const PLACEHOLDER_SUBCATEGORY: &str = "Discretionary";

/// One row of a budgeting-tool export, fields still raw.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BudgetRow {
    pub line: usize,
    pub date: String,
    pub payee: String,
    pub category: String,
    pub memo: String,
    pub outflow: String,
    pub inflow: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub source_account: String,
    pub source_ledger: String,
    pub transfer_payee: String,
    pub transfer_account: String,
    pub transfer_ledger: String,
    pub placeholder_payee: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Settings::default().normalize_options()
    }
}

/// A row dropped during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub slices: Vec<StatementSlice>,
    pub rejected: Vec<RejectedRow>,
}

impl Normalized {
    pub fn slice(&self, ledger: &str) -> Option<&StatementSlice> {
        self.slices.iter().find(|s| s.ledger == ledger)
    }
}

pub fn read_budget_export(path: &Path) -> Result<Vec<BudgetRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = header_index(&headers, &["Date", "Payee", "Category", "Outflow", "Inflow"], path)?;
    let memo_idx = header_index(&headers, &["Memo"], path).ok().map(|v| v[0]);

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let field = |n: usize| record.get(idx[n]).unwrap_or("").to_string();
        rows.push(BudgetRow {
            line: i + 2,
            date: field(0),
            payee: field(1),
            category: field(2),
            memo: memo_idx
                .and_then(|m| record.get(m))
                .unwrap_or("")
                .to_string(),
            outflow: field(3),
            inflow: field(4),
        });
    }
    Ok(rows)
}

/// Split `"<master>: <subcategory>"` on the first colon.
pub fn split_category(raw: &str) -> (String, String) {
    match raw.split_once(':') {
        Some((master, sub)) => (master.trim().to_string(), sub.trim().to_string()),
        None => (raw.trim().to_string(), String::new()),
    }
}

fn money_field(raw: &str, name: &str) -> std::result::Result<Decimal, String> {
    if raw.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    parse_amount(raw).ok_or_else(|| format!("non-numeric {name} '{}'", raw.trim()))
}

fn parse_row(row: &BudgetRow) -> std::result::Result<(NaiveDate, Decimal), String> {
    let date = parse_date(&row.date).ok_or_else(|| format!("bad date '{}'", row.date.trim()))?;
    let outflow = money_field(&row.outflow, "outflow")?;
    let inflow = money_field(&row.inflow, "inflow")?;
    Ok((date, inflow - outflow))
}

pub fn normalize(
    rows: &[BudgetRow],
    statement_date: NaiveDate,
    opts: &NormalizeOptions,
) -> Normalized {
    let mut source = Vec::with_capacity(rows.len());
    let mut secondary = Vec::new();
    let mut rejected = Vec::new();

    for row in rows {
        let (transaction_date, amount) = match parse_row(row) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!("...dropping line {} of {statement_date} export: {reason}", row.line);
                rejected.push(RejectedRow {
                    line: row.line,
                    reason,
                });
                continue;
            }
        };
        let payee = row.payee.trim().to_string();
        let memo = row.memo.trim().to_string();
        let is_transfer = payee == opts.transfer_payee;

        let category = if is_transfer {
            format!("Transfer-out: {}", opts.transfer_account)
        } else {
            row.category.clone()
        };
        let (master_category, subcategory) = split_category(&category);

        if is_transfer {
            let mirror = Transaction {
                account: opts.transfer_account.clone(),
                transaction_date,
                payee: format!("Transfer : {}", opts.source_account),
                master_category: "Transfer-in".to_string(),
                subcategory: opts.source_account.clone(),
                memo: memo.clone(),
                amount: -amount,
            };
            let placeholder = Transaction {
                payee: opts.placeholder_payee.clone(),
                master_category: PLACEHOLDER_MASTER.to_string(),
                subcategory: PLACEHOLDER_SUBCATEGORY.to_string(),
                amount: -mirror.amount,
                ..mirror.clone()
            };
            secondary.push(mirror);
            secondary.push(placeholder);
        }

        source.push(Transaction {
            account: opts.source_account.clone(),
            transaction_date,
            payee,
            master_category,
            subcategory,
            memo,
            amount,
        });
    }

    secondary.sort_by(|a, b| {
        a.transaction_date
            .cmp(&b.transaction_date)
            .then(a.amount.cmp(&b.amount))
    });

    info!(
        "...{statement_date}: {} {} rows, {} {} rows, {} rejected",
        source.len(),
        opts.source_ledger,
        secondary.len(),
        opts.transfer_ledger,
        rejected.len()
    );

    let mut slices = vec![StatementSlice {
        ledger: opts.source_ledger.clone(),
        statement_date,
        rows: source,
    }];
    if !secondary.is_empty() {
        slices.push(StatementSlice {
            ledger: opts.transfer_ledger.clone(),
            statement_date,
            rows: secondary,
        });
    }
    Normalized { slices, rejected }
}
