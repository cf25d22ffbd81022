//! Balance reconciliation against statement checkpoints.
//!
//! Monthly mode compares one statement's net movement with its checkpoint.
//! Full-history mode rebuilds the running balance of a whole master ledger
//! and checks the end-of-day balance on every reconcilable checkpoint date:
//!
//! 1. [`running_balances`]: stable date sort, cumulative balance, end-of-day marks
//! 2. [`horizon`]: split checkpoints into in-range and pending
//! 3. [`inject_placeholders`]: zero rows on checkpoint dates with no activity
//! 4. [`forward_fill`]: carry the last end-of-day balance onto those rows
//! 5. [`compare`]: rounded closing balance vs end-of-day balance
//!
//! Rows sharing a date keep file order; intra-day ordering is not knowable
//! from the inputs.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::checkpoints::Checkpoints;
use crate::error::{ReckonError, Result};
use crate::fmt::plain;
use crate::ledger::write_csv;
use crate::models::{Checkpoint, Transaction};

pub const DIAGNOSTIC_HEADER: [&str; 7] = [
    "transaction_date",
    "payee",
    "amount",
    "balance",
    "eod_balance",
    "closing_balance",
    "match",
];

fn cents(val: Decimal) -> Decimal {
    val.round_dp(2)
}

// ---------------------------------------------------------------------------
// Monthly mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCheck {
    pub statement_date: NaiveDate,
    pub expected: Decimal,
    pub actual: Decimal,
}

impl MonthlyCheck {
    pub fn is_reconciled(&self) -> bool {
        self.expected == self.actual
    }

    pub fn discrepancy(&self) -> Decimal {
        self.actual - self.expected
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_reconciled() {
            Ok(self)
        } else {
            error!(
                "...statement {} is off by {}",
                self.statement_date,
                plain(self.discrepancy())
            );
            Err(ReckonError::StatementMismatch {
                statement_date: self.statement_date,
                expected: plain(self.expected),
                actual: plain(self.actual),
            })
        }
    }
}

fn total(rows: &[Transaction]) -> Decimal {
    rows.iter().map(|t| t.amount).sum()
}

/// Net movement of one statement slice against its checkpoint.
pub fn validate_monthly(
    slice: &[Transaction],
    statement_date: NaiveDate,
    checkpoints: &Checkpoints,
) -> Result<MonthlyCheck> {
    let cp = checkpoints.get(statement_date).ok_or_else(|| {
        ReckonError::Config(format!("no checkpoint for statement date {statement_date}"))
    })?;
    let check = MonthlyCheck {
        statement_date,
        expected: cents(cp.net_change()),
        actual: cents(total(slice)),
    };
    debug!("...opening balance: {}", cp.opening_balance);
    debug!("...closing balance: {}", cp.closing_balance);
    debug!("...expected total: {}, actual total: {}", check.expected, check.actual);
    Ok(check)
}

/// Cash slices have no statement; the mirror and placeholder rows of every
/// transfer cancel out, so a complete slice nets to zero.
pub fn validate_net_zero(slice: &[Transaction], statement_date: NaiveDate) -> MonthlyCheck {
    let check = MonthlyCheck {
        statement_date,
        expected: Decimal::ZERO,
        actual: cents(total(slice)),
    };
    debug!("...actual net amount: {}", check.actual);
    check
}

// ---------------------------------------------------------------------------
// Full-history passes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub txn: Transaction,
    pub balance: Decimal,
    /// `None` until known: placeholders get theirs from [`forward_fill`].
    pub eod_balance: Option<Decimal>,
    pub end_of_day: bool,
    pub placeholder: bool,
}

pub fn running_balances(ledger: &[Transaction], starting_balance: Decimal) -> Vec<BalanceRow> {
    let mut sorted: Vec<&Transaction> = ledger.iter().collect();
    sorted.sort_by_key(|t| t.transaction_date);

    let mut balance = starting_balance;
    let mut rows: Vec<BalanceRow> = sorted
        .into_iter()
        .map(|txn| {
            balance += txn.amount;
            BalanceRow {
                txn: txn.clone(),
                balance,
                eod_balance: None,
                end_of_day: false,
                placeholder: false,
            }
        })
        .collect();

    let mut start = 0;
    while start < rows.len() {
        let date = rows[start].txn.transaction_date;
        let end = rows[start..]
            .iter()
            .position(|r| r.txn.transaction_date != date)
            .map_or(rows.len(), |n| start + n);
        let eod = rows[end - 1].balance;
        for row in &mut rows[start..end] {
            row.eod_balance = Some(eod);
        }
        rows[end - 1].end_of_day = true;
        start = end;
    }
    rows
}

/// Which checkpoints the available transactions can speak for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Horizon {
    /// Earliest checkpoint on or after the last transaction date, if any.
    pub date: Option<NaiveDate>,
    pub in_range: Vec<Checkpoint>,
    /// Checkpoints beyond the horizon, waiting on more statements.
    pub pending: Vec<Checkpoint>,
}

pub fn horizon(max_txn_date: NaiveDate, checkpoints: &Checkpoints) -> Horizon {
    let date = checkpoints
        .iter()
        .map(|c| c.statement_date)
        .find(|d| *d >= max_txn_date);
    let (in_range, pending) = checkpoints
        .iter()
        .partition(|c| date.map_or(true, |h| c.statement_date <= h));
    Horizon {
        date,
        in_range,
        pending,
    }
}

/// Add a zero-amount row on every in-range checkpoint date that has no
/// transactions, so each checkpoint has a row to compare against. The
/// placeholder takes the account of the latest real row before it.
pub fn inject_placeholders(mut rows: Vec<BalanceRow>, in_range: &[Checkpoint]) -> Vec<BalanceRow> {
    let fallback_account = rows.first().map(|r| r.txn.account.clone()).unwrap_or_default();
    let mut added = Vec::new();
    for cp in in_range {
        let date = cp.statement_date;
        if rows.iter().any(|r| r.txn.transaction_date == date) {
            continue;
        }
        let account = rows
            .iter()
            .rev()
            .find(|r| r.txn.transaction_date < date)
            .map_or_else(|| fallback_account.clone(), |r| r.txn.account.clone());
        added.push(BalanceRow {
            txn: Transaction {
                account,
                transaction_date: date,
                payee: String::new(),
                master_category: String::new(),
                subcategory: String::new(),
                memo: String::new(),
                amount: Decimal::ZERO,
            },
            balance: Decimal::ZERO,
            eod_balance: None,
            end_of_day: true,
            placeholder: true,
        });
    }
    if !added.is_empty() {
        debug!("...{} placeholder rows added on checkpoint dates", added.len());
    }
    rows.extend(added);
    rows.sort_by_key(|r| r.txn.transaction_date);
    rows
}

/// Give every row without an end-of-day balance the most recent known one.
/// Placeholders carry no amount, so their running balance is the same value.
pub fn forward_fill(rows: &mut [BalanceRow], starting_balance: Decimal) {
    let mut last = starting_balance;
    for row in rows.iter_mut() {
        match row.eod_balance {
            Some(eod) => last = eod,
            None => {
                row.eod_balance = Some(last);
                if row.placeholder {
                    row.balance = last;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMismatch {
    pub statement_date: NaiveDate,
    pub expected: Decimal,
    pub actual: Decimal,
}

impl CheckpointMismatch {
    pub fn difference(&self) -> Decimal {
        self.actual - self.expected
    }
}

pub fn compare(rows: &[BalanceRow], in_range: &[Checkpoint]) -> Vec<CheckpointMismatch> {
    let mut mismatches = Vec::new();
    for cp in in_range {
        let Some(row) = rows
            .iter()
            .find(|r| r.txn.transaction_date == cp.statement_date)
        else {
            continue;
        };
        let expected = cents(cp.closing_balance);
        let actual = cents(row.eod_balance.unwrap_or_default());
        if expected != actual {
            mismatches.push(CheckpointMismatch {
                statement_date: cp.statement_date,
                expected,
                actual,
            });
        }
    }
    mismatches
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRow {
    pub transaction_date: NaiveDate,
    pub payee: String,
    pub amount: Decimal,
    pub balance: Decimal,
    pub eod_balance: Decimal,
    pub closing_balance: Option<Decimal>,
    pub matched: bool,
}

pub fn diagnostics(rows: &[BalanceRow], in_range: &[Checkpoint]) -> Vec<DiagnosticRow> {
    let closing: HashMap<NaiveDate, Decimal> = in_range
        .iter()
        .map(|c| (c.statement_date, c.closing_balance))
        .collect();
    rows.iter()
        .map(|r| {
            let eod_balance = r.eod_balance.unwrap_or_default();
            let closing_balance = closing.get(&r.txn.transaction_date).copied();
            DiagnosticRow {
                transaction_date: r.txn.transaction_date,
                payee: r.txn.payee.clone(),
                amount: r.txn.amount,
                balance: r.balance,
                eod_balance,
                closing_balance,
                matched: closing_balance.is_some_and(|c| cents(c) == cents(eod_balance)),
            }
        })
        .collect()
}

pub fn write_diagnostics(path: &Path, rows: &[DiagnosticRow]) -> Result<()> {
    write_csv(
        path,
        &DIAGNOSTIC_HEADER,
        rows.iter().map(|r| {
            [
                r.transaction_date.format("%Y-%m-%d").to_string(),
                r.payee.clone(),
                plain(r.amount),
                plain(r.balance),
                plain(r.eod_balance),
                r.closing_balance.map(plain).unwrap_or_default(),
                if r.matched { "True" } else { "False" }.to_string(),
            ]
        }),
    )
}

// ---------------------------------------------------------------------------
// Full-history mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FinalBalance {
    pub expected: Decimal,
    pub actual: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullReport {
    pub checked: usize,
    pub horizon: Option<NaiveDate>,
    pub pending: Vec<Checkpoint>,
    pub mismatches: Vec<CheckpointMismatch>,
    /// Populated only when there are mismatches.
    pub diagnostics: Vec<DiagnosticRow>,
    /// Observability only; never affects the verdict.
    pub final_balance: Option<FinalBalance>,
}

impl FullReport {
    pub fn is_reconciled(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    pub starting_balance: Decimal,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_starting_balance(starting_balance: Decimal) -> Self {
        Self { starting_balance }
    }

    /// Rows after placeholder injection and forward fill, with the horizon
    /// used to pick them.
    pub fn balance_rows(
        &self,
        ledger: &[Transaction],
        checkpoints: &Checkpoints,
    ) -> (Vec<BalanceRow>, Horizon) {
        let rows = running_balances(ledger, self.starting_balance);
        let Some(max_txn_date) = rows.last().map(|r| r.txn.transaction_date) else {
            let all = Horizon {
                date: None,
                in_range: Vec::new(),
                pending: checkpoints.iter().copied().collect(),
            };
            return (rows, all);
        };
        let horizon = horizon(max_txn_date, checkpoints);
        let mut rows = inject_placeholders(rows, &horizon.in_range);
        forward_fill(&mut rows, self.starting_balance);
        (rows, horizon)
    }

    pub fn validate_full(&self, ledger: &[Transaction], checkpoints: &Checkpoints) -> FullReport {
        let (rows, horizon) = self.balance_rows(ledger, checkpoints);
        match horizon.date {
            Some(date) => info!("...horizon checkpoint: {date}"),
            None if rows.is_empty() => info!("...empty ledger, nothing to reconcile"),
            None => info!("...no checkpoint on or after the last transaction"),
        }
        if !horizon.pending.is_empty() {
            warn!(
                "...{} checkpoint(s) pending sufficient data, first {}",
                horizon.pending.len(),
                horizon.pending[0].statement_date
            );
        }

        let mismatches = compare(&rows, &horizon.in_range);
        let mut report = FullReport {
            checked: horizon.in_range.len(),
            horizon: horizon.date,
            pending: horizon.pending.clone(),
            mismatches,
            diagnostics: Vec::new(),
            final_balance: None,
        };

        if !report.is_reconciled() {
            for m in &report.mismatches {
                warn!(
                    "...{}: closing balance {} but end of day balance {}",
                    m.statement_date, m.expected, m.actual
                );
            }
            report.diagnostics = diagnostics(&rows, &horizon.in_range);
            return report;
        }

        if let Some(last) = horizon.in_range.last() {
            let fb = FinalBalance {
                expected: cents(last.closing_balance),
                actual: cents(self.starting_balance + total(ledger)),
            };
            info!(
                "...expected final balance: {}, actual final balance: {}",
                fb.expected, fb.actual
            );
            report.final_balance = Some(fb);
        }
        report
    }
}
