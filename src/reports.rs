use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::Datelike;
use rust_decimal::Decimal;
use tracing::info;

use crate::categories::CategoryDimension;
use crate::error::{ReckonError, Result};
use crate::fmt::plain;
use crate::ledger::{header_index, parse_amount, write_csv};
use crate::models::Transaction;

/// Open-ended budget bounds, replaced by the first/last month on record.
const OPEN_START: u32 = 190001;
const OPEN_END: u32 = 999912;

/// A budget amount of -1 means "budget whatever was spent".
const MATCH_ACTUAL: Decimal = Decimal::NEGATIVE_ONE;

fn year_month(txn: &Transaction) -> u32 {
    txn.transaction_date.year() as u32 * 100 + txn.transaction_date.month()
}

fn next_month(ym: u32) -> u32 {
    if ym % 100 >= 12 {
        (ym / 100 + 1) * 100 + 1
    } else {
        ym + 1
    }
}

fn months_between(start: u32, end: u32) -> Vec<u32> {
    let mut out = Vec::new();
    let mut ym = start;
    while ym <= end {
        out.push(ym);
        ym = next_month(ym);
    }
    out
}

/// Spend shown as a positive number; income counts as nothing spent.
fn spend(amount: Decimal) -> Decimal {
    if amount < Decimal::ZERO {
        -amount
    } else {
        Decimal::ZERO
    }
}

// ---------------------------------------------------------------------------
// Combined transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub txn: Transaction,
    pub category: String,
    pub year_month: u32,
}

/// All master ledgers as one table. Zero-amount rows carry no information
/// for reporting and are left out.
pub fn combine(ledgers: &[Vec<Transaction>]) -> Vec<CombinedRow> {
    let mut rows: Vec<CombinedRow> = ledgers
        .iter()
        .flatten()
        .filter(|t| !t.amount.is_zero())
        .map(|t| CombinedRow {
            category: format!("{}: {}", t.master_category, t.subcategory),
            year_month: year_month(t),
            txn: t.clone(),
        })
        .collect();
    rows.sort_by_key(|r| r.txn.transaction_date);
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub category: String,
    pub year_month: u32,
    pub amount: Decimal,
}

pub fn monthly_totals(rows: &[CombinedRow]) -> Vec<MonthlyTotal> {
    let mut totals: BTreeMap<(String, u32), Decimal> = BTreeMap::new();
    for r in rows {
        *totals.entry((r.category.clone(), r.year_month)).or_default() += r.txn.amount;
    }
    totals
        .into_iter()
        .map(|((category, year_month), amount)| MonthlyTotal {
            category,
            year_month,
            amount,
        })
        .collect()
}

pub fn overall_totals(rows: &[CombinedRow]) -> Vec<(String, Decimal)> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for r in rows {
        *totals.entry(r.category.clone()).or_default() += r.txn.amount;
    }
    totals.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLine {
    pub category: String,
    pub start: u32,
    pub end: u32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetValue {
    pub category: String,
    pub year_month: u32,
    pub amount: Decimal,
}

pub fn read_budget(path: &Path) -> Result<Vec<BudgetLine>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = header_index(&headers, &["category", "start", "end", "amount"], path)?;
    let mut lines = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |n: usize| record.get(idx[n]).unwrap_or("").trim();
        let bad = |what: &str| ReckonError::Parse {
            line: i + 2,
            message: format!("{}: bad {what}", path.display()),
        };
        lines.push(BudgetLine {
            category: field(0).to_string(),
            start: field(1).parse().map_err(|_| bad("start"))?,
            end: field(2).parse().map_err(|_| bad("end"))?,
            amount: parse_amount(field(3)).ok_or_else(|| bad("amount"))?,
        });
    }
    Ok(lines)
}

/// One value per category and month, with open bounds clamped to
/// `first_year`-01 and `last_year`-12. Zero budgets are dropped.
pub fn expand_budget(lines: &[BudgetLine], first_year: u32, last_year: u32) -> Vec<BudgetValue> {
    let mut values = Vec::new();
    for line in lines.iter().filter(|l| !l.amount.is_zero()) {
        let start = if line.start == OPEN_START {
            first_year * 100 + 1
        } else {
            line.start
        };
        let end = if line.end == OPEN_END {
            last_year * 100 + 12
        } else {
            line.end
        };
        values.extend(months_between(start, end).into_iter().map(|year_month| BudgetValue {
            category: line.category.clone(),
            year_month,
            amount: line.amount,
        }));
    }
    values
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetActual {
    pub master_category: String,
    pub subcategory: String,
    pub category: String,
    pub year_month: u32,
    pub budget: Decimal,
    pub actual: Decimal,
    pub budget_running_total: Decimal,
    pub actual_running_total: Decimal,
    pub balance: Decimal,
}

/// Every dimension category for every month of `first_year..=last_year`,
/// with budget, actual spend and per-category running totals.
pub fn budget_vs_actual(
    dimension: &CategoryDimension,
    budget: &[BudgetValue],
    totals: &[MonthlyTotal],
    first_year: u32,
    last_year: u32,
) -> Vec<BudgetActual> {
    let budgeted: HashMap<(&str, u32), Decimal> = budget
        .iter()
        .map(|b| ((b.category.as_str(), b.year_month), b.amount))
        .collect();
    let spent: HashMap<(&str, u32), Decimal> = totals
        .iter()
        .map(|t| ((t.category.as_str(), t.year_month), spend(t.amount)))
        .collect();

    let mut running: HashMap<String, (Decimal, Decimal)> = HashMap::new();
    let mut rows = Vec::new();
    for ym in months_between(first_year * 100 + 1, last_year * 100 + 12) {
        for entry in dimension.entries() {
            let category = format!("{}: {}", entry.master_category, entry.subcategory);
            let actual = spent.get(&(category.as_str(), ym)).copied().unwrap_or_default();
            let budget = match budgeted.get(&(category.as_str(), ym)).copied() {
                Some(b) if b == MATCH_ACTUAL => actual,
                Some(b) => b,
                None => Decimal::ZERO,
            };
            let totals = running.entry(category.clone()).or_default();
            totals.0 += budget;
            totals.1 += actual;
            rows.push(BudgetActual {
                master_category: entry.master_category.clone(),
                subcategory: entry.subcategory.clone(),
                category,
                year_month: ym,
                budget,
                actual,
                budget_running_total: totals.0,
                actual_running_total: totals.1,
                balance: totals.0 - totals.1,
            });
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub transactions: usize,
    pub categories: usize,
    pub first_year: Option<u32>,
    pub last_year: Option<u32>,
    pub files: Vec<PathBuf>,
}

pub fn write_reports(
    out_dir: &Path,
    ledgers: &[Vec<Transaction>],
    dimension: &CategoryDimension,
    budget: Option<&[BudgetLine]>,
) -> Result<ReportSummary> {
    let rows = combine(ledgers);
    let monthly = monthly_totals(&rows);
    let overall = overall_totals(&rows);
    let mut summary = ReportSummary {
        transactions: rows.len(),
        categories: rows.iter().map(|r| r.category.as_str()).collect::<BTreeSet<_>>().len(),
        first_year: rows.first().map(|r| r.year_month / 100),
        last_year: rows.last().map(|r| r.year_month / 100),
        files: Vec::new(),
    };

    let path = out_dir.join("transaction.csv");
    write_csv(
        &path,
        &[
            "account",
            "transaction_date",
            "payee",
            "master_category",
            "subcategory",
            "memo",
            "amount",
            "category",
            "year_month",
            "category_year_month",
        ],
        rows.iter().map(|r| {
            [
                r.txn.account.clone(),
                r.txn.transaction_date.format("%Y-%m-%d").to_string(),
                r.txn.payee.clone(),
                r.txn.master_category.clone(),
                r.txn.subcategory.clone(),
                r.txn.memo.clone(),
                plain(r.txn.amount),
                r.category.clone(),
                r.year_month.to_string(),
                format!("{}-{}", r.category, r.year_month),
            ]
        }),
    )?;
    summary.files.push(path);

    let path = out_dir.join("transaction_monthly_total.csv");
    write_csv(
        &path,
        &["category", "year_month", "category_year_month", "amount"],
        monthly.iter().map(|t| {
            [
                t.category.clone(),
                t.year_month.to_string(),
                format!("{}-{}", t.category, t.year_month),
                plain(t.amount),
            ]
        }),
    )?;
    summary.files.push(path);

    let path = out_dir.join("transaction_overall_total.csv");
    write_csv(
        &path,
        &["category", "amount"],
        overall.iter().map(|(c, a)| [c.clone(), plain(*a)]),
    )?;
    summary.files.push(path);

    let (Some(first), Some(last), Some(lines)) =
        (summary.first_year, summary.last_year, budget)
    else {
        info!("...no budget written");
        return Ok(summary);
    };

    let values = expand_budget(lines, first, last);
    let path = out_dir.join("budget_values.csv");
    write_csv(
        &path,
        &["category", "year_month", "category_year_month", "budget_amount"],
        values.iter().map(|b| {
            [
                b.category.clone(),
                b.year_month.to_string(),
                format!("{}-{}", b.category, b.year_month),
                plain(b.amount),
            ]
        }),
    )?;
    summary.files.push(path);

    let master = budget_vs_actual(dimension, &values, &monthly, first, last);
    let path = out_dir.join("budget_vs_actual.csv");
    write_csv(
        &path,
        &[
            "master_category",
            "subcategory",
            "category",
            "year_month",
            "budget",
            "actual",
            "budget_running_total",
            "actual_running_total",
            "balance",
        ],
        master.iter().map(|r| {
            [
                r.master_category.clone(),
                r.subcategory.clone(),
                r.category.clone(),
                r.year_month.to_string(),
                plain(r.budget),
                plain(r.actual),
                plain(r.budget_running_total),
                plain(r.actual_running_total),
                plain(r.balance),
            ]
        }),
    )?;
    summary.files.push(path);

    info!("...{} report files written to {}", summary.files.len(), out_dir.display());
    Ok(summary)
}
