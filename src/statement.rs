//! Raw bank statements → budgeting-tool import files.
//!
//! A raw statement is a headerless `date,payee,amount` CSV with day-first
//! dates, saved as `<statement_date>_txn.csv`. Running-balance lines are
//! dropped, the rest must net to the checkpoint's movement, and payees are
//! resolved to friendly names before the import file is written.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::checkpoints::Checkpoints;
use crate::error::Result;
use crate::fmt::plain;
use crate::ledger::{parse_amount, parse_date, write_csv};
use crate::models::{StatementFile, Transaction};
use crate::normalizer::{BudgetRow, RejectedRow, BUDGET_HEADER};
use crate::payees::PayeeMap;
use crate::reconciler::{validate_monthly, MonthlyCheck};

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: NaiveDate,
    pub payee: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub statement_date: NaiveDate,
    pub output: PathBuf,
    pub rows: Vec<BudgetRow>,
    pub rejected: Vec<RejectedRow>,
    pub check: MonthlyCheck,
}

pub fn import_path(file: &StatementFile) -> PathBuf {
    file.path
        .with_file_name(format!("{}_ynab.csv", file.statement_date.format("%Y-%m-%d")))
}

pub fn read_raw_statement(path: &Path) -> Result<(Vec<RawRow>, Vec<RejectedRow>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 1;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let raw_date = record.get(0).unwrap_or("").trim();
        let payee = record.get(1).unwrap_or("").trim().to_string();
        let raw_amount = record.get(2).unwrap_or("").trim();
        match (parse_date(raw_date), parse_amount(raw_amount)) {
            (Some(date), Some(amount)) => rows.push(RawRow { date, payee, amount }),
            (None, _) => rejected.push(RejectedRow {
                line,
                reason: format!("bad date '{raw_date}'"),
            }),
            (_, None) => rejected.push(RejectedRow {
                line,
                reason: format!("bad amount '{raw_amount}'"),
            }),
        }
    }
    for r in &rejected {
        warn!("...{} line {}: {}, row dropped", path.display(), r.line, r.reason);
    }
    Ok((rows, rejected))
}

/// Statements interleave running-balance lines with real activity.
pub fn drop_balance_rows(rows: Vec<RawRow>) -> Vec<RawRow> {
    rows.into_iter()
        .filter(|r| !r.payee.to_lowercase().contains("balance"))
        .collect()
}

pub fn to_budget_rows(rows: &[RawRow], payees: &PayeeMap) -> Vec<BudgetRow> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            let (payee, category) = payees.resolve(&r.payee);
            let (outflow, inflow) = if r.amount < Decimal::ZERO {
                (plain(-r.amount), String::new())
            } else if r.amount > Decimal::ZERO {
                (String::new(), plain(r.amount))
            } else {
                (String::new(), String::new())
            };
            BudgetRow {
                line: i + 2,
                date: r.date.format("%Y-%m-%d").to_string(),
                payee,
                category,
                memo: String::new(),
                outflow,
                inflow,
            }
        })
        .collect()
}

pub fn write_budget_import(path: &Path, rows: &[BudgetRow]) -> Result<()> {
    write_csv(
        path,
        &BUDGET_HEADER,
        rows.iter().map(|r| {
            [
                r.date.as_str(),
                r.payee.as_str(),
                r.category.as_str(),
                r.memo.as_str(),
                r.outflow.as_str(),
                r.inflow.as_str(),
            ]
        }),
    )
}

/// Read, clean and check one raw statement. Nothing is written.
pub fn prepare(
    file: &StatementFile,
    checkpoints: &Checkpoints,
    payees: &PayeeMap,
) -> Result<PreparedStatement> {
    let (rows, rejected) = read_raw_statement(&file.path)?;
    let rows = drop_balance_rows(rows);

    let as_txns: Vec<Transaction> = rows
        .iter()
        .map(|r| Transaction {
            account: String::new(),
            transaction_date: r.date,
            payee: r.payee.clone(),
            master_category: String::new(),
            subcategory: String::new(),
            memo: String::new(),
            amount: r.amount,
        })
        .collect();
    let check = validate_monthly(&as_txns, file.statement_date, checkpoints)?.into_result()?;
    info!("...{} is valid ({} rows)", file.statement_date, rows.len());

    Ok(PreparedStatement {
        statement_date: file.statement_date,
        output: import_path(file),
        rows: to_budget_rows(&rows, payees),
        rejected,
        check,
    })
}

/// Prepare every raw statement without an import file yet. All statements
/// are checked before any file is written.
pub fn prepare_all(
    files: &[StatementFile],
    checkpoints: &Checkpoints,
    payees: &PayeeMap,
) -> Result<Vec<PreparedStatement>> {
    let mut prepared = Vec::new();
    for file in files {
        let output = import_path(file);
        if output.exists() {
            info!("...{} exists, skipping", output.display());
            continue;
        }
        prepared.push(prepare(file, checkpoints, payees)?);
    }
    for p in &prepared {
        write_budget_import(&p.output, &p.rows)?;
        info!("...wrote {}", p.output.display());
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReckonError;
    use crate::models::Checkpoint;
    use crate::payees::{MatchType, PayeeRule};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn checkpoints() -> Checkpoints {
        Checkpoints::new(vec![Checkpoint {
            statement_date: d(2024, 1, 31),
            opening_balance: dec!(1000.00),
            closing_balance: dec!(1200.00),
        }])
        .unwrap()
    }

    fn payees() -> PayeeMap {
        PayeeMap::new(
            vec![PayeeRule::new("tesco", "Tesco", MatchType::Contains).unwrap()],
            vec![("Tesco".to_string(), "Monthly: Groceries".to_string())],
        )
    }

    fn raw_file(dir: &Path, body: &str) -> StatementFile {
        let path = dir.join("2024-01-31_txn.csv");
        std::fs::write(&path, body).unwrap();
        StatementFile {
            statement_date: d(2024, 1, 31),
            path,
        }
    }

    const JANUARY: &str = "\
01/01/2024,BALANCE BROUGHT FORWARD,1000.00
05/01/2024,ACME LTD SALARY,\"1,300.00\"
20/01/2024,TESCO STORES 2231,-1100.00
31/01/2024,Balance carried forward,1200.00
";

    #[test]
    fn test_read_raw_statement_is_day_first() {
        let dir = tempfile::tempdir().unwrap();
        let file = raw_file(dir.path(), JANUARY);
        let (rows, rejected) = read_raw_statement(&file.path).unwrap();
        assert!(rejected.is_empty());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].date, d(2024, 1, 5));
        assert_eq!(rows[1].amount, dec!(1300.00));
    }

    #[test]
    fn test_balance_rows_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let file = raw_file(dir.path(), JANUARY);
        let (rows, _) = read_raw_statement(&file.path).unwrap();
        let rows = drop_balance_rows(rows);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.payee.to_lowercase().contains("balance")));
    }

    #[test]
    fn test_budget_rows_split_outflow_and_inflow() {
        let rows = vec![
            RawRow {
                date: d(2024, 1, 20),
                payee: "TESCO STORES 2231".to_string(),
                amount: dec!(-12.5),
            },
            RawRow {
                date: d(2024, 1, 21),
                payee: "REFUND".to_string(),
                amount: dec!(3),
            },
        ];
        let out = to_budget_rows(&rows, &payees());
        assert_eq!(out[0].payee, "Tesco");
        assert_eq!(out[0].category, "Monthly: Groceries");
        assert_eq!((out[0].outflow.as_str(), out[0].inflow.as_str()), ("12.50", ""));
        assert_eq!(out[1].payee, "REFUND");
        assert_eq!((out[1].outflow.as_str(), out[1].inflow.as_str()), ("", "3.00"));
    }

    #[test]
    fn test_prepare_all_writes_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = raw_file(dir.path(), JANUARY);
        let prepared = prepare_all(&[file.clone()], &checkpoints(), &payees()).unwrap();
        assert_eq!(prepared.len(), 1);
        assert!(prepared[0].check.is_reconciled());

        let content = std::fs::read_to_string(dir.path().join("2024-01-31_ynab.csv")).unwrap();
        assert_eq!(
            content,
            "Date,Payee,Category,Memo,Outflow,Inflow\n\
             2024-01-05,ACME LTD SALARY,,,,1300.00\n\
             2024-01-20,Tesco,Monthly: Groceries,,1100.00,\n"
        );

        // second run leaves the existing file alone
        assert!(prepare_all(&[file], &checkpoints(), &payees()).unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_statement_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = raw_file(
            dir.path(),
            "05/01/2024,ACME LTD SALARY,1300.00\n20/01/2024,TESCO,-1000.00\n",
        );
        let err = prepare_all(&[file], &checkpoints(), &payees()).unwrap_err();
        assert!(matches!(err, ReckonError::StatementMismatch { .. }));
        assert!(!dir.path().join("2024-01-31_ynab.csv").exists());
    }
}
