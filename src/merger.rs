//! Folds statement slices into a master ledger without duplication.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::checkpoints::Checkpoints;
use crate::error::{ReckonError, Result};
use crate::ledger::{checksum, read_ledger_or_empty, write_ledger};
use crate::models::{NaturalKey, StatementSlice, Transaction};
use crate::reconciler::{write_diagnostics, FullReport, Reconciler};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub master: Vec<Transaction>,
    pub rows_added: usize,
}

/// Append the slice rows whose natural key the master doesn't already hold,
/// then re-sort by date. Two identical rows that are both new are both kept:
/// a statement can legitimately list the same purchase twice in a day.
pub fn merge(master: &[Transaction], slice: &[Transaction]) -> MergeOutcome {
    let existing: HashSet<NaturalKey> = master.iter().map(Transaction::key).collect();
    let new_rows: Vec<Transaction> = slice
        .iter()
        .filter(|t| !existing.contains(&t.key()))
        .cloned()
        .collect();
    let rows_added = new_rows.len();

    let mut merged = master.to_vec();
    merged.extend(new_rows);
    merged.sort_by_key(|t| t.transaction_date);
    MergeOutcome {
        master: merged,
        rows_added,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FoldReport {
    pub ledger: String,
    pub slices_applied: usize,
    pub rows_added: usize,
    pub written: bool,
    /// `None` when the master did not exist yet.
    pub checksum_before: Option<String>,
    pub checksum_after: Option<String>,
    /// Outcome of the last full-history check, for reconciled ledgers.
    pub reconciliation: Option<FullReport>,
}

pub struct Merger {
    reconciler: Reconciler,
    error_artifact: PathBuf,
}

impl Merger {
    pub fn new(reconciler: Reconciler, error_artifact: impl Into<PathBuf>) -> Self {
        Self {
            reconciler,
            error_artifact: error_artifact.into(),
        }
    }

    /// Merge `slices` in order against the master at `master_path`. With
    /// `checkpoints`, the whole history is re-reconciled after every slice
    /// that adds rows; a failure writes diagnostics and returns before
    /// anything is planned. Nothing touches the master until `commit`.
    pub fn plan(
        &self,
        ledger: &str,
        master_path: &Path,
        slices: &[StatementSlice],
        checkpoints: Option<&Checkpoints>,
    ) -> Result<PlannedFold> {
        let checksum_before = if master_path.exists() {
            Some(checksum(master_path)?)
        } else {
            info!("...no master for {ledger}, starting empty");
            None
        };
        let mut master = read_ledger_or_empty(master_path)?;
        let mut report = FoldReport {
            ledger: ledger.to_string(),
            checksum_before,
            ..FoldReport::default()
        };

        for slice in slices {
            let outcome = merge(&master, &slice.rows);
            info!(
                "...{} {}: {} of {} rows new",
                ledger,
                slice.statement_date,
                outcome.rows_added,
                slice.rows.len()
            );
            report.slices_applied += 1;
            if outcome.rows_added == 0 {
                continue;
            }

            if let Some(cps) = checkpoints {
                let full = self.reconciler.validate_full(&outcome.master, cps);
                if !full.is_reconciled() {
                    write_diagnostics(&self.error_artifact, &full.diagnostics)?;
                    error!(
                        "...{ledger} does not reconcile after {}, diagnostics in {}",
                        slice.statement_date,
                        self.error_artifact.display()
                    );
                    return Err(ReckonError::ReconciliationMismatch {
                        ledger: ledger.to_string(),
                        checkpoints: full.mismatches.len(),
                        artifact: self.error_artifact.clone(),
                    });
                }
                report.reconciliation = Some(full);
            }
            report.rows_added += outcome.rows_added;
            master = outcome.master;
        }

        Ok(PlannedFold {
            report,
            master,
            master_path: master_path.to_path_buf(),
        })
    }
}

/// A fold that passed reconciliation but has not been written yet.
#[derive(Debug)]
pub struct PlannedFold {
    report: FoldReport,
    master: Vec<Transaction>,
    master_path: PathBuf,
}

impl PlannedFold {
    pub fn commit(self) -> Result<FoldReport> {
        let PlannedFold {
            mut report,
            master,
            master_path,
        } = self;
        if report.rows_added == 0 {
            debug!("...{} unchanged, not written", report.ledger);
            report.checksum_after = report.checksum_before.clone();
            return Ok(report);
        }

        write_ledger(&master_path, &master)?;
        report.written = true;
        report.checksum_after = Some(checksum(&master_path)?);
        info!(
            "...{} written with {} new rows ({} total)",
            report.ledger,
            report.rows_added,
            master.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Checkpoint;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    impl Merger {
        fn fold(
            &self,
            ledger: &str,
            master_path: &Path,
            slices: &[StatementSlice],
            checkpoints: Option<&Checkpoints>,
        ) -> Result<FoldReport> {
            self.plan(ledger, master_path, slices, checkpoints)?.commit()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn txn(date: NaiveDate, payee: &str, amount: Decimal) -> Transaction {
        Transaction {
            account: "HSBC DC".to_string(),
            transaction_date: date,
            payee: payee.to_string(),
            master_category: "Monthly".to_string(),
            subcategory: "Groceries".to_string(),
            memo: String::new(),
            amount,
        }
    }

    fn slice(date: NaiveDate, rows: Vec<Transaction>) -> StatementSlice {
        StatementSlice {
            ledger: "hsbc_dc".to_string(),
            statement_date: date,
            rows,
        }
    }

    fn jan_checkpoints() -> Checkpoints {
        Checkpoints::new(vec![
            Checkpoint {
                statement_date: d(2024, 1, 31),
                opening_balance: dec!(0),
                closing_balance: dec!(100.00),
            },
            Checkpoint {
                statement_date: d(2024, 2, 29),
                opening_balance: dec!(100.00),
                closing_balance: dec!(70.00),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_merge_appends_and_sorts() {
        let master = vec![txn(d(2024, 1, 10), "a", dec!(1))];
        let incoming = vec![
            txn(d(2024, 1, 20), "c", dec!(3)),
            txn(d(2024, 1, 5), "b", dec!(2)),
        ];
        let out = merge(&master, &incoming);
        assert_eq!(out.rows_added, 2);
        let payees: Vec<&str> = out.master.iter().map(|t| t.payee.as_str()).collect();
        assert_eq!(payees, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_merge_skips_known_keys_regardless_of_account_and_scale() {
        let master = vec![txn(d(2024, 1, 10), "Tesco", dec!(-12.5))];
        let mut dup = txn(d(2024, 1, 10), "Tesco", dec!(-12.50));
        dup.account = "Other".to_string();
        dup.memo = "different memo".to_string();
        let out = merge(&master, &[dup]);
        assert_eq!(out.rows_added, 0);
        assert_eq!(out.master, master);
    }

    #[test]
    fn test_merge_keeps_new_duplicates_within_slice() {
        let row = txn(d(2024, 1, 10), "Cafe", dec!(-3.20));
        let out = merge(&[], &[row.clone(), row.clone()]);
        assert_eq!(out.rows_added, 2);
        let again = merge(&out.master, &[row.clone(), row]);
        assert_eq!(again.rows_added, 0);
    }

    #[test]
    fn test_fold_writes_then_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let master_path = dir.path().join("facts").join("transaction_hsbc_dc.csv");
        let merger = Merger::new(Reconciler::new(), dir.path().join("transaction_error.csv"));
        let cps = jan_checkpoints();
        let slices = vec![slice(
            d(2024, 1, 31),
            vec![
                txn(d(2024, 1, 3), "Employer", dec!(150.00)),
                txn(d(2024, 1, 9), "Tesco", dec!(-50.00)),
            ],
        )];

        let first = merger.fold("hsbc_dc", &master_path, &slices, Some(&cps)).unwrap();
        assert!(first.written);
        assert_eq!(first.rows_added, 2);
        assert!(first.checksum_before.is_none());
        assert!(first.reconciliation.as_ref().unwrap().is_reconciled());
        let bytes = std::fs::read(&master_path).unwrap();

        let second = merger.fold("hsbc_dc", &master_path, &slices, Some(&cps)).unwrap();
        assert!(!second.written);
        assert_eq!(second.rows_added, 0);
        assert_eq!(second.checksum_before, second.checksum_after);
        assert_eq!(second.checksum_before, first.checksum_after);
        assert_eq!(std::fs::read(&master_path).unwrap(), bytes);
    }

    #[test]
    fn test_fold_rejects_and_leaves_master_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let master_path = dir.path().join("transaction_hsbc_dc.csv");
        let artifact = dir.path().join("transaction_error.csv");
        let merger = Merger::new(Reconciler::new(), &artifact);
        let cps = jan_checkpoints();

        let jan = slice(d(2024, 1, 31), vec![txn(d(2024, 1, 3), "Employer", dec!(100.00))]);
        merger
            .fold("hsbc_dc", &master_path, &[jan], Some(&cps))
            .unwrap();
        let before = std::fs::read(&master_path).unwrap();

        // Feb should net -30.00
        let feb = slice(d(2024, 2, 29), vec![txn(d(2024, 2, 14), "Florist", dec!(-30.01))]);
        let err = merger
            .fold("hsbc_dc", &master_path, &[feb], Some(&cps))
            .unwrap_err();
        assert!(err.is_mismatch());
        assert!(matches!(err, ReckonError::ReconciliationMismatch { checkpoints: 1, .. }));
        assert_eq!(std::fs::read(&master_path).unwrap(), before);

        let diag = std::fs::read_to_string(&artifact).unwrap();
        assert!(diag.starts_with("transaction_date,payee,amount"));
        assert!(diag.contains("2024-02-29,,0.00,69.99,69.99,70.00,False"));
    }

    #[test]
    fn test_fold_applies_slices_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let master_path = dir.path().join("transaction_hsbc_dc.csv");
        let merger = Merger::new(Reconciler::new(), dir.path().join("transaction_error.csv"));
        let cps = jan_checkpoints();
        let slices = vec![
            slice(d(2024, 1, 31), vec![txn(d(2024, 1, 3), "Employer", dec!(100.00))]),
            slice(d(2024, 2, 29), vec![txn(d(2024, 2, 14), "Florist", dec!(-30.00))]),
        ];
        let report = merger.fold("hsbc_dc", &master_path, &slices, Some(&cps)).unwrap();
        assert_eq!(report.slices_applied, 2);
        assert_eq!(report.rows_added, 2);
        let full = report.reconciliation.unwrap();
        assert_eq!(full.checked, 2);
        assert!(full.pending.is_empty());
    }

    #[test]
    fn test_fold_without_checkpoints_skips_reconciliation() {
        let dir = tempfile::tempdir().unwrap();
        let master_path = dir.path().join("transaction_cash.csv");
        let merger = Merger::new(Reconciler::new(), dir.path().join("transaction_error.csv"));
        let cash = StatementSlice {
            ledger: "cash".to_string(),
            statement_date: d(2024, 1, 31),
            rows: vec![
                txn(d(2024, 1, 10), "Transfer : HSBC DC", dec!(40)),
                txn(d(2024, 1, 10), "Misc", dec!(-40)),
            ],
        };
        let report = merger.fold("cash", &master_path, &[cash], None).unwrap();
        assert!(report.written);
        assert!(report.reconciliation.is_none());
        assert!(!dir.path().join("transaction_error.csv").exists());
        assert_eq!(crate::ledger::read_ledger(&master_path).unwrap().len(), 2);
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            rows in prop::collection::vec((0u32..60, -10_000i64..10_000, 0usize..4), 0..30),
        ) {
            let payees = ["Tesco", "Cafe", "Rent", "Employer"];
            let incoming: Vec<Transaction> = rows
                .iter()
                .map(|(day, cents, p)| {
                    txn(
                        d(2024, 1, 1) + chrono::Duration::days(i64::from(*day)),
                        payees[*p],
                        Decimal::new(*cents, 2),
                    )
                })
                .collect();
            let once = merge(&[], &incoming);
            prop_assert_eq!(once.rows_added, incoming.len());
            let twice = merge(&once.master, &incoming);
            prop_assert_eq!(twice.rows_added, 0);
            prop_assert_eq!(twice.master, once.master);
        }
    }
}
