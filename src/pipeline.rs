//! The batch run over a data directory: generate per-statement slices from
//! budgeting-tool exports, validate them, check the masters, then merge.
//! Every stage halts the run on a blocking failure before anything is
//! written by the stages after it.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::categories::{enforce, CategoryDimension};
use crate::checkpoints::CheckpointStore;
use crate::discovery::list_statements;
use crate::error::{ReckonError, Result};
use crate::ledger::{read_ledger, write_ledger};
use crate::merger::{FoldReport, Merger};
use crate::models::StatementSlice;
use crate::normalizer::{normalize, read_budget_export};
use crate::reconciler::{
    validate_monthly, validate_net_zero, write_diagnostics, FullReport, MonthlyCheck, Reconciler,
};
use crate::settings::{LedgerConfig, Settings};

fn slice_kind(ledger: &str) -> String {
    format!("transaction_{ledger}")
}

pub fn slice_path(settings: &Settings, statement_date: NaiveDate, ledger: &str) -> PathBuf {
    settings.data_path().join(format!(
        "{}_{}.csv",
        statement_date.format("%Y-%m-%d"),
        slice_kind(ledger)
    ))
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeneratedSlice {
    pub ledger: String,
    pub statement_date: NaiveDate,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    pub exports: usize,
    pub slices: Vec<GeneratedSlice>,
    pub rejected: usize,
}

/// Normalize every `<date>_ynab.csv` into `<date>_transaction_<ledger>.csv`.
/// All exports are read before any slice is written.
pub fn generate(settings: &Settings) -> Result<GenerateSummary> {
    info!("generating transaction files");
    let exports = list_statements(&settings.data_path(), "ynab")?;
    info!("...{} export files found", exports.len());

    let opts = settings.normalize_options();
    let mut summary = GenerateSummary {
        exports: exports.len(),
        ..GenerateSummary::default()
    };
    let mut pending = Vec::new();
    for file in &exports {
        let rows = read_budget_export(&file.path)?;
        let normalized = normalize(&rows, file.statement_date, &opts);
        summary.rejected += normalized.rejected.len();
        pending.extend(normalized.slices);
    }

    for slice in pending {
        let path = slice_path(settings, slice.statement_date, &slice.ledger);
        write_ledger(&path, &slice.rows)?;
        info!("...wrote {}", path.display());
        summary.slices.push(GeneratedSlice {
            ledger: slice.ledger,
            statement_date: slice.statement_date,
            path,
            rows: slice.rows.len(),
        });
    }
    Ok(summary)
}

/// Per-statement slices on disk for one ledger, oldest first.
pub fn load_slices(settings: &Settings, ledger: &str) -> Result<Vec<StatementSlice>> {
    list_statements(&settings.data_path(), &slice_kind(ledger))?
        .into_iter()
        .map(|file| {
            Ok(StatementSlice {
                ledger: ledger.to_string(),
                statement_date: file.statement_date,
                rows: read_ledger(&file.path)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SliceCheck {
    pub ledger: String,
    pub statement_date: NaiveDate,
    /// `None` for ledgers with neither checkpoints nor the net-zero rule.
    pub balance: Option<MonthlyCheck>,
    pub unknown_categories: usize,
}

/// Check every slice on disk: bank slices against their checkpoint, the
/// transfer ledger's slices for netting to zero, and all of them for known
/// categories.
pub fn validate(settings: &Settings) -> Result<Vec<SliceCheck>> {
    info!("validating transaction files");
    let store = CheckpointStore::new(settings.data_path());
    let dimension = CategoryDimension::load(&settings.category_path())?;
    let policy = settings.category_policy();

    let mut checks = Vec::new();
    for ledger in &settings.ledgers {
        let checkpoints = store.load(ledger)?;
        let slices = load_slices(settings, &ledger.name)?;
        info!("...{} {} files found", slices.len(), ledger.name);
        for slice in slices {
            let source = slice_path(settings, slice.statement_date, &ledger.name);
            let balance = match &checkpoints {
                Some(cps) => Some(validate_monthly(&slice.rows, slice.statement_date, cps)?),
                None if ledger.name == settings.transfer.ledger => {
                    Some(validate_net_zero(&slice.rows, slice.statement_date))
                }
                None => None,
            };
            if let Some(check) = &balance {
                if !check.is_reconciled() {
                    error!("...{} is missing transactions", source.display());
                    check.clone().into_result()?;
                }
            }

            let categories = dimension.validate(&slice.rows);
            enforce(&categories, policy, &source.display().to_string())?;
            info!("...{} is valid", source.display());
            checks.push(SliceCheck {
                ledger: ledger.name.clone(),
                statement_date: slice.statement_date,
                balance,
                unknown_categories: categories.unmatched.len(),
            });
        }
    }
    Ok(checks)
}

// ---------------------------------------------------------------------------
// Check masters
// ---------------------------------------------------------------------------

/// Full-history check of one reconciled master. A mismatch writes the
/// diagnostics artifact.
pub fn check_master(settings: &Settings, ledger: &LedgerConfig) -> Result<Option<FullReport>> {
    let store = CheckpointStore::new(settings.data_path());
    let Some(checkpoints) = store.load(ledger)? else {
        return Ok(None);
    };
    let path = settings.master_path(&ledger.name);
    if !path.exists() {
        info!("...no master for {} yet", ledger.name);
        return Ok(None);
    }
    let master = read_ledger(&path)?;
    let report = Reconciler::with_starting_balance(settings.starting_balance)
        .validate_full(&master, &checkpoints);
    if !report.is_reconciled() {
        let artifact = settings.error_artifact_path();
        write_diagnostics(&artifact, &report.diagnostics)?;
        error!("...some amounts do not reconcile, see {}", artifact.display());
        return Err(ReckonError::ReconciliationMismatch {
            ledger: ledger.name.clone(),
            checkpoints: report.mismatches.len(),
            artifact,
        });
    }

    let dimension = CategoryDimension::load(&settings.category_path())?;
    enforce(
        &dimension.validate(&master),
        settings.category_policy(),
        &path.display().to_string(),
    )?;
    info!("...all balances match, {} is valid", path.display());
    Ok(Some(report))
}

pub fn check(settings: &Settings) -> Result<Vec<(String, FullReport)>> {
    info!("validating master files");
    let mut reports = Vec::new();
    for ledger in settings.ledgers.iter().filter(|l| l.is_reconciled()) {
        if let Some(report) = check_master(settings, ledger)? {
            reports.push((ledger.name.clone(), report));
        }
    }
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Combine
// ---------------------------------------------------------------------------

/// Fold every ledger's slices, then write. A ledger that fails to reconcile
/// stops the run before any master is written.
pub fn combine(settings: &Settings) -> Result<Vec<FoldReport>> {
    info!("combining transaction files with masters");
    let store = CheckpointStore::new(settings.data_path());
    let merger = Merger::new(
        Reconciler::with_starting_balance(settings.starting_balance),
        settings.error_artifact_path(),
    );
    let mut planned = Vec::new();
    for ledger in &settings.ledgers {
        let slices = load_slices(settings, &ledger.name)?;
        if slices.is_empty() {
            info!("...no files for {}", ledger.name);
            continue;
        }
        let checkpoints = store.load(ledger)?;
        if checkpoints.is_none() {
            info!("...{} has no checkpoints, merging unchecked", ledger.name);
        }
        planned.push(merger.plan(
            &ledger.name,
            &settings.master_path(&ledger.name),
            &slices,
            checkpoints.as_ref(),
        )?);
    }
    planned.into_iter().map(|fold| fold.commit()).collect()
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub generated: GenerateSummary,
    pub validated: Vec<SliceCheck>,
    pub checked: Vec<(String, FullReport)>,
    pub combined: Vec<FoldReport>,
}

pub fn run(settings: &Settings) -> Result<RunSummary> {
    let generated = generate(settings)?;
    let validated = validate(settings)?;
    let checked = check(settings)?;
    let combined = combine(settings)?;
    Ok(RunSummary {
        generated,
        validated,
        checked,
        combined,
    })
}
