use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReckonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error(
        "Reconciliation mismatch for {ledger}: {checkpoints} checkpoint(s) disagree, see {}",
        .artifact.display()
    )]
    ReconciliationMismatch {
        ledger: String,
        checkpoints: usize,
        artifact: PathBuf,
    },

    #[error("Statement {statement_date} does not reconcile: expected {expected}, actual {actual}")]
    StatementMismatch {
        statement_date: NaiveDate,
        expected: String,
        actual: String,
    },

    #[error("Unknown categories in {source_name}: {}", format_pairs(.pairs))]
    CategoryMismatch {
        source_name: String,
        pairs: Vec<(String, String)>,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl ReckonError {
    /// Balance disagreements exit with a distinct status.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ReconciliationMismatch { .. } | Self::StatementMismatch { .. }
        )
    }
}

fn format_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(master, sub)| format!("{master}: {sub}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReckonError>;
