use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ReckonError, Result};
use crate::models::StatementFile;

/// Split `2024-01-31_txn.csv` into its date and kind.
pub fn parse_statement_name(file_name: &str) -> Option<(NaiveDate, String)> {
    let stem = file_name.strip_suffix(".csv")?;
    let (date, kind) = stem.split_once('_')?;
    if date.len() != 10 || kind.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((date, kind.to_lowercase()))
}

/// Files in `dir` named `<yyyy-mm-dd>_<kind>.csv`, oldest statement first.
pub fn list_statements(dir: &Path, kind: &str) -> Result<Vec<StatementFile>> {
    if !dir.is_dir() {
        return Err(ReckonError::Config(format!(
            "data directory not found: {}",
            dir.display()
        )));
    }
    let kind = kind.to_lowercase();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        match parse_statement_name(&name) {
            Some((statement_date, k)) if k == kind => files.push(StatementFile {
                statement_date,
                path,
            }),
            Some(_) => {}
            None => debug!("...skipping {name}"),
        }
    }
    files.sort_by(|a, b| a.statement_date.cmp(&b.statement_date).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}
