use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ReckonError, Result};
use crate::ledger::{header_index, parse_amount, parse_date};
use crate::models::Checkpoint;
use crate::settings::LedgerConfig;

pub const CHECKPOINT_HEADER: [&str; 3] = ["statement_date", "opening_balance", "closing_balance"];

/// Statement checkpoints for one account, strictly increasing by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoints {
    items: Vec<Checkpoint>,
}

impl Checkpoints {
    /// Sorts by date and rejects duplicate statement dates.
    pub fn new(mut items: Vec<Checkpoint>) -> Result<Self> {
        items.sort_by_key(|c| c.statement_date);
        if let Some(pair) = items
            .windows(2)
            .find(|w| w[0].statement_date == w[1].statement_date)
        {
            return Err(ReckonError::Config(format!(
                "duplicate checkpoint for statement date {}",
                pair[0].statement_date
            )));
        }
        Ok(Self { items })
    }

    pub fn get(&self, statement_date: NaiveDate) -> Option<&Checkpoint> {
        self.items
            .binary_search_by_key(&statement_date, |c| c.statement_date)
            .ok()
            .map(|i| &self.items[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checkpoint> {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn read_checkpoints(path: &Path) -> Result<Checkpoints> {
    if !path.exists() {
        return Err(ReckonError::Config(format!(
            "checkpoint file not found: {}",
            path.display()
        )));
    }
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = header_index(&headers, &CHECKPOINT_HEADER, path)?;

    let mut items = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |n: usize| record.get(idx[n]).unwrap_or("").trim();
        if field(0).is_empty() {
            continue;
        }
        let bad = |what: &str, value: &str| {
            ReckonError::Config(format!(
                "{} line {}: bad {what} '{value}'",
                path.display(),
                i + 2
            ))
        };
        let statement_date = parse_date(field(0)).ok_or_else(|| bad("statement_date", field(0)))?;
        let opening_balance =
            parse_amount(field(1)).ok_or_else(|| bad("opening_balance", field(1)))?;
        let closing_balance =
            parse_amount(field(2)).ok_or_else(|| bad("closing_balance", field(2)))?;
        items.push(Checkpoint {
            statement_date,
            opening_balance,
            closing_balance,
        });
    }
    debug!("{} checkpoints read from {}", items.len(), path.display());
    Checkpoints::new(items)
}

/// Resolves each ledger's checkpoint file under the data directory.
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `Ok(None)` for ledgers that are not balance-reconciled.
    pub fn load(&self, ledger: &LedgerConfig) -> Result<Option<Checkpoints>> {
        match &ledger.checkpoints {
            Some(file) => read_checkpoints(&self.root.join(file)).map(Some),
            None => Ok(None),
        }
    }

    /// Like `load`, but a ledger without checkpoints is a configuration error.
    pub fn require(&self, ledger: &LedgerConfig) -> Result<Checkpoints> {
        self.load(ledger)?.ok_or_else(|| {
            ReckonError::Config(format!("ledger '{}' has no checkpoint file", ledger.name))
        })
    }
}
