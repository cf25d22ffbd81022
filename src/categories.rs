use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{ReckonError, Result};
use crate::ledger::header_index;
use crate::models::{CategoryEntry, Transaction};

/// What to do when a ledger carries categories the dimension doesn't know.
///
/// Balance mismatches always block; unknown categories historically only
/// warned, so `Permissive` is the default and `Strict` is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryPolicy {
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryDimension {
    entries: Vec<CategoryEntry>,
    pairs: HashSet<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryCheck {
    /// Distinct unknown `(master_category, subcategory)` pairs, first-seen order.
    pub unmatched: Vec<(String, String)>,
}

impl CategoryCheck {
    pub fn is_valid(&self) -> bool {
        self.unmatched.is_empty()
    }
}

fn parse_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}

impl CategoryDimension {
    pub fn new(entries: Vec<CategoryEntry>) -> Self {
        let pairs = entries
            .iter()
            .map(|e| (e.master_category.clone(), e.subcategory.clone()))
            .collect();
        Self { entries, pairs }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReckonError::Config(format!(
                "category dimension not found: {}",
                path.display()
            )));
        }
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = rdr.headers()?.clone();
        let idx = header_index(&headers, &["master_category", "subcategory", "enabled"], path)?;
        let mut entries = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let field = |n: usize| record.get(idx[n]).unwrap_or("").trim().to_string();
            entries.push(CategoryEntry {
                master_category: field(0),
                subcategory: field(1),
                enabled: parse_enabled(&field(2)),
            });
        }
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// A pair is known when the dimension lists it at all; a disabled entry
    /// still counts as present.
    pub fn contains(&self, master_category: &str, subcategory: &str) -> bool {
        self.pairs
            .contains(&(master_category.to_string(), subcategory.to_string()))
    }

    pub fn validate(&self, ledger: &[Transaction]) -> CategoryCheck {
        self.validate_pairs(ledger.iter().map(Transaction::category_pair))
    }

    pub fn validate_pairs<I>(&self, pairs: I) -> CategoryCheck
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut seen = HashSet::new();
        let mut unmatched = Vec::new();
        for pair in pairs {
            if self.contains(&pair.0, &pair.1) {
                continue;
            }
            if seen.insert(pair.clone()) {
                unmatched.push(pair);
            }
        }
        CategoryCheck { unmatched }
    }
}

/// Apply the configured policy to a category check of `source_name`.
pub fn enforce(check: &CategoryCheck, policy: CategoryPolicy, source_name: &str) -> Result<()> {
    if check.is_valid() {
        info!("...all categories present in {source_name}");
        return Ok(());
    }
    for (master, sub) in &check.unmatched {
        warn!("...unknown category in {source_name}: '{master}: {sub}'");
    }
    match policy {
        CategoryPolicy::Permissive => Ok(()),
        CategoryPolicy::Strict => Err(ReckonError::CategoryMismatch {
            source_name: source_name.to_string(),
            pairs: check.unmatched.clone(),
        }),
    }
}
