use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categories::{enforce, CategoryDimension};
use crate::cli::FileType;
use crate::error::Result;
use crate::ledger::read_ledger;
use crate::models::Transaction;
use crate::normalizer::{read_budget_export, split_category};
use crate::settings::Settings;

/// `(master_category, subcategory)` for every row of `path`. Export rows
/// without a category are transfers and carry none to check.
fn read_pairs(path: &Path, file_type: FileType) -> Result<Vec<(String, String)>> {
    Ok(match file_type {
        FileType::Txn => read_ledger(path)?
            .iter()
            .map(Transaction::category_pair)
            .collect(),
        FileType::Ynab => read_budget_export(path)?
            .iter()
            .filter(|row| !row.category.trim().is_empty())
            .map(|row| split_category(&row.category))
            .collect(),
    })
}

pub fn run(settings: &Settings, file: &str, file_type: FileType) -> Result<()> {
    let dimension = CategoryDimension::load(&settings.category_path())?;
    let path = Path::new(file);
    let pairs = read_pairs(path, file_type)?;
    let check = dimension.validate_pairs(pairs.iter().cloned());

    if check.is_valid() {
        println!(
            "{}",
            format!("All {} rows use known categories.", pairs.len()).green()
        );
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Master category", "Subcategory", "Rows"]);
        for pair in &check.unmatched {
            let rows = pairs.iter().filter(|p| *p == pair).count();
            table.add_row(vec![Cell::new(&pair.0), Cell::new(&pair.1), Cell::new(rows)]);
        }
        println!("Unknown categories in {}\n{table}", path.display());
    }
    enforce(&check, settings.category_policy(), &path.display().to_string())
}
