use comfy_table::{Cell, Table};

use super::short_sum;
use crate::checkpoints::CheckpointStore;
use crate::discovery::list_statements;
use crate::error::Result;
use crate::ledger::{checksum, read_ledger_or_empty};
use crate::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let data_dir = settings.data_path();
    println!("Data dir:    {}", data_dir.display());
    println!(
        "Categories:  {}",
        if settings.strict_categories { "strict" } else { "permissive" }
    );
    if !data_dir.is_dir() {
        println!();
        println!("Data directory not found. Run `reckon init` to set up.");
        return Ok(());
    }

    let store = CheckpointStore::new(&data_dir);
    let mut table = Table::new();
    table.set_header(vec![
        "Ledger",
        "Rows",
        "Last txn",
        "Checkpoints",
        "Last checkpoint",
        "Checksum",
    ]);
    for ledger in &settings.ledgers {
        let path = settings.master_path(&ledger.name);
        let rows = read_ledger_or_empty(&path)?;
        let sum = if path.exists() { Some(checksum(&path)?) } else { None };
        let (count, last) = match store.load(ledger) {
            Ok(Some(cps)) => (
                cps.len().to_string(),
                cps.last().map(|c| c.statement_date.to_string()).unwrap_or_default(),
            ),
            Ok(None) => ("-".to_string(), String::new()),
            Err(e) => ("error".to_string(), e.to_string()),
        };
        table.add_row(vec![
            Cell::new(&ledger.name),
            Cell::new(rows.len()),
            Cell::new(
                rows.iter()
                    .map(|t| t.transaction_date)
                    .max()
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(count),
            Cell::new(last),
            Cell::new(short_sum(sum.as_deref())),
        ]);
    }
    println!("{table}");

    println!("Raw statements:     {}", list_statements(&data_dir, "txn")?.len());
    println!("Exports:            {}", list_statements(&data_dir, "ynab")?.len());
    if settings.error_artifact_path().exists() {
        println!("Diagnostics:        {}", settings.error_artifact_path().display());
    }
    Ok(())
}
