use comfy_table::{Cell, Table};

use crate::checkpoints::CheckpointStore;
use crate::discovery::list_statements;
use crate::error::{ReckonError, Result};
use crate::fmt::money;
use crate::payees::PayeeMap;
use crate::settings::Settings;
use crate::statement::prepare_all;

pub fn run(settings: &Settings) -> Result<()> {
    let ledger = settings.ledger(&settings.source_ledger).ok_or_else(|| {
        ReckonError::Config(format!("source ledger '{}' is not configured", settings.source_ledger))
    })?;
    let checkpoints = CheckpointStore::new(settings.data_path()).require(ledger)?;
    let payees = PayeeMap::load(&settings.payee_mapping_path(), &settings.category_mapping_path())?;
    let files = list_statements(&settings.data_path(), "txn")?;
    if files.is_empty() {
        println!("No raw statements found in {}", settings.data_path().display());
        return Ok(());
    }

    let prepared = prepare_all(&files, &checkpoints, &payees)?;
    if prepared.is_empty() {
        println!("All {} statements already prepared.", files.len());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Statement", "Rows", "Dropped", "Net", "Output"]);
    for p in &prepared {
        table.add_row(vec![
            Cell::new(p.statement_date),
            Cell::new(p.rows.len()),
            Cell::new(p.rejected.len()),
            Cell::new(money(p.check.actual)),
            Cell::new(p.output.file_name().unwrap_or_default().to_string_lossy()),
        ]);
    }
    println!("Prepared statements\n{table}");
    Ok(())
}
