use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categories::CategoryDimension;
use crate::error::Result;
use crate::fmt::money;
use crate::ledger::read_ledger_or_empty;
use crate::reports;
use crate::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let ledgers = settings
        .ledgers
        .iter()
        .map(|l| read_ledger_or_empty(&settings.master_path(&l.name)))
        .collect::<Result<Vec<_>>>()?;
    let dimension = CategoryDimension::load(&settings.category_path())?;
    let budget_path = settings.budget_path();
    let budget = if budget_path.exists() {
        Some(reports::read_budget(&budget_path)?)
    } else {
        None
    };

    let summary = reports::write_reports(
        &settings.reports_dir(),
        &ledgers,
        &dimension,
        budget.as_deref(),
    )?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Total"]);
    for (category, total) in reports::overall_totals(&reports::combine(&ledgers)) {
        let amount = if total.is_sign_negative() {
            money(total).red()
        } else {
            money(total).green()
        };
        table.add_row(vec![Cell::new(category), Cell::new(amount)]);
    }
    println!("Totals by category\n{table}");
    println!(
        "{} transactions across {} categories",
        summary.transactions, summary.categories
    );
    for f in &summary.files {
        println!("  wrote {}", f.display());
    }
    Ok(())
}
