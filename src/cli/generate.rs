use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::pipeline::{self, GenerateSummary};
use crate::settings::Settings;

pub fn print(summary: &GenerateSummary) {
    if summary.exports == 0 {
        println!("No budgeting-tool exports found.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Ledger", "Statement", "Rows", "File"]);
    for s in &summary.slices {
        table.add_row(vec![
            Cell::new(&s.ledger),
            Cell::new(s.statement_date),
            Cell::new(s.rows),
            Cell::new(s.path.file_name().unwrap_or_default().to_string_lossy()),
        ]);
    }
    println!("Transaction files\n{table}");
    if summary.rejected > 0 {
        println!(
            "{}",
            format!("{} malformed rows dropped, see log", summary.rejected).yellow()
        );
    }
}

pub fn run(settings: &Settings) -> Result<()> {
    print(&pipeline::generate(settings)?);
    Ok(())
}
