use comfy_table::{Cell, Table};

use super::short_sum;
use crate::error::Result;
use crate::merger::FoldReport;
use crate::pipeline;
use crate::settings::Settings;

pub fn print(reports: &[FoldReport]) {
    if reports.is_empty() {
        println!("No transaction files to combine.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Ledger", "Files", "Added", "Written", "Before", "After"]);
    for r in reports {
        table.add_row(vec![
            Cell::new(&r.ledger),
            Cell::new(r.slices_applied),
            Cell::new(r.rows_added),
            Cell::new(if r.written { "yes" } else { "no" }),
            Cell::new(short_sum(r.checksum_before.as_deref())),
            Cell::new(short_sum(r.checksum_after.as_deref())),
        ]);
    }
    println!("Master ledgers\n{table}");
}

pub fn run(settings: &Settings) -> Result<()> {
    print(&pipeline::combine(settings)?);
    Ok(())
}
