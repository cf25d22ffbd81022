use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::pipeline::{self, SliceCheck};
use crate::settings::Settings;

pub fn print(checks: &[SliceCheck]) {
    if checks.is_empty() {
        println!("Nothing to validate.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Ledger", "Statement", "Expected", "Actual", "Unknown categories"]);
    for c in checks {
        let (expected, actual) = match &c.balance {
            Some(b) => (money(b.expected), money(b.actual)),
            None => ("-".to_string(), "-".to_string()),
        };
        let unknown = if c.unknown_categories > 0 {
            c.unknown_categories.to_string().yellow()
        } else {
            "0".normal()
        };
        table.add_row(vec![
            Cell::new(&c.ledger),
            Cell::new(c.statement_date),
            Cell::new(expected),
            Cell::new(actual),
            Cell::new(unknown),
        ]);
    }
    println!("Validated files\n{table}");
}

pub fn run(settings: &Settings) -> Result<()> {
    let checks = pipeline::validate(settings)?;
    print(&checks);
    if !checks.is_empty() {
        println!("{}", "All files valid.".green());
    }
    Ok(())
}
