use colored::Colorize;

use crate::error::Result;
use crate::fmt::money;
use crate::pipeline;
use crate::reconciler::FullReport;
use crate::settings::Settings;

pub fn print(ledger: &str, report: &FullReport) {
    println!(
        "{}: {} checkpoint(s) reconciled{}",
        ledger.bold(),
        report.checked,
        report
            .horizon
            .map(|d| format!(" through {d}"))
            .unwrap_or_default()
    );
    if let Some(fb) = &report.final_balance {
        let line = format!(
            "  final balance {} (statement {})",
            money(fb.actual),
            money(fb.expected)
        );
        if fb.actual == fb.expected {
            println!("{line}");
        } else {
            println!("{}", line.yellow());
        }
    }
    if !report.pending.is_empty() {
        let dates: Vec<String> = report
            .pending
            .iter()
            .map(|c| c.statement_date.to_string())
            .collect();
        println!(
            "{}",
            format!("  pending, waiting for transactions: {}", dates.join(", ")).yellow()
        );
    }
}

pub fn run(settings: &Settings) -> Result<()> {
    let reports = pipeline::check(settings)?;
    if reports.is_empty() {
        println!("No master ledgers to check.");
    }
    for (ledger, report) in &reports {
        print(ledger, report);
    }
    Ok(())
}
