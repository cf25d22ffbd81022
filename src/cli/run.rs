use colored::Colorize;

use crate::error::Result;
use crate::pipeline;
use crate::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let summary = pipeline::run(settings)?;
    super::generate::print(&summary.generated);
    super::validate::print(&summary.validated);
    for (ledger, report) in &summary.checked {
        super::check::print(ledger, report);
    }
    super::combine::print(&summary.combined);
    println!("{}", "Done.".green());
    Ok(())
}
