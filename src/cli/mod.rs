pub mod categories;
pub mod check;
pub mod combine;
pub mod generate;
pub mod init;
pub mod prepare;
pub mod report;
pub mod run;
pub mod status;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};

/// First 12 hex digits of a checksum, or a dash when there is none.
pub(crate) fn short_sum(sum: Option<&str>) -> String {
    sum.map(|s| s.chars().take(12).collect())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Parser)]
#[command(
    name = "reckon",
    about = "Reconcile bank and cash statements and merge them into master ledgers."
)]
pub struct Cli {
    /// Data directory (overrides the one in settings)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    /// Treat unknown categories as errors for this run
    #[arg(long, global = true)]
    pub strict: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Layout of a file handed to `categories`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FileType {
    /// Canonical ledger with master_category and subcategory columns
    #[default]
    Txn,
    /// Budgeting-tool export with a combined `Master: Sub` Category column
    Ynab,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write settings and create the data directory layout.
    Init,
    /// Check raw `<date>_txn.csv` statements and write budgeting-tool imports.
    Prepare,
    /// Split `<date>_ynab.csv` exports into per-ledger transaction files.
    Generate,
    /// Check every per-statement transaction file against its checkpoint.
    Validate,
    /// Reconcile the full history of every master ledger.
    Check,
    /// Merge per-statement transaction files into the master ledgers.
    Combine,
    /// Generate, validate, check and combine in one go.
    Run,
    /// Check a ledger file's categories against the category dimension.
    Categories {
        /// Ledger CSV to check
        file: String,
        /// Layout of the file (txn or ynab)
        #[arg(long = "type", short = 't', value_enum, default_value = "txn")]
        file_type: FileType,
    },
    /// Write reporting extracts under <data-dir>/reports.
    Report,
    /// Show data directory, ledgers and checkpoints.
    Status,
}
