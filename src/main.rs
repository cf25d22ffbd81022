mod categories;
mod checkpoints;
mod cli;
mod discovery;
mod error;
mod fmt;
mod ledger;
mod merger;
mod models;
mod normalizer;
mod payees;
mod pipeline;
mod reconciler;
mod reports;
mod settings;
mod statement;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "reckon=debug" } else { "reckon=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = settings::resolve(cli.data_dir.as_deref()).and_then(|mut settings| {
        if cli.strict {
            settings.strict_categories = true;
        }
        match cli.command {
            Commands::Init => cli::init::run(&settings),
            Commands::Prepare => cli::prepare::run(&settings),
            Commands::Generate => cli::generate::run(&settings),
            Commands::Validate => cli::validate::run(&settings),
            Commands::Check => cli::check::run(&settings),
            Commands::Combine => cli::combine::run(&settings),
            Commands::Run => cli::run::run(&settings),
            Commands::Categories { file, file_type } => {
                cli::categories::run(&settings, &file, file_type)
            }
            Commands::Report => cli::report::run(&settings),
            Commands::Status => cli::status::run(&settings),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(if e.is_mismatch() { 2 } else { 1 });
    }
}
