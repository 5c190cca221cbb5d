use cardtable::cli::Cli;
use cardtable::cli_handlers;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr; stdout belongs to the menus
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli_handlers::run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
