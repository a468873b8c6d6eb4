mod errors;
mod repl;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::process::ExitCode;
use storage::Table;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "leafbase",
    version = VERSION,
    about = "A tiny persistent B+tree key-value store."
)]
struct Cli {
    /// Path to the database file, created if it does not exist.
    filename: String,
}

fn main() -> ExitCode {
    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("leafbase.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut table = match Table::open(&cli.filename) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error opening database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let result = repl::repl_loop(&mut table, stdin.lock(), io::stdout());

    if let Err(e) = table.close() {
        eprintln!("Error closing database: {}", e);
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
