//! The main entry point to the program.
use human_panic::setup_panic;
use nexusplan::cli::run_cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_panic!();

    if let Err(err) = run_cli() {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
