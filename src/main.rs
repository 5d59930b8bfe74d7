//! Main entry point for the `axiom` CLI. Parses arguments, dispatches to the
//! command handlers, and maps errors to exit codes.

use axiom::cli::Cli;
use axiom::{commands, exit_codes};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::dispatch(cli.command) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
