//! Bolt CLI entry point.
//!
//! Parses arguments, dispatches to the appropriate command handler, and
//! maps errors to typed exit codes.

mod cli;
mod commands;

use bolt::exit_codes;
use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
