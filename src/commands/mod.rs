//! Command implementations for the bolt CLI.
//!
//! Each submodule implements one subcommand; this module dispatches.

mod clear;
mod run;
mod status;
mod watch;

use crate::cli::{Cli, Command};
use bolt::config::Config;
use bolt::error::Result;

/// Dispatch a parsed invocation to its command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Status(args) => status::cmd_status(args, &config),
        Command::Clear(args) => clear::cmd_clear(args, &config),
        Command::Run(args) => run::cmd_run(args, &config),
        Command::Watch(args) => watch::cmd_watch(args, &config),
    }
}
