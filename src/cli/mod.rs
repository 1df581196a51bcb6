//! CLI argument parsing for bolt.
//!
//! Uses clap derive macros for declarative argument definitions. This module
//! defines the command structure; actual implementations are in the
//! `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bolt: cross-process file locking with stale-lock detection.
///
/// A lock record (`<resource>.lock`) beside the protected resource is the
/// arbitration medium: processes claim it atomically, join it in shared
/// mode, and can break it when its holders are no longer alive.
#[derive(Parser, Debug)]
#[command(name = "bolt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file with default knobs.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for bolt.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the current lock record for a resource.
    ///
    /// Prints mode, holders, claim ages, and stale markers, or reports
    /// that the resource is not locked.
    Status(StatusArgs),

    /// Remove a lock record.
    ///
    /// Refuses to clear a record with live holders unless --force is given.
    Clear(ClearArgs),

    /// Run a command while holding the lock.
    ///
    /// Acquires the lock, executes the command, and guarantees release on
    /// every exit path.
    Run(RunArgs),

    /// Live dashboard over the lock records in a directory.
    ///
    /// Refreshes periodically, highlighting stale records and aggregate
    /// counts.
    #[command(alias = "monitor", alias = "dashboard")]
    Watch(WatchArgs),
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Protected resource path (the record lives at `<resource>.lock`).
    pub resource: PathBuf,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Protected resource path.
    pub resource: PathBuf,

    /// Clear the record even if its holders are alive.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Protected resource path.
    pub resource: PathBuf,

    /// Lock mode (shared or exclusive).
    #[arg(short, long, default_value = "exclusive")]
    pub mode: String,

    /// Acquisition deadline in milliseconds (0 fails fast; omit to wait
    /// indefinitely).
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Sleep between contention re-checks.
    #[arg(long)]
    pub retry_interval_ms: Option<u64>,

    /// Replace a stale record instead of waiting it out.
    #[arg(long)]
    pub break_stale: bool,

    /// Command and arguments to execute while the lock is held.
    #[arg(required = true, last = true)]
    pub command: Vec<String>,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Directory to scan for `*.lock` records.
    pub dir: PathBuf,

    /// Refresh interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Render once and exit.
    #[arg(long)]
    pub once: bool,

    /// Maximum number of records to list.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Clear the screen between refreshes.
    #[arg(long)]
    pub clear: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses() {
        let cli = Cli::try_parse_from(["bolt", "status", "/tmp/data.db"]).unwrap();
        match cli.command {
            Command::Status(args) => assert_eq!(args.resource, PathBuf::from("/tmp/data.db")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn clear_force_flag_parses() {
        let cli = Cli::try_parse_from(["bolt", "clear", "/tmp/data.db", "--force"]).unwrap();
        match cli.command {
            Command::Clear(args) => assert!(args.force),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn run_requires_a_command() {
        assert!(Cli::try_parse_from(["bolt", "run", "/tmp/data.db", "--"]).is_err());

        let cli = Cli::try_parse_from([
            "bolt",
            "run",
            "/tmp/data.db",
            "--mode",
            "shared",
            "--timeout-ms",
            "500",
            "--",
            "sleep",
            "1",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.mode, "shared");
                assert_eq!(args.timeout_ms, Some(500));
                assert_eq!(args.command, vec!["sleep", "1"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn watch_defaults() {
        let cli = Cli::try_parse_from(["bolt", "watch", "/tmp/locks"]).unwrap();
        match cli.command {
            Command::Watch(args) => {
                assert_eq!(args.interval_ms, 1000);
                assert_eq!(args.limit, 20);
                assert!(!args.once);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn monitor_alias_maps_to_watch() {
        let cli = Cli::try_parse_from(["bolt", "monitor", "/tmp/locks", "--once"]).unwrap();
        assert!(matches!(cli.command, Command::Watch(_)));
    }
}
