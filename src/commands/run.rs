//! Implementation of the `bolt run` command.
//!
//! Runs a child command inside a scoped acquisition: the lock is released
//! on every exit path, including a failing or killed child.

use crate::cli::RunArgs;
use bolt::config::Config;
use bolt::error::{LockError, Result};
use bolt::lock::{with_lock, AcquireOptions, LockMode};
use std::process::Command as ProcessCommand;

pub fn cmd_run(args: RunArgs, config: &Config) -> Result<()> {
    let mode: LockMode = args.mode.parse().map_err(LockError::Usage)?;

    let options = AcquireOptions {
        timeout_ms: args.timeout_ms.or(config.default_timeout_ms),
        retry_interval_ms: args.retry_interval_ms.unwrap_or(config.retry_interval_ms),
        break_stale: args.break_stale,
    };

    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| LockError::Usage("no command given".to_string()))?;

    with_lock(&args.resource, mode, &options, |lock| {
        log::debug!(
            "holding {} lock on '{}', running {:?}",
            mode,
            lock.resource().display(),
            program
        );

        let status = ProcessCommand::new(program)
            .args(rest)
            .status()
            .map_err(|e| LockError::io(format!("failed to execute '{}'", program), e))?;

        if !status.success() {
            return Err(LockError::Usage(format!(
                "command '{}' exited with {}",
                program, status
            )));
        }
        Ok(())
    })
}
