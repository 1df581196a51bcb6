//! Implementation of the `bolt clear` command.

use crate::cli::ClearArgs;
use bolt::config::Config;
use bolt::error::{LockError, Result};
use bolt::lock::{FileLock, LockStatus};

pub fn cmd_clear(args: ClearArgs, config: &Config) -> Result<()> {
    let mut lock = FileLock::new(&args.resource);
    if let Some(secs) = config.max_holder_age_secs {
        lock = lock.with_max_holder_age(secs);
    }

    let Some(info) = lock.info()? else {
        return Err(LockError::Usage(format!(
            "no lock record exists for '{}'",
            args.resource.display()
        )));
    };

    if info.status == LockStatus::Locked && !args.force {
        let pids: Vec<String> = info.holders.iter().map(|h| h.pid.to_string()).collect();
        return Err(LockError::Usage(format!(
            "lock on '{}' has live holders (pids: {}); use --force to clear anyway",
            args.resource.display(),
            pids.join(", ")
        )));
    }

    lock.cleanup()?;
    println!(
        "cleared {} lock on '{}' ({} holder{})",
        info.mode,
        args.resource.display(),
        info.holders.len(),
        if info.holders.len() == 1 { "" } else { "s" }
    );

    Ok(())
}
