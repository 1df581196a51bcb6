//! Implementation of the `bolt status` command.

use crate::cli::StatusArgs;
use bolt::config::Config;
use bolt::error::Result;
use bolt::lock::{FileLock, LockStatus};

pub fn cmd_status(args: StatusArgs, config: &Config) -> Result<()> {
    let mut lock = FileLock::new(&args.resource);
    if let Some(secs) = config.max_holder_age_secs {
        lock = lock.with_max_holder_age(secs);
    }

    match lock.info()? {
        None => {
            println!("{}: not locked", args.resource.display());
        }
        Some(info) => {
            println!("{}: {}", args.resource.display(), info.mode);
            if info.status == LockStatus::Stale {
                println!("  status: STALE (no live holders)");
            }
            for holder in &info.holders {
                println!(
                    "  holder pid {} seq {} ({}), acquired {} ({})",
                    holder.pid,
                    holder.seq,
                    holder.owner,
                    holder.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    format_age_secs(holder.age().num_seconds()),
                );
            }
        }
    }

    Ok(())
}

/// Render a second count as a compact human-readable age.
pub(super) fn format_age_secs(secs: i64) -> String {
    let secs = secs.max(0);
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_age_covers_units() {
        assert_eq!(format_age_secs(5), "5s");
        assert_eq!(format_age_secs(180), "3m");
        assert_eq!(format_age_secs(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_age_secs(2 * 86_400 + 3 * 3600), "2d 3h");
        assert_eq!(format_age_secs(-10), "0s");
    }
}
