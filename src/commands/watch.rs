//! Implementation of the `bolt watch` (dashboard) command.
//!
//! A lightweight, refresh-based view over the lock records in a directory.
//! ANSI escape codes clear the screen between refreshes; no TUI dependency
//! stack. Each refresh feeds the records through a `LockMonitor` sweep so
//! the dashboard and programmatic monitoring share one staleness check.

use crate::cli::WatchArgs;
use crate::commands::status::format_age_secs;
use bolt::config::Config;
use bolt::error::{LockError, Result};
use bolt::lock::{read_record, LockRecord};
use bolt::monitor::{LockMonitor, MonitorOptions};
use chrono::Utc;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

pub fn cmd_watch(args: WatchArgs, config: &Config) -> Result<()> {
    let monitor = LockMonitor::start(MonitorOptions {
        // Every refresh sweeps explicitly; no background sweep thread.
        sweep_interval_ms: 0,
        event_buffer: config.event_buffer,
        wait_alert_ms: config.wait_alert_ms,
        max_holder_age_secs: config.max_holder_age_secs,
        event_log: config.event_log.clone(),
    });

    loop {
        if args.clear {
            clear_screen();
        }

        render_once(&args, config, &monitor)?;

        if args.once {
            break;
        }

        thread::sleep(Duration::from_millis(args.interval_ms.max(50)));
    }

    monitor.stop();
    Ok(())
}

#[derive(Debug)]
enum RecordRow {
    Parsed(PathBuf, LockRecord),
    Corrupt(PathBuf, String),
}

fn render_once(args: &WatchArgs, config: &Config, monitor: &LockMonitor) -> Result<()> {
    let rows = scan_lock_dir(args)?;

    for row in &rows {
        let path = match row {
            RecordRow::Parsed(path, _) | RecordRow::Corrupt(path, _) => path,
        };
        monitor.track(path);
    }
    monitor.sweep_once();

    let now = Utc::now();
    println!("Bolt Watch  (Ctrl+C to exit)");
    println!("Updated: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Dir:     {}", args.dir.display());
    println!();

    if rows.is_empty() {
        println!("No lock records.");
        println!();
        io::stdout().flush().ok();
        return Ok(());
    }

    let max_age = config.max_holder_age_secs;
    let stale_count = rows
        .iter()
        .filter(|r| matches!(r, RecordRow::Parsed(_, rec) if rec.is_stale(max_age)))
        .count();

    println!(
        "Locks: {}{}",
        rows.len(),
        if stale_count > 0 {
            format!("  ({} stale)", stale_count)
        } else {
            String::new()
        }
    );

    for row in rows.iter().take(args.limit) {
        match row {
            RecordRow::Parsed(path, record) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let holders: Vec<String> = record
                    .holders
                    .iter()
                    .map(|h| {
                        format!(
                            "{} ({}, {})",
                            h.pid,
                            h.owner,
                            format_age_secs(h.age().num_seconds())
                        )
                    })
                    .collect();
                let stale_marker = if record.is_stale(max_age) {
                    " [STALE]"
                } else {
                    ""
                };
                println!(
                    "  - {}  {:9}  {}{}",
                    name,
                    record.mode.as_str(),
                    holders.join(", "),
                    stale_marker
                );
            }
            RecordRow::Corrupt(path, reason) => {
                println!("  ! {}  (corrupt: {})", path.display(), reason);
            }
        }
    }
    if rows.len() > args.limit {
        println!("  ... and {} more", rows.len() - args.limit);
    }
    println!();

    let stats = monitor.stats(None);
    println!(
        "Sweep: {} stale detection{}, {} error{}{}",
        stats.stale_detections,
        if stats.stale_detections == 1 { "" } else { "s" },
        stats.errors,
        if stats.errors == 1 { "" } else { "s" },
        if monitor.is_healthy() {
            ""
        } else {
            "  [UNHEALTHY: all paths failing]"
        }
    );
    println!();

    io::stdout().flush().ok();
    Ok(())
}

/// Collect `*.lock` records in the watched directory. Unparsable records
/// become corrupt rows rather than aborting the scan.
fn scan_lock_dir(args: &WatchArgs) -> Result<Vec<RecordRow>> {
    let entries = std::fs::read_dir(&args.dir).map_err(|e| {
        LockError::io(
            format!("failed to read lock directory '{}'", args.dir.display()),
            e,
        )
    })?;

    let mut rows = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| LockError::io("failed to read lock directory entry".to_string(), e))?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }

        match read_record(&path) {
            Ok(Some(record)) => rows.push(RecordRow::Parsed(path, record)),
            Ok(None) => {}
            Err(LockError::Corrupt { reason, .. }) => rows.push(RecordRow::Corrupt(path, reason)),
            Err(e) => return Err(e),
        }
    }

    rows.sort_by(|a, b| {
        let (RecordRow::Parsed(a, _) | RecordRow::Corrupt(a, _)) = a;
        let (RecordRow::Parsed(b, _) | RecordRow::Corrupt(b, _)) = b;
        a.cmp(b)
    });

    Ok(rows)
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt::lock::{AcquireOptions, FileLock, LockMode};
    use tempfile::TempDir;

    fn watch_args(dir: PathBuf) -> WatchArgs {
        WatchArgs {
            dir,
            interval_ms: 1000,
            once: true,
            limit: 20,
            clear: false,
        }
    }

    #[test]
    fn watch_once_over_empty_dir_succeeds() {
        let dir = TempDir::new().unwrap();
        cmd_watch(watch_args(dir.path().to_path_buf()), &Config::default()).unwrap();
    }

    #[test]
    fn scan_finds_records_and_flags_corrupt_ones() {
        let dir = TempDir::new().unwrap();

        let mut lock = FileLock::new(dir.path().join("data.db"));
        lock.acquire(LockMode::Shared, &AcquireOptions::default())
            .unwrap();
        std::fs::write(dir.path().join("broken.lock"), "garbage").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "ignored").unwrap();

        let rows = scan_lock_dir(&watch_args(dir.path().to_path_buf())).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], RecordRow::Corrupt(path, _) if path.ends_with("broken.lock")));
        assert!(
            matches!(&rows[1], RecordRow::Parsed(path, rec) if path.ends_with("data.db.lock")
                && rec.mode == LockMode::Shared)
        );

        lock.release().unwrap();
    }

    #[test]
    fn missing_dir_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let err = scan_lock_dir(&watch_args(missing)).unwrap_err();
        assert!(matches!(err, LockError::Io { .. }));
    }
}
