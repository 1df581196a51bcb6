//! The persisted lock record.
//!
//! One JSON record file per protected resource is the single source of truth
//! shared across processes; in-memory handles are cached views of it, never
//! authoritative on their own.
//!
//! Record layout:
//! - `version`: schema tag for forward compatibility
//! - `mode`: `"shared"` | `"exclusive"`
//! - `holders`: one entry per holder (`pid`, `seq`, `owner`, `acquired_at`);
//!   exactly one entry for exclusive records
//!
//! Writes go through a temp-file + fsync + atomic-rename sequence so a
//! crashed writer can never leave a half-written record behind.

use crate::error::{LockError, Result};
use crate::lock::liveness::pid_alive;
use crate::lock::types::{owner_string, LockMode};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Current schema version for persisted records.
pub const RECORD_VERSION: u32 = 1;

/// Process-wide acquisition sequence. Combined with the pid it distinguishes
/// holders even when the operating system reuses process identifiers.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// One holder's entry in a lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderEntry {
    /// Process ID of the holder.
    pub pid: u32,

    /// Acquisition sequence within the holder's process.
    pub seq: u64,

    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Timestamp of successful acquisition (RFC3339).
    pub acquired_at: DateTime<Utc>,
}

impl HolderEntry {
    /// Create a holder entry identifying the calling process, stamped now.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            seq: next_sequence(),
            owner: owner_string(),
            acquired_at: Utc::now(),
        }
    }

    /// Age of this holder's claim.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// A holder is stale when its process is gone, or when an age cap is
    /// configured and its claim is older than that.
    pub fn is_stale(&self, max_age_secs: Option<u64>) -> bool {
        if !pid_alive(self.pid) {
            return true;
        }
        match max_age_secs {
            Some(secs) => self.age() > Duration::seconds(secs as i64),
            None => false,
        }
    }

    /// Whether this entry names the same holder (pid + sequence).
    pub fn same_holder(&self, other: &HolderEntry) -> bool {
        self.pid == other.pid && self.seq == other.seq
    }
}

/// The on-disk representation of current ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// Schema version tag.
    pub version: u32,

    /// Mode the record is held in.
    pub mode: LockMode,

    /// Current holders. Exactly one for `Exclusive`.
    pub holders: Vec<HolderEntry>,
}

impl LockRecord {
    /// Create a record claiming the lock for `holder` in `mode`.
    pub fn new(mode: LockMode, holder: HolderEntry) -> Self {
        Self {
            version: RECORD_VERSION,
            mode,
            holders: vec![holder],
        }
    }

    /// A record is stale when every holder is stale.
    pub fn is_stale(&self, max_age_secs: Option<u64>) -> bool {
        self.holders.iter().all(|h| h.is_stale(max_age_secs))
    }

    /// Timestamp of the earliest still-listed claim.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.holders.iter().map(|h| h.acquired_at).min()
    }

    /// Validate internal consistency after parsing.
    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != RECORD_VERSION {
            return Err(LockError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("unknown record version {}", self.version),
            });
        }
        if self.holders.is_empty() {
            return Err(LockError::Corrupt {
                path: path.to_path_buf(),
                reason: "record lists no holders".to_string(),
            });
        }
        if self.mode == LockMode::Exclusive && self.holders.len() != 1 {
            return Err(LockError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "exclusive record lists {} holders",
                    self.holders.len()
                ),
            });
        }
        Ok(())
    }
}

/// Read and validate the record at `path`. Returns `None` when no record
/// exists. Never blocks beyond the single read.
pub fn read_record(path: &Path) -> Result<Option<LockRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LockError::io(
                format!("failed to read lock record '{}'", path.display()),
                e,
            ))
        }
    };

    let record: LockRecord = serde_json::from_str(&content).map_err(|e| LockError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    record.validate(path)?;
    Ok(Some(record))
}

/// Atomically write `record` to `path`: temp file in the same directory,
/// fsync, then rename over the target.
pub fn write_record(path: &Path, record: &LockRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).map_err(|e| LockError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("failed to serialize record: {}", e),
    })?;

    let temp_path = temp_path_for(path)?;

    let mut file = File::create(&temp_path).map_err(|e| {
        LockError::io(
            format!("failed to create temp record '{}'", temp_path.display()),
            e,
        )
    })?;

    file.write_all(json.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            LockError::io(
                format!("failed to write temp record '{}'", temp_path.display()),
                e,
            )
        })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LockError::io(
            format!("failed to replace lock record '{}'", path.display()),
            e,
        )
    })?;

    Ok(())
}

/// Remove the record at `path`. A missing record is success, so removal is
/// idempotent by construction.
pub fn remove_record(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(
            format!("failed to remove lock record '{}'", path.display()),
            e,
        )),
    }
}

/// Temp file path in the same directory as the target, so the final rename
/// stays on one filesystem. Suffixed with pid to keep concurrent writers
/// from clobbering each other's temp files.
fn temp_path_for(target: &Path) -> Result<std::path::PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockError::Usage(format!("invalid lock path '{}'", target.display())))?;
    Ok(parent.join(format!(".{}.{}.tmp", filename, std::process::id())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn holder_entries_get_distinct_sequences() {
        let a = HolderEntry::current();
        let b = HolderEntry::current();
        assert_eq!(a.pid, b.pid);
        assert_ne!(a.seq, b.seq);
        assert!(!a.same_holder(&b));
        assert!(a.same_holder(&a.clone()));
    }

    #[test]
    fn live_holder_is_not_stale_without_age_cap() {
        let holder = HolderEntry::current();
        assert!(!holder.is_stale(None));
    }

    #[test]
    fn old_holder_is_stale_with_age_cap() {
        let mut holder = HolderEntry::current();
        holder.acquired_at = Utc::now() - Duration::seconds(120);
        assert!(holder.is_stale(Some(60)));
        assert!(!holder.is_stale(Some(300)));
    }

    #[cfg(unix)]
    #[test]
    fn dead_pid_makes_holder_stale() {
        let mut holder = HolderEntry::current();
        holder.pid = 99_999_999;
        assert!(holder.is_stale(None));
    }

    #[test]
    fn read_missing_record_returns_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");
        assert!(read_record(&path).unwrap().is_none());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");

        let record = LockRecord::new(LockMode::Exclusive, HolderEntry::current());
        write_record(&path, &record).unwrap();

        let read = read_record(&path).unwrap().unwrap();
        assert_eq!(read.version, RECORD_VERSION);
        assert_eq!(read.mode, LockMode::Exclusive);
        assert_eq!(read.holders.len(), 1);
        assert_eq!(read.holders[0].pid, std::process::id());
    }

    #[test]
    fn unparsable_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");
        fs::write(&path, "not json at all").unwrap();

        let err = read_record(&path).unwrap_err();
        assert!(matches!(err, LockError::Corrupt { .. }));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");

        let mut record = LockRecord::new(LockMode::Shared, HolderEntry::current());
        record.version = 99;
        let json = serde_json::to_string(&record).unwrap();
        fs::write(&path, json).unwrap();

        let err = read_record(&path).unwrap_err();
        assert!(matches!(err, LockError::Corrupt { .. }));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn exclusive_record_with_two_holders_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");

        let mut record = LockRecord::new(LockMode::Exclusive, HolderEntry::current());
        record.holders.push(HolderEntry::current());
        let json = serde_json::to_string(&record).unwrap();
        fs::write(&path, json).unwrap();

        assert!(matches!(
            read_record(&path).unwrap_err(),
            LockError::Corrupt { .. }
        ));
    }

    #[test]
    fn empty_holder_list_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");
        fs::write(
            &path,
            r#"{"version":1,"mode":"shared","holders":[]}"#,
        )
        .unwrap();

        assert!(matches!(
            read_record(&path).unwrap_err(),
            LockError::Corrupt { .. }
        ));
    }

    #[test]
    fn remove_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");

        let record = LockRecord::new(LockMode::Shared, HolderEntry::current());
        write_record(&path, &record).unwrap();

        remove_record(&path).unwrap();
        assert!(!path.exists());
        // Second removal of a missing record still succeeds.
        remove_record(&path).unwrap();
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.lock");

        let record = LockRecord::new(LockMode::Shared, HolderEntry::current());
        write_record(&path, &record).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn record_staleness_requires_all_holders_stale() {
        let live = HolderEntry::current();
        let mut dead = HolderEntry::current();
        dead.acquired_at = Utc::now() - Duration::seconds(600);

        let mut record = LockRecord::new(LockMode::Shared, live);
        record.holders.push(dead);

        // One live holder keeps the record fresh even with an age cap that
        // the other holder exceeds.
        assert!(!record.is_stale(Some(300)));
    }
}
