//! Short-lived claim file serializing lock record mutations.
//!
//! `create_new` gives us an atomic claim across processes, but joining a
//! shared record, decrementing it on release, and breaking a stale record
//! all require read-modify-write of the JSON record. Every such mutation
//! runs under a sibling `.claim` file created exclusively, turning the
//! record update into a critical section for other processes and for other
//! threads of this process alike. The claim is held only for the few
//! filesystem operations of one mutation, never across an acquire wait.

use crate::error::{LockError, Result};
use crate::lock::liveness::pid_alive;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// How long one mutation may wait for the claim file before giving up.
/// Claims are held for microseconds under normal operation, so exhausting
/// this means a claimant crashed mid-mutation or the filesystem is wedged.
const CLAIM_ATTEMPTS: u32 = 200;
const CLAIM_RETRY: Duration = Duration::from_millis(5);

/// Guard for the claim file. Removes it on drop.
#[derive(Debug)]
pub(super) struct ClaimGuard {
    path: PathBuf,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove claim file '{}': {}", self.path.display(), e);
            }
        }
    }
}

/// Acquire the mutation claim for `record_path`.
///
/// A claim file left behind by a dead process is broken in place; one held
/// by a live process is waited on briefly, since mutations are short.
pub(super) fn take_claim(record_path: &Path) -> Result<ClaimGuard> {
    let claim_path = claim_path_for(record_path);

    for _ in 0..CLAIM_ATTEMPTS {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&claim_path)
        {
            Ok(mut file) => {
                // Record our pid so a successor can tell a crashed claimant
                // from a live one.
                let _ = write!(file, "{}", std::process::id());
                return Ok(ClaimGuard { path: claim_path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if claimant_is_dead(&claim_path) {
                    // Orphaned claim: break it and retry immediately.
                    break_orphan(&claim_path);
                    continue;
                }
                thread::sleep(CLAIM_RETRY);
            }
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to create claim file '{}'", claim_path.display()),
                    e,
                ))
            }
        }
    }

    Err(LockError::io(
        format!(
            "claim file '{}' held for too long by a live process",
            claim_path.display()
        ),
        std::io::Error::new(std::io::ErrorKind::TimedOut, "claim contention"),
    ))
}

/// Tomb-name counter so concurrent breakers in one process never collide.
static NEXT_TOMB: AtomicU64 = AtomicU64::new(1);

/// Break an orphaned claim.
///
/// The file is first captured with an atomic rename to a name unique to
/// this call, so of several concurrent breakers exactly one wins and the
/// losers find nothing to capture. The captured claimant is then
/// re-checked before the file is discarded: a rival may have broken the
/// orphan and installed its own live claim between our liveness read and
/// the rename, and that claim must survive.
fn break_orphan(claim_path: &Path) {
    let mut name = claim_path.as_os_str().to_os_string();
    name.push(format!(
        ".break.{}.{}",
        std::process::id(),
        NEXT_TOMB.fetch_add(1, Ordering::Relaxed)
    ));
    let tomb = PathBuf::from(name);

    if fs::rename(claim_path, &tomb).is_err() {
        // A rival captured it first.
        return;
    }

    if claimant_is_dead(&tomb) {
        let _ = fs::remove_file(&tomb);
    } else {
        // We captured a live successor's claim by mistake; put it back.
        let _ = fs::rename(&tomb, claim_path);
    }
}

fn claim_path_for(record_path: &Path) -> PathBuf {
    let mut name = record_path.as_os_str().to_os_string();
    name.push(".claim");
    PathBuf::from(name)
}

/// Whether the claim file's recorded pid no longer corresponds to a live
/// process. Unreadable or empty claim files are treated as live to stay on
/// the safe side; the writer may not have flushed yet.
fn claimant_is_dead(claim_path: &Path) -> bool {
    match fs::read_to_string(claim_path) {
        Ok(content) => match content.trim().parse::<u32>() {
            Ok(pid) => !pid_alive(pid),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn claim_is_exclusive_and_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("data.lock");

        let guard = take_claim(&record_path).unwrap();
        let claim_path = claim_path_for(&record_path);
        assert!(claim_path.exists());

        drop(guard);
        assert!(!claim_path.exists());

        // Re-claimable after release.
        let _guard = take_claim(&record_path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn orphaned_claim_from_dead_process_is_broken() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("data.lock");
        let claim_path = claim_path_for(&record_path);

        fs::write(&claim_path, "99999999").unwrap();

        let _guard = take_claim(&record_path).unwrap();
    }

    #[test]
    fn claim_path_appends_suffix() {
        let path = claim_path_for(Path::new("/tmp/data.lock"));
        assert_eq!(path, Path::new("/tmp/data.lock.claim"));
    }

    #[cfg(unix)]
    #[test]
    fn breaking_never_discards_a_live_claim() {
        // A stale liveness verdict can be outdated by the time the break
        // lands: a rival may have broken the orphan and reclaimed. A claim
        // from a live process must survive the break attempt.
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("data.lock");
        let claim_path = claim_path_for(&record_path);

        fs::write(&claim_path, format!("{}", std::process::id())).unwrap();
        break_orphan(&claim_path);

        let content = fs::read_to_string(&claim_path).unwrap();
        assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[cfg(unix)]
    #[test]
    fn breaking_a_dead_claim_leaves_no_files_behind() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("data.lock");
        let claim_path = claim_path_for(&record_path);

        fs::write(&claim_path, "99999999").unwrap();
        break_orphan(&claim_path);

        assert!(!claim_path.exists());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[cfg(unix)]
    #[test]
    fn concurrent_breakers_preserve_mutual_exclusion() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let record_path = Arc::new(dir.path().join("data.lock"));
        fs::write(claim_path_for(&record_path), "99999999").unwrap();

        let in_section = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let record_path = Arc::clone(&record_path);
                let in_section = Arc::clone(&in_section);
                let overlapped = Arc::clone(&overlapped);
                thread::spawn(move || {
                    let guard = take_claim(&record_path).unwrap();
                    if in_section.swap(true, Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(10));
                    in_section.store(false, Ordering::SeqCst);
                    drop(guard);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
