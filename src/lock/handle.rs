//! The `FileLock` handle: acquisition, release, inspection, cleanup.
//!
//! A handle represents one process's relationship to one lock path. It is
//! exclusively owned by the caller that created it and must not be shared
//! across unrelated logical operations. The on-disk record is the single
//! source of truth; the handle caches its own claim, nothing more.
//!
//! # Fairness
//!
//! Waiters poll independently at their own retry interval. There is no FIFO
//! queue: a late-arriving shared waiter can acquire before an earlier
//! exclusive waiter if it observes compatible state first. This is a known
//! limitation of the polling design, kept as observable behavior.

use crate::error::{LockError, Result};
use crate::events::{EventKind, EventSink, LockEvent};
use crate::lock::claim::take_claim;
use crate::lock::record::{
    read_record, remove_record, write_record, HolderEntry, LockRecord,
};
use crate::lock::types::{AcquireOptions, LockMode, LockStatus};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Snapshot of the persisted record, with derived status.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock record file.
    pub record_path: PathBuf,

    /// Mode the record is held in.
    pub mode: LockMode,

    /// Current holders.
    pub holders: Vec<HolderEntry>,

    /// `Locked` when at least one holder is live, `Stale` otherwise.
    pub status: LockStatus,

    /// Earliest acquisition timestamp among holders.
    pub acquired_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pids: Vec<String> = self.holders.iter().map(|h| h.pid.to_string()).collect();
        write!(
            f,
            "{} ({}, holders: [{}]{})",
            self.record_path.display(),
            self.mode,
            pids.join(", "),
            if self.status == LockStatus::Stale {
                ", STALE"
            } else {
                ""
            }
        )
    }
}

/// Outcome of a single claim attempt.
enum ClaimOutcome {
    Claimed(HolderEntry),
    Contended { stale: bool },
}

/// Handle to a filesystem-arbitrated lock on one resource.
#[derive(Debug)]
pub struct FileLock {
    resource: PathBuf,
    record_path: PathBuf,
    max_holder_age_secs: Option<u64>,
    holder: Option<HolderEntry>,
    mode: Option<LockMode>,
    status: LockStatus,
    sink: Option<Arc<dyn EventSink>>,
}

impl FileLock {
    /// Create a handle for the given resource path. The lock record lives
    /// at `<resource>.lock`, beside the resource itself.
    pub fn new(resource: impl Into<PathBuf>) -> Self {
        let resource = resource.into();
        let record_path = record_path_for(&resource);
        Self {
            resource,
            record_path,
            max_holder_age_secs: None,
            holder: None,
            mode: None,
            status: LockStatus::Unlocked,
            sink: None,
        }
    }

    /// Cap holder age: claims older than this count as stale even when the
    /// holding process is still alive. Default is liveness-only staleness.
    pub fn with_max_holder_age(mut self, secs: u64) -> Self {
        self.max_holder_age_secs = Some(secs);
        self
    }

    /// Attach an event sink (typically a [`crate::monitor::LockMonitor`])
    /// that will observe this handle's lifecycle transitions.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn resource(&self) -> &Path {
        &self.resource
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn status(&self) -> LockStatus {
        self.status
    }

    /// Mode held by this handle, if any.
    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    /// Attempt to obtain the lock in the requested mode.
    ///
    /// Polls through contention at `retry_interval_ms` until success or the
    /// deadline. A stale incompatible record is replaced atomically when
    /// `break_stale` permits; otherwise stale detection is reported and the
    /// wait continues. No partial record is left behind on timeout.
    pub fn acquire(&mut self, mode: LockMode, options: &AcquireOptions) -> Result<()> {
        if self.holder.is_some() {
            return Err(LockError::Usage(format!(
                "handle for '{}' already holds the lock",
                self.resource.display()
            )));
        }

        self.status = LockStatus::Pending;
        let started = Instant::now();
        let mut stale_reported = false;

        loop {
            match self.try_claim(mode, options) {
                Ok(ClaimOutcome::Claimed(entry)) => {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    self.holder = Some(entry);
                    self.mode = Some(mode);
                    self.status = LockStatus::Locked;
                    self.emit(
                        LockEvent::new(&self.record_path, EventKind::Acquired)
                            .with_mode(mode)
                            .with_wait_ms(waited_ms),
                    );
                    return Ok(());
                }
                Ok(ClaimOutcome::Contended { stale }) => {
                    if stale && !stale_reported {
                        stale_reported = true;
                        self.emit(
                            LockEvent::new(&self.record_path, EventKind::StaleDetected)
                                .with_mode(mode),
                        );
                    }
                }
                Err(e) => {
                    // I/O and parse failures are not contention; surface them.
                    self.status = LockStatus::Unlocked;
                    self.emit(
                        LockEvent::new(&self.record_path, EventKind::Error)
                            .with_mode(mode)
                            .with_detail(e.to_string()),
                    );
                    return Err(e);
                }
            }

            let elapsed = started.elapsed();
            if let Some(timeout_ms) = options.timeout_ms {
                let timeout = Duration::from_millis(timeout_ms);
                if elapsed >= timeout {
                    let waited_ms = elapsed.as_millis() as u64;
                    self.status = LockStatus::Unlocked;
                    self.emit(
                        LockEvent::new(&self.record_path, EventKind::TimedOut)
                            .with_mode(mode)
                            .with_wait_ms(waited_ms),
                    );
                    return Err(LockError::Timeout {
                        path: self.record_path.clone(),
                        waited_ms,
                    });
                }
                let remaining = timeout - elapsed;
                thread::sleep(remaining.min(Duration::from_millis(options.retry_interval_ms)));
            } else {
                thread::sleep(Duration::from_millis(options.retry_interval_ms));
            }
        }
    }

    /// One atomic claim attempt under the mutation guard.
    fn try_claim(&self, mode: LockMode, options: &AcquireOptions) -> Result<ClaimOutcome> {
        let _claim = take_claim(&self.record_path)?;

        match read_record(&self.record_path)? {
            None => {
                let entry = HolderEntry::current();
                write_record(&self.record_path, &LockRecord::new(mode, entry.clone()))?;
                Ok(ClaimOutcome::Claimed(entry))
            }
            Some(mut record) => {
                if mode.compatible_with(record.mode) {
                    let entry = HolderEntry::current();
                    record.holders.push(entry.clone());
                    write_record(&self.record_path, &record)?;
                    return Ok(ClaimOutcome::Claimed(entry));
                }

                if record.is_stale(self.max_holder_age_secs) {
                    if options.break_stale {
                        let entry = HolderEntry::current();
                        write_record(
                            &self.record_path,
                            &LockRecord::new(mode, entry.clone()),
                        )?;
                        return Ok(ClaimOutcome::Claimed(entry));
                    }
                    return Ok(ClaimOutcome::Contended { stale: true });
                }

                Ok(ClaimOutcome::Contended { stale: false })
            }
        }
    }

    /// Release a previously acquired claim.
    ///
    /// Idempotent: releasing an already-unlocked handle is a successful
    /// no-op. A shared release decrements the holder set; the last holder
    /// out (and any exclusive release) removes the record.
    pub fn release(&mut self) -> Result<()> {
        if self.holder.is_none() {
            return Ok(());
        }

        // Claim first: a failed claim must leave the handle still holding,
        // so the caller can retry instead of leaking a record entry.
        let _claim = take_claim(&self.record_path)?;

        let Some(entry) = self.holder.take() else {
            return Ok(());
        };
        let mode = self.mode.take();
        self.status = LockStatus::Unlocked;

        if let Some(mut record) = read_record(&self.record_path)? {
            record.holders.retain(|h| !h.same_holder(&entry));
            if record.holders.is_empty() {
                remove_record(&self.record_path)?;
            } else {
                write_record(&self.record_path, &record)?;
            }
        }
        // A missing record (or one that no longer lists us, e.g. after a
        // stale break by another process) still counts as released.

        let mut event = LockEvent::new(&self.record_path, EventKind::Released);
        if let Some(mode) = mode {
            event = event.with_mode(mode);
        }
        self.emit(event);
        Ok(())
    }

    /// Non-mutating read of the current persisted record.
    ///
    /// Returns `None` when no record exists. Status is derived by probing
    /// holder liveness; never blocks beyond the single read.
    pub fn info(&self) -> Result<Option<LockInfo>> {
        let Some(record) = read_record(&self.record_path)? else {
            return Ok(None);
        };

        let status = if record.is_stale(self.max_holder_age_secs) {
            LockStatus::Stale
        } else {
            LockStatus::Locked
        };

        Ok(Some(LockInfo {
            record_path: self.record_path.clone(),
            mode: record.mode,
            acquired_at: record.acquired_at(),
            holders: record.holders,
            status,
        }))
    }

    /// Unconditionally remove the lock record, regardless of ownership or
    /// status. Used for process-exit and test teardown; a missing record is
    /// not an error.
    pub fn cleanup(&mut self) -> Result<()> {
        self.holder = None;
        self.mode = None;
        self.status = LockStatus::Unlocked;
        remove_record(&self.record_path)
    }

    /// Acquire and wrap this handle in an RAII guard.
    pub fn acquire_guard(mut self, mode: LockMode, options: &AcquireOptions) -> Result<LockGuard> {
        self.acquire(mode, options)?;
        Ok(LockGuard {
            lock: self,
            released: false,
        })
    }

    /// Scoped acquisition on this handle: acquire, run `work` with the live
    /// handle, and guarantee release on every exit path of `work` (error
    /// returns and panics included, via the guard's `Drop`).
    pub fn run<T, F>(self, mode: LockMode, options: &AcquireOptions, work: F) -> Result<T>
    where
        F: FnOnce(&FileLock) -> Result<T>,
    {
        let guard = self.acquire_guard(mode, options)?;
        match work(guard.lock()) {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            // The guard's Drop releases on the error path.
            Err(e) => Err(e),
        }
    }

    fn emit(&self, event: LockEvent) {
        if let Some(sink) = &self.sink {
            sink.record(event);
        }
    }
}

fn record_path_for(resource: &Path) -> PathBuf {
    let mut name = resource.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// RAII guard for an acquired lock.
///
/// When dropped, the claim is released automatically. If release fails
/// during drop, a warning is logged but no panic occurs; call
/// [`LockGuard::release`] to handle the error explicitly.
#[derive(Debug)]
pub struct LockGuard {
    lock: FileLock,
    released: bool,
}

impl LockGuard {
    /// The live handle, for inspection while the lock is held.
    pub fn lock(&self) -> &FileLock {
        &self.lock
    }

    /// Manually release the lock, surfacing any error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.lock.release() {
                log::warn!(
                    "failed to release lock '{}' on drop: {}",
                    self.lock.record_path().display(),
                    e
                );
            }
        }
    }
}

/// Acquire the lock for `resource`, run `work` with the live handle, and
/// guarantee release on every exit path of `work`.
pub fn with_lock<T, F>(
    resource: impl Into<PathBuf>,
    mode: LockMode,
    options: &AcquireOptions,
    work: F,
) -> Result<T>
where
    F: FnOnce(&FileLock) -> Result<T>,
{
    FileLock::new(resource).run(mode, options, work)
}
