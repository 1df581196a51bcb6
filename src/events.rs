//! Lock lifecycle events.
//!
//! Every observable lock transition is an immutable [`LockEvent`]. The lock
//! primitive emits events through the [`EventSink`] trait so it stays a leaf
//! component: the monitor implements the trait and subscribes to primitives,
//! never the other way around.
//!
//! Events serialize to single-line JSON, so an event log on disk is NDJSON
//! (one object per line, append-only). The log feeds diagnostics; it is
//! never authoritative over lock state.

use crate::error::{LockError, Result};
use crate::lock::LockMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Kinds of lock lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A handle successfully claimed or joined a record.
    Acquired,
    /// A handle released its claim.
    Released,
    /// An acquire abandoned its wait at the deadline.
    TimedOut,
    /// A record was observed whose holders are all dead or over-age.
    /// Informational; breaking the lock stays gated by `break_stale`.
    StaleDetected,
    /// An inspection or mutation failed with an I/O or parse error.
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Acquired => "acquired",
            EventKind::Released => "released",
            EventKind::TimedOut => "timed_out",
            EventKind::StaleDetected => "stale_detected",
            EventKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// One immutable record of a lock lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEvent {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The lock record path the event concerns.
    pub path: PathBuf,

    /// The transition kind.
    pub kind: EventKind,

    /// Mode involved, when the transition has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LockMode>,

    /// Wall-clock wait before the transition, for acquisitions and timeouts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,

    /// Freeform detail, mainly for error events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LockEvent {
    /// Create an event stamped now.
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            ts: Utc::now(),
            path: path.into(),
            kind,
            mode: None,
            wait_ms: None,
            detail: None,
        }
    }

    pub fn with_mode(mut self, mode: LockMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = Some(wait_ms);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Serialize to a single-line JSON string for NDJSON appends.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LockError::Corrupt {
            path: self.path.clone(),
            reason: format!("failed to serialize event: {}", e),
        })
    }
}

/// Consumer of lock lifecycle events.
///
/// Implementations must tolerate being called from any thread that touches
/// a lock, including while the caller holds its own locks.
pub trait EventSink: Send + Sync {
    fn record(&self, event: LockEvent);
}

impl std::fmt::Debug for dyn EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventSink")
    }
}

/// Append an event to an NDJSON log file, creating it if needed.
///
/// One line per append, synced to disk so the log survives a crash that
/// follows the transition it records.
pub fn append_event(log_path: &Path, event: &LockEvent) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(parent) = log_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LockError::io(
                    format!("failed to create event log directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| {
            LockError::io(
                format!("failed to open event log '{}'", log_path.display()),
                e,
            )
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        LockError::io(
            format!("failed to write event to '{}'", log_path.display()),
            e,
        )
    })?;

    file.sync_all().map_err(|e| {
        LockError::io(
            format!("failed to sync event log '{}'", log_path.display()),
            e,
        )
    })?;

    Ok(())
}
