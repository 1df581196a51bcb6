//! Error types for bolt.
//!
//! Uses thiserror for derive macros. Every failed acquisition surfaces as a
//! typed error; nothing is silently swallowed. Release and cleanup treat
//! "already unlocked" as success, so those paths rarely produce errors at all.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The acquisition deadline elapsed while the lock was held by an
    /// incompatible holder. Recoverable: the caller decides whether to
    /// retry or abandon.
    #[error("timed out after {waited_ms}ms waiting for lock '{}'", path.display())]
    Timeout { path: PathBuf, waited_ms: u64 },

    /// The on-disk lock record could not be parsed or is internally
    /// inconsistent. Not auto-recovered; the caller may force-remove the
    /// record via `cleanup()`.
    #[error("corrupt lock record '{}': {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Underlying filesystem failure (permissions, missing directory,
    /// disk full). Surfaced as-is; the acquire retry loop only retries
    /// contention, never I/O failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Bad arguments or invalid state, CLI-facing.
    #[error("{0}")]
    Usage(String),
}

impl LockError {
    /// Wrap an I/O error with a human-readable context string.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LockError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate process exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Usage(_) => exit_codes::USAGE_ERROR,
            LockError::Timeout { .. } => exit_codes::LOCK_TIMEOUT,
            LockError::Corrupt { .. } => exit_codes::LOCK_CORRUPT,
            LockError::Io { .. } => exit_codes::IO_FAILURE,
        }
    }
}

/// Result type alias for bolt operations.
pub type Result<T> = std::result::Result<T, LockError>;
