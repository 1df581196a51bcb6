//! Core lock types: modes, statuses, acquisition options.

use serde::{Deserialize, Serialize};

/// Access mode requested for a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Multiple concurrent holders permitted; read-like access.
    Shared,
    /// At most one holder; write-like access.
    Exclusive,
}

impl LockMode {
    /// Whether a request in `self` mode can join a record held in
    /// `existing` mode. Only shared-on-shared is compatible.
    pub fn compatible_with(self, existing: LockMode) -> bool {
        matches!((self, existing), (LockMode::Shared, LockMode::Shared))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "shared" => Ok(LockMode::Shared),
            "exclusive" => Ok(LockMode::Exclusive),
            other => Err(format!(
                "invalid lock mode '{}' (expected 'shared' or 'exclusive')",
                other
            )),
        }
    }
}

/// Status of a lock as observed by one handle.
///
/// `Stale` is a property of the persisted record as observed, not a state a
/// handle reaches by itself: a handle only transitions from `Pending` to
/// `Locked` once it has validly claimed (or broken) the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No claim held by this handle.
    Unlocked,
    /// An acquire is in its retry loop.
    Pending,
    /// The on-disk record names this handle's holder and its process is alive.
    Locked,
    /// A record exists but none of its holders' processes are alive.
    Stale,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LockStatus::Unlocked => "unlocked",
            LockStatus::Pending => "pending",
            LockStatus::Locked => "locked",
            LockStatus::Stale => "stale",
        };
        f.write_str(s)
    }
}

/// Options controlling one `acquire()` call.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Overall deadline. `Some(0)` fails fast on first contention,
    /// `None` waits indefinitely.
    pub timeout_ms: Option<u64>,

    /// Sleep between contention re-checks.
    pub retry_interval_ms: u64,

    /// Permit atomically replacing a stale record (every holder dead or
    /// over the configured age) with our own claim.
    pub break_stale: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            retry_interval_ms: 50,
            break_stale: false,
        }
    }
}

impl AcquireOptions {
    /// Fail-fast options: a single attempt, no waiting.
    pub fn try_once() -> Self {
        Self {
            timeout_ms: Some(0),
            ..Self::default()
        }
    }

    /// Options with a bounded wait.
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms: Some(timeout_ms),
            ..Self::default()
        }
    }
}

/// Get the owner string recorded with each holder (e.g., `user@HOST`).
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_is_compatible_with_shared_only() {
        assert!(LockMode::Shared.compatible_with(LockMode::Shared));
        assert!(!LockMode::Shared.compatible_with(LockMode::Exclusive));
        assert!(!LockMode::Exclusive.compatible_with(LockMode::Shared));
        assert!(!LockMode::Exclusive.compatible_with(LockMode::Exclusive));
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("shared".parse::<LockMode>().unwrap(), LockMode::Shared);
        assert_eq!(
            "exclusive".parse::<LockMode>().unwrap(),
            LockMode::Exclusive
        );
        assert!("write".parse::<LockMode>().is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LockMode::Exclusive).unwrap(),
            "\"exclusive\""
        );
        assert_eq!(
            serde_json::to_string(&LockMode::Shared).unwrap(),
            "\"shared\""
        );
    }

    #[test]
    fn default_options_wait_indefinitely() {
        let opts = AcquireOptions::default();
        assert!(opts.timeout_ms.is_none());
        assert!(opts.retry_interval_ms > 0);
        assert!(!opts.break_stale);
    }

    #[test]
    fn try_once_fails_fast() {
        assert_eq!(AcquireOptions::try_once().timeout_ms, Some(0));
    }

    #[test]
    fn owner_string_contains_separator() {
        let owner = owner_string();
        assert!(owner.contains('@'));
    }
}
