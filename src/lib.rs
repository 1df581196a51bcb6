//! Bolt: cross-process file locking with stale-lock detection and
//! lifecycle monitoring.
//!
//! Independent processes on one host coordinate access to a shared
//! resource using the filesystem as the arbitration medium. The two
//! components, with one dependency direction:
//!
//! - [`lock`] — the leaf primitive: atomic claim of an on-disk lock
//!   record, shared/exclusive modes, bounded waiting, stale-holder
//!   detection and breaking, and RAII scoped acquisition.
//! - [`monitor`] — observes lock lifecycle events emitted by primitives,
//!   aggregates statistics, and periodically sweeps tracked records for
//!   staleness. Never reaches into the primitive's internals.
//!
//! ```no_run
//! use bolt::lock::{with_lock, AcquireOptions, LockMode};
//!
//! with_lock(
//!     "/var/lib/app/state.db",
//!     LockMode::Exclusive,
//!     &AcquireOptions::with_timeout(5000),
//!     |_lock| {
//!         // mutate the protected resource
//!         Ok(())
//!     },
//! )?;
//! # Ok::<(), bolt::error::LockError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod lock;
pub mod monitor;
