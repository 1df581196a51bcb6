//! Cross-process file locking.
//!
//! Independent processes coordinate access to a shared resource through an
//! on-disk JSON lock record (`<resource>.lock`). The record is advisory: it
//! only constrains cooperating processes that check it.
//!
//! # Model
//!
//! - `Shared` mode admits any number of concurrent holders; `Exclusive`
//!   admits exactly one, excluded from any shared holder.
//! - Every record mutation (claim, shared join, release decrement, stale
//!   break) runs under a sibling `.claim` file created with **create_new**
//!   semantics, so read-modify-write of the record is atomic with respect
//!   to other processes and other threads of this process.
//! - A holder whose process is no longer alive (or whose claim exceeds a
//!   configurable age) is stale; stale records can be broken atomically
//!   when the acquirer opts in.
//!
//! # RAII
//!
//! Scoped acquisition goes through [`LockGuard`] / [`with_lock`], which
//! release on every exit path of the protected work.

mod claim;
mod handle;
mod liveness;
mod record;
mod types;


// Re-export public API
pub use handle::{with_lock, FileLock, LockGuard, LockInfo};
pub use liveness::pid_alive;
pub use record::{read_record, HolderEntry, LockRecord, RECORD_VERSION};
#[cfg(test)]
pub(crate) use record::write_record;
pub use types::{AcquireOptions, LockMode, LockStatus};
