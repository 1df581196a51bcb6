//! Process liveness probing.
//!
//! Staleness detection needs exactly one platform capability: "is this
//! process identifier currently live?". Everything else in the lock
//! subsystem stays platform-agnostic by going through [`pid_alive`].

/// Check whether a process with the given pid currently exists.
///
/// On unix this sends signal 0, which performs permission and existence
/// checks without delivering a signal. A live process we lack permission
/// to signal (EPERM) still counts as alive.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        true
    } else {
        std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
    }
}

/// Non-unix fallback: no cheap existence probe is wired up, so holders are
/// presumed alive and staleness falls back to the age-based policy alone.
#[cfg(not(unix))]
pub fn pid_alive(pid: u32) -> bool {
    let _ = pid;
    true
}
