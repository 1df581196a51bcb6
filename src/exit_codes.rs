//! Exit code constants for the bolt CLI.
//!
//! - 0: Success
//! - 1: Usage error (bad args, invalid state)
//! - 2: Lock acquisition timed out
//! - 3: Lock record corrupt
//! - 4: Filesystem I/O failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Usage error: bad arguments or invalid state.
pub const USAGE_ERROR: i32 = 1;

/// Lock acquisition timed out while an incompatible holder was active.
pub const LOCK_TIMEOUT: i32 = 2;

/// The on-disk lock record could not be parsed.
pub const LOCK_CORRUPT: i32 = 3;

/// Underlying filesystem operation failed.
pub const IO_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USAGE_ERROR, LOCK_TIMEOUT, LOCK_CORRUPT, IO_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
