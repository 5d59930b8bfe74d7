//! Exit code constants for the axiom CLI.
//!
//! - 0: Success (all dispatched tasks succeeded)
//! - 1: User error or a dispatch run that left failed/blocked tasks behind
//! - 2: Stale session reported by the watchdog
//! - 3: Git operation failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid state, or an unsuccessful dispatch.
pub const USER_ERROR: i32 = 1;

/// The session heartbeat is stale (watchdog single-check mode).
pub const STALE_SESSION: i32 = 2;

/// Git operation failure: commit, tag, or repository detection errors.
pub const GIT_FAILURE: i32 = 3;
