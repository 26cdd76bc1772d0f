//! Collaborator contract for the platform reset line and timing utilities
//! (§6.1). Kept as a small trait so the halt/reset routines can be
//! exercised against a `MockPlatform` in tests without a real probe.

use crate::error::Error;
use std::time::{Duration, Instant};

/// A deadline set by [`Platform::timeout_set`] and polled with
/// [`Platform::timeout_is_expired`]. Modeled as a concrete struct (rather
/// than an opaque handle) since Rust's `Instant` already gives us exactly
/// the wall-clock deadline spec §5 asks for.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    deadline: Instant,
}

impl Timeout {
    /// A timeout that is already expired; used as a placeholder before the
    /// first `timeout_set`.
    pub fn expired() -> Self {
        Timeout {
            deadline: Instant::now(),
        }
    }
}

/// The platform reset line and timing collaborator (§6.1).
pub trait Platform: Send {
    /// Drive the system reset (`nSRST`) line.
    fn srst_set_val(&mut self, asserted: bool) -> Result<(), Error>;

    /// Read back the current state of the system reset line.
    fn srst_get_val(&mut self) -> Result<bool, Error>;

    /// Busy-wait for `ms` milliseconds. Bounded waits elsewhere in this
    /// crate are built out of this plus `timeout_set`/`timeout_is_expired`,
    /// not out of unbounded sleeps.
    fn delay(&mut self, ms: u64);

    /// Arm a deadline `ms` milliseconds from now.
    fn timeout_set(&mut self, ms: u64) -> Timeout {
        Timeout {
            deadline: Instant::now() + Duration::from_millis(ms),
        }
    }

    /// `true` once the deadline set by `timeout_set` has passed.
    fn timeout_is_expired(&mut self, timeout: &Timeout) -> bool {
        Instant::now() >= timeout.deadline
    }
}
