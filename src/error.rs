//! Crate-wide error type.
//!
//! Mirrors the teacher's `Error` / `Armv7aError` split: architecture-specific
//! failures are their own small `thiserror` enum, folded into this crate's
//! `Error` through [`Error::architecture_specific`] so callers can match on
//! the high-level kind (transport vs. timeout vs. fault) without needing to
//! know about every leaf variant.

use std::fmt;

/// Errors produced by the ARMv7-A debug core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The `AccessPort`/`Platform` collaborator reported a transport fault
    /// (a failed APB or AHB transaction). Not recoverable locally except in
    /// `reset` and `halt_wait`, per spec §7.
    #[error("debug transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// A wait bounded by a platform deadline expired without the expected
    /// condition being observed.
    #[error("operation timed out")]
    Timeout,

    /// Instruction injection completed with `DSCR.SDABORT_L` (or
    /// `ADABORT_L`) set: the injected instruction faulted on the target.
    #[error("a data abort occurred while executing an injected instruction")]
    DataAbort,

    /// `PAR.F` was set after a CP15 address-translation operation.
    #[error("MMU translation fault for address {0:#010x}")]
    MmuFault(u32),

    /// `exec`/`read_gp`/`write_gp` was asked to operate on a register
    /// number or breakpoint index the core does not have.
    #[error("register number {0} is not valid for ARMv7-A")]
    InvalidRegisterNumber(u16),

    /// An operation that requires the core to be halted was attempted while
    /// it was running.
    #[error("core is running but the operation requires it to be halted")]
    NotHalted,

    /// The probe was permanently lost (a transport error while waiting for
    /// halt). The caller must treat the enclosing session as torn down.
    #[error("debug probe connection lost")]
    ProbeLost,

    /// Architecture-specific error, preserved as a boxed source so its
    /// concrete type can still be recovered with `downcast_ref`, matching
    /// the teacher's `Error::ArchitectureSpecific(Box<dyn Error>)` pattern.
    #[error(transparent)]
    ArchitectureSpecific(#[from] anyhow::Error),
}

impl Error {
    /// Wrap an architecture-specific error (anything implementing
    /// `std::error::Error + Send + Sync + 'static`) into the crate's
    /// `Error` type.
    pub fn architecture_specific<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::ArchitectureSpecific(anyhow::Error::new(err))
    }

    /// Wrap an opaque transport failure reported by an `AccessPort`.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(anyhow::Error::new(err))
    }

    /// `true` if this error represents a timeout (as opposed to a hard
    /// transport failure) — used by `halt_request`/`halt_wait` to decide
    /// whether to tolerate it (spec §5, §9).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

/// Run `f`, mapping a `Timeout` into `Ok(None)` and propagating everything
/// else. This is the Rust expression of spec §5/§9's "scoped exception"
/// requirement at the three sites that must tolerate `TIMEOUT` but not
/// `ERROR`: `halt_request`, `halt_wait`'s polling loop, and the reset
/// reacquire loop — each wraps one protected access in this helper instead
/// of a try/catch block.
pub fn tolerate_timeout<T>(f: impl FnOnce() -> Result<T, Error>) -> Result<Option<T>, Error> {
    match f() {
        Ok(value) => Ok(Some(value)),
        Err(Error::Timeout) => Ok(None),
        Err(other) => Err(other),
    }
}

/// A placeholder transport error type for collaborators that don't have a
/// richer one of their own; `AccessPort` implementations are free to report
/// any `std::error::Error`.
#[derive(Debug)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}
