//! Halt / wait / resume / step engine (§4.7) and the `SIG*` signal values
//! `halt_wait` reports to the GDB remote stub.
//!
//! Grounded in the teacher's `halt`/`run`/`step` (`Armv7a::halt` writes
//! `DBGDRCR.HRQ` and busy-polls `DBGDSCR.HALTED`; `step` reprograms BP0 as
//! a mismatch comparator, resumes, waits, restores BP0). This module keeps
//! that shape but separates "request" from "wait" as spec §4.7 and §6.2
//! require (so a GDB stub can poll non-blockingly), adds the `MOE` → signal
//! decode and the `SIGLOST` global-teardown path the teacher's single-core
//! CLI tool never needed, and defers to [`crate::regfile`] for the register
//! cache fill/flush the teacher's lazier per-register cache doesn't need.

use crate::error::{tolerate_timeout, Error};
use crate::opcodes::ICIALLU;
use crate::registers::{Bcr, Bvr, Drcr, Dscr, HaltReason, BP_TYPE_INSTRUCTION_MISMATCH};
use crate::session::TargetSession;

/// POSIX `SIGINT`: reported when the core halted on an explicit halt
/// request (§4.7, MOE == 0).
pub const SIGINT: i32 = 2;
/// POSIX `SIGTRAP`: reported for every other method of entry (breakpoint,
/// step, exception, ...) (§4.7).
pub const SIGTRAP: i32 = 5;
/// POSIX `SIGLOST`: reported when the probe connection is permanently lost
/// while waiting for halt (§4.7).
pub const SIGLOST: i32 = 29;

impl TargetSession {
    /// `halt_request` (§4.7): write `DRCR.HRQ`. A timeout is tolerated (the
    /// core may be in WFI) and only logged; any other transport error
    /// propagates.
    pub fn halt_request(&mut self) -> Result<(), Error> {
        let mut drcr = Drcr(0);
        drcr.set_hrq(true);

        match tolerate_timeout(|| self.state.apb_write(Drcr::NUMBER, drcr.into()))? {
            Some(()) => Ok(()),
            None => {
                log::info!("halt request timed out, target may be in WFI");
                Ok(())
            }
        }
    }

    /// `halt_wait` (§4.7, §6.2): poll `DSCR` until the core reports halted
    /// or the caller's `timeout_ms` budget expires.
    ///
    /// - A transport error means the probe is permanently lost: the
    ///   registered `on_probe_lost` callback runs (§9's "message to the
    ///   enclosing lifecycle manager" in place of a direct global
    ///   mutation) and [`SIGLOST`] is returned.
    /// - A timeout, or a DSCR read that simply doesn't show `HALTED` yet,
    ///   returns `0` (still running).
    /// - Once halted, `DSCR.ITREN` is set (re-enabling instruction
    ///   injection), the method of entry is decoded into [`SIGINT`] or
    ///   [`SIGTRAP`], the register cache is populated, and the signal is
    ///   returned.
    pub fn halt_wait(&mut self, timeout_ms: u64) -> Result<i32, Error> {
        let deadline = self.platform.timeout_set(timeout_ms);

        loop {
            let poll = tolerate_timeout(|| self.state.apb_read(Dscr::NUMBER));

            let raw = match poll {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    if self.platform.timeout_is_expired(&deadline) {
                        return Ok(0);
                    }
                    continue;
                }
                Err(err) => {
                    log::warn!("lost debug probe connection while waiting for halt: {err}");
                    if let Some(callback) = self.on_probe_lost.as_mut() {
                        callback();
                    }
                    return Ok(SIGLOST);
                }
            };

            let dscr = Dscr(raw);
            if dscr.halted() {
                let reason = HaltReason::from_moe(dscr.moe());
                log::debug!("core halted, method of entry: {reason:?}");

                let mut dscr = dscr;
                dscr.set_itren(true);
                self.state.apb_write(Dscr::NUMBER, dscr.into())?;

                self.state.reg_cache = self.state.regs_read_internal()?;

                return Ok(if reason == HaltReason::Request {
                    SIGINT
                } else {
                    SIGTRAP
                });
            }

            if self.platform.timeout_is_expired(&deadline) {
                return Ok(0);
            }
        }
    }

    /// `halt_resume` (§4.7, §6.2): the register-cache flush, I-cache
    /// invalidate and `DRCR.RRQ` restart dance shared by a plain resume and
    /// a single step. When `step` is set, BP0 is programmed as an
    /// instruction-mismatch comparator over the cached PC before resuming,
    /// so the core re-halts after exactly one instruction (§4.8); otherwise
    /// BP0 is restored from `bpc0`.
    pub fn halt_resume(&mut self, step: bool) -> Result<(), Error> {
        if step {
            self.arm_step_breakpoint()?;
        } else {
            self.restore_bp0()?;
        }

        let cache = self.state.reg_cache;
        self.state.regs_write_internal(&cache)?;

        self.state.exec(crate::opcodes::MCR_BASE | ICIALLU)?;

        let mut dscr = Dscr(self.state.apb_read(Dscr::NUMBER)?);
        dscr.set_intdis(step);
        dscr.set_itren(false);
        self.state.apb_write(Dscr::NUMBER, dscr.into())?;

        loop {
            let mut drcr = Drcr(0);
            drcr.set_cse(true);
            drcr.set_rrq(true);
            self.state.apb_write(Drcr::NUMBER, drcr.into())?;

            let dscr = Dscr(self.state.apb_read(Dscr::NUMBER)?);
            if dscr.restarted() {
                break;
            }
        }

        Ok(())
    }

    /// Program BP0 as an instruction-mismatch comparator over the cached
    /// PC, narrowing `BAS` for Thumb half-words (§4.7 step 1, §4.8).
    fn arm_step_breakpoint(&mut self) -> Result<(), Error> {
        let pc = self.state.reg_cache.r[15];
        let len = if self.state.reg_cache.thumb() { 2 } else { 4 };

        let mut bcr = Bcr(0);
        bcr.set_bt(BP_TYPE_INSTRUCTION_MISMATCH);
        bcr.set_bas(crate::breakpoint::bp_bas(pc, len) >> 5);
        bcr.set_e(true);

        self.state.apb_write(Bvr::NUMBER, pc & !3)?;
        self.state.apb_write(Bcr::NUMBER, bcr.into())?;

        Ok(())
    }

    /// Restore BP0's pre-step contents from `bpc0` (§4.7 step 1, §3).
    fn restore_bp0(&mut self) -> Result<(), Error> {
        let bpc0 = self.state.bpc0;
        self.state.apb_write(Bcr::NUMBER, bpc0)
    }
}
