//! Attach / detach (§4.9): entering and leaving halting debug mode.
//!
//! `probe` itself (discovery of the debug base's AHB companion, reading
//! `DBGDIDR`) lives on [`crate::session::TargetSession::probe`] next to the
//! state it constructs. This module has the other two lifecycle
//! transitions spec §4.9 describes, grounded in the teacher's
//! `Armv7a::new` discovery dance (read `DBGDSCR`, decide halted-vs-running)
//! generalized into a real attach/detach pair the teacher's single always
//! already-halted CLI session never needed.

use crate::error::Error;
use crate::opcodes::ICIALLU;
use crate::registers::{Drcr, Dscr, EXTDCCMODE_STALL};
use crate::session::TargetSession;

/// Number of halt-wait retries `attach` allows while polling for the halt
/// request to take effect (§4.9).
const ATTACH_HALT_RETRIES: u32 = 10;
/// Delay between `attach`'s halt-wait retries, in milliseconds (§4.9).
const ATTACH_HALT_RETRY_DELAY_MS: u64 = 200;

impl TargetSession {
    /// `attach` (§4.9, §6.2): clear any pending fault, enable halting debug
    /// mode (`HDBGEN|ITREN`) with the DCC in stall mode, request a halt,
    /// and poll for it honouring the platform reset line — up to 10
    /// retries spaced 200 ms apart. Clears all comparator control
    /// registers and allocations (§8: `detach; attach` ⇒ all slots free)
    /// and deasserts system reset. Returns `true` iff the core ended up
    /// halted.
    pub fn attach(&mut self) -> Result<bool, Error> {
        self.state.mmu_fault = false;

        let mut dscr = Dscr(self.state.apb_read(Dscr::NUMBER)?);
        dscr.set_hdbgen(true);
        dscr.set_itren(true);
        dscr.set_extdccmode(EXTDCCMODE_STALL);
        self.state.apb_write(Dscr::NUMBER, dscr.into())?;

        self.halt_request()?;

        let mut halted = false;
        for attempt in 0..ATTACH_HALT_RETRIES {
            if self.platform.srst_get_val()? {
                log::debug!("system reset is asserted while attaching, waiting it out");
            }

            let signal = self.halt_wait(ATTACH_HALT_RETRY_DELAY_MS)?;
            if signal != 0 {
                halted = true;
                break;
            }

            log::debug!("attach: halt not observed yet (attempt {attempt})");
        }

        self.state.clear_all_hw_bps()?;
        self.state.bpc0 = 0;

        self.platform.srst_set_val(false)?;

        Ok(halted)
    }

    /// `detach` (§4.9, §6.2): clear all comparators, flush the register
    /// cache to the core, invalidate the I-cache, disable halting debug
    /// mode, and resume by clearing stickies and requesting a restart.
    pub fn detach(&mut self) -> Result<(), Error> {
        self.state.clear_all_hw_bps()?;
        self.state.bpc0 = 0;

        let cache = self.state.reg_cache;
        self.state.regs_write_internal(&cache)?;

        self.state.exec(crate::opcodes::MCR_BASE | ICIALLU)?;

        let mut dscr = Dscr(self.state.apb_read(Dscr::NUMBER)?);
        dscr.set_hdbgen(false);
        dscr.set_itren(false);
        self.state.apb_write(Dscr::NUMBER, dscr.into())?;

        let mut drcr = Drcr(0);
        drcr.set_cse(true);
        drcr.set_rrq(true);
        self.state.apb_write(Drcr::NUMBER, drcr.into())?;

        Ok(())
    }
}
