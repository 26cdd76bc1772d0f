//! Instruction injector (§4.3) and DCC-driven GP-register shuttle (§4.4).
//!
//! These are the two lowest non-transport layers of the driver: `exec`
//! forces the halted core to execute one opcode via `ITR`; `read_gp`/
//! `write_gp` build on it plus the DCC (`DTRRX`/`DTRTX`) to move a single
//! architectural register across the debug interface. Everything above
//! this module (register-file read/write, memory access, breakpoints) is
//! expressed purely in terms of `exec`/`read_gp`/`write_gp`, the same
//! layering the teacher's `Armv7a::execute_instruction*` family provides
//! for its (simpler) register and memory access.

use crate::error::Error;
use crate::opcodes::{mcr_read_gp, mrc_write_gp};
use crate::registers::{DebugRegister, Drcr, Dscr, DTRRX, DTRTX, ITR};
use crate::session::PrivateState;

impl PrivateState {
    /// `apb_write` (§4.1): set `TAR` to `debug_base + 4*reg_idx`, write
    /// `value` to `DRW`.
    pub(crate) fn apb_write(&mut self, reg_idx: u32, value: u32) -> Result<(), Error> {
        let address = self.debug_base + reg_idx * 4;
        self.apb.write_word_32(address, value)
    }

    /// `apb_read` (§4.1): set `TAR`, issue the posted read, retrieve the
    /// result. The posted-read follow-up is the `AccessPort`
    /// implementation's responsibility; from here it's one call.
    pub(crate) fn apb_read(&mut self, reg_idx: u32) -> Result<u32, Error> {
        let address = self.debug_base + reg_idx * 4;
        self.apb.read_word_32(address)
    }

    /// Clear the sticky synchronous/asynchronous data-abort flags by
    /// writing `DRCR.CSE` (§4.3).
    pub(crate) fn clear_sticky_abort(&mut self) -> Result<(), Error> {
        let mut drcr = Drcr(0);
        drcr.set_cse(true);
        self.apb_write(Drcr::NUMBER, drcr.into())
    }

    /// `exec(opcode)` (§4.3): write `opcode` to `ITR` and let the halted
    /// core execute it in debug state. We wait for `DSCR.INSTRCOMPL` so
    /// callers observe the executed instruction's outcome, but — per spec —
    /// no `SDABORT_L` polling happens here: "an overall fault is detectable
    /// by inspecting `DSCR.SDABORT_L` afterwards", which is the job of the
    /// few callers that can actually provoke a data abort (`slow_mem_read`,
    /// `slow_mem_write`, `va_to_pa`), not of every injected instruction.
    pub(crate) fn exec(&mut self, opcode: u32) -> Result<Dscr, Error> {
        self.apb_write(ITR, opcode)?;

        let mut dscr = Dscr(self.apb_read(Dscr::NUMBER)?);
        while !dscr.instrcompl() {
            dscr = Dscr(self.apb_read(Dscr::NUMBER)?);
        }

        Ok(dscr)
    }

    /// `read_gp(n)` (§4.4): inject `MCR | DBGDTRTXint | ((n&0xF)<<12)`,
    /// which copies `r<n>` into `DTRTX`, then read `DTRTX`.
    pub(crate) fn read_gp(&mut self, n: u16) -> Result<u32, Error> {
        let mut dscr = self.exec(mcr_read_gp(n))?;

        while !dscr.txfull() {
            dscr = Dscr(self.apb_read(Dscr::NUMBER)?);
        }

        self.apb_read(DTRTX)
    }

    /// `write_gp(n, v)` (§4.4): write `DTRRX ← v`, then inject
    /// `MRC | DBGDTRRXint | ((n&0xF)<<12)`, copying it into `r<n>`.
    pub(crate) fn write_gp(&mut self, n: u16, value: u32) -> Result<(), Error> {
        self.apb_write(DTRRX, value)?;
        self.exec(mrc_write_gp(n))?;
        Ok(())
    }
}
