//! Platform reset (§4.9), Zynq-7000 variant.
//!
//! The teacher's `sequences::mod.rs::armv7a_reset_system` is the grounding
//! for "platform-specific reset dance behind a small free function, called
//! from the core's `reset`" — it pokes `Dbgprcr.CWRR` to request the reset
//! then polls `Dbgprsr.SR` until it's observed. This module is that same
//! shape for the one platform spec §4.9 actually specifies: unlock SLCR,
//! assert PSS soft reset, pulse `nSRST`, then reacquire the debug port
//! before re-attaching.

use crate::error::{tolerate_timeout, Error};
use crate::registers::{DebugRegister, Didr};
use crate::session::TargetSession;

/// SLCR unlock key (§4.9).
const SLCR_UNLOCK_KEY: u32 = 0xDF0D;
/// SLCR unlock register physical address (§4.9).
const SLCR_UNLOCK_ADDR: u32 = 0xF800_0008;
/// PSS reset control register physical address (§4.9).
const PSS_RST_CTRL_ADDR: u32 = 0xF800_0200;

/// How long the reset routine allows for the debug port to reappear in the
/// scan chain before giving up (§4.9).
const REACQUIRE_TIMEOUT_MS: u64 = 1000;
/// Settle delay between releasing reset and re-attaching (§4.9).
const POST_RESET_DELAY_MS: u64 = 100;

impl TargetSession {
    /// `reset` (§4.9, §6.2): the Zynq-7000 platform reset dance. Unlocks
    /// SLCR, asserts the PS system soft reset, pulses the external system
    /// reset line, then — because the debug port is transiently removed
    /// from the scan chain during reset — repeatedly attempts to read
    /// `DBGDIDR` inside a 1 s deadline, tolerating transport errors until
    /// either a read succeeds or the deadline passes (propagating the
    /// transport exception on timeout, per §5/§9). Finishes with a settle
    /// delay and a re-attach.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.state
            .apb
            .write_word_32(SLCR_UNLOCK_ADDR, SLCR_UNLOCK_KEY)?;
        self.state.apb.write_word_32(PSS_RST_CTRL_ADDR, 1)?;

        self.platform.srst_set_val(true)?;
        self.platform.delay(1);
        self.platform.srst_set_val(false)?;

        let deadline = self.platform.timeout_set(REACQUIRE_TIMEOUT_MS);

        loop {
            let probe = tolerate_timeout(|| self.state.apb_read(Didr::NUMBER));

            match probe {
                Ok(Some(_)) => break,
                Ok(None) => {
                    log::debug!("debug port still missing from scan chain after reset, retrying");
                }
                Err(err) => {
                    if self.platform.timeout_is_expired(&deadline) {
                        return Err(err);
                    }
                    log::debug!("transport error while reacquiring debug port after reset (tolerated): {err}");
                }
            }

            if self.platform.timeout_is_expired(&deadline) {
                return Err(Error::Timeout);
            }
        }

        self.platform.delay(POST_RESET_DELAY_MS);

        self.attach()?;

        Ok(())
    }
}
