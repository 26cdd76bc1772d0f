//! In-memory register snapshot (§3 `reg_cache`) and its GDB-compatible byte
//! layout (§6.3), plus the DCC opcode sequences that load/store the whole
//! file from/to a halted core (§4.4 `regs_read_internal`/
//! `regs_write_internal`).
//!
//! The teacher's `Armv7a::register_cache` is a `[Option<(u32, bool)>; 17]`
//! lazily filled one register at a time on `read_core_reg`/written back on
//! `run()`. This spec asks for an eager full-file snapshot instead ("the
//! core is responsible for loading it from the device on halt and flushing
//! it on resume", §3) — so `RegisterCache` is a plain struct, and
//! `read_all`/`write_all` replace the teacher's lazy per-register dance with
//! one full walk, keeping the same instruction sequences and the same
//! PC/CPSR/FPSCR/d-register opcode tricks the teacher's `read_core_reg`
//! (for r0..16) uses, extended per spec to r15/FPSCR/d0..d15.

use crate::error::Error;
use crate::opcodes::{vmov_r0_r1_d, MOV_PC_R0, MOV_R0_PC, MRS_R0_CPSR, VMRS_R0_FPSCR};
use crate::session::PrivateState;

/// CPSR bit 5: Thumb state.
const CPSR_T_BIT: u32 = 1 << 5;

/// `mrs r0, CPSR` is read-only; writing CPSR back uses `msr CPSR_fsxc, r0`:
/// `0xE129F000`.
const MSR_CPSR_R0: u32 = 0xE129_F000;

/// `vmov d<i>, r0, r1`: `0xEC410B10 | i` — the inverse of
/// [`crate::opcodes::vmov_r0_r1_d`], used to write a VFP double back.
fn vmov_d_r0_r1(i: u32) -> u32 {
    0xEC41_0B10 | i
}

/// `vmsr fpscr, r0`: `0xEEE10A10`.
const VMSR_FPSCR_R0: u32 = 0xEEE1_0A10;

/// CP15 "Instruction Cache Invalidate All to PoU" also lives in
/// [`crate::opcodes::ICIALLU`]; re-exported here would be redundant, kept
/// out of this module on purpose — cache maintenance is §4.7's job, not the
/// register shuttle's.

/// The full architectural register snapshot a halted `TargetSession`
/// exposes to its caller (§3, §6.3). Valid for inspection only while the
/// core is halted (§3 invariant); writes are deferred until the next
/// resume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterCache {
    pub r: [u32; 16],
    pub cpsr: u32,
    pub fpscr: u32,
    pub d: [u64; 16],
}

/// Byte size of the GDB-compatible register layout (§6.3): 16×u32 (r0..15)
/// + u32 cpsr + u32 fpscr + 16×u64 (d0..d15).
pub const GDB_REGS_SIZE: usize = 16 * 4 + 4 + 4 + 16 * 8;

static_assertions::const_assert_eq!(GDB_REGS_SIZE, 196);

impl Default for RegisterCache {
    fn default() -> Self {
        RegisterCache {
            r: [0; 16],
            cpsr: 0,
            fpscr: 0,
            d: [0; 16],
        }
    }
}

impl RegisterCache {
    /// `true` if CPSR.T (bit 5) is set: the core was in Thumb state when
    /// this snapshot was taken (§3).
    pub fn thumb(&self) -> bool {
        self.cpsr & CPSR_T_BIT != 0
    }

    /// The pipeline offset to subtract from the raw PC sampled in debug
    /// state: 4 in Thumb state, 8 in ARM state (§3, §4.4 step 6).
    pub fn pc_pipeline_offset(&self) -> u32 {
        if self.thumb() {
            4
        } else {
            8
        }
    }

    /// Serialise into the fixed little-endian, packed GDB layout (§6.3):
    /// r0..r15, cpsr, fpscr, d0..d15.
    pub fn to_gdb_bytes(&self) -> [u8; GDB_REGS_SIZE] {
        let mut out = [0u8; GDB_REGS_SIZE];
        let mut at = 0;
        for r in &self.r {
            out[at..at + 4].copy_from_slice(&r.to_le_bytes());
            at += 4;
        }
        out[at..at + 4].copy_from_slice(&self.cpsr.to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&self.fpscr.to_le_bytes());
        at += 4;
        for d in &self.d {
            out[at..at + 8].copy_from_slice(&d.to_le_bytes());
            at += 8;
        }
        debug_assert_eq!(at, GDB_REGS_SIZE);
        out
    }

    /// Inverse of [`RegisterCache::to_gdb_bytes`]. `bytes` must be exactly
    /// [`GDB_REGS_SIZE`] long; callers (the `Target::regs_write` boundary)
    /// are responsible for that length check.
    pub fn from_gdb_bytes(bytes: &[u8]) -> Self {
        let mut cache = RegisterCache::default();
        let mut at = 0;
        for r in cache.r.iter_mut() {
            *r = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
            at += 4;
        }
        cache.cpsr = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        at += 4;
        cache.fpscr = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        at += 4;
        for d in cache.d.iter_mut() {
            *d = u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap());
            at += 8;
        }
        cache
    }
}

impl PrivateState {
    /// `regs_read_internal` (§4.4): shuttle r0..r14 directly, then PC, CPSR,
    /// FPSCR and d0..d15 via the MCR/MRC + helper-opcode sequences that are
    /// the only way to reach those registers over the DCC. Finishes by
    /// correcting the sampled PC for the pipeline offset (step 6).
    pub(crate) fn regs_read_internal(&mut self) -> Result<RegisterCache, Error> {
        let mut cache = RegisterCache::default();

        for i in 0..15u16 {
            cache.r[i as usize] = self.read_gp(i)?;
        }

        self.exec(MOV_R0_PC)?;
        cache.r[15] = self.read_gp(0)?;

        self.exec(MRS_R0_CPSR)?;
        cache.cpsr = self.read_gp(0)?;

        self.exec(VMRS_R0_FPSCR)?;
        cache.fpscr = self.read_gp(0)?;

        for i in 0..16u32 {
            self.exec(vmov_r0_r1_d(i))?;
            let lo = self.read_gp(0)? as u64;
            let hi = self.read_gp(1)? as u64;
            cache.d[i as usize] = (hi << 32) | lo;
        }

        let offset = cache.pc_pipeline_offset();
        cache.r[15] = cache.r[15].wrapping_sub(offset);

        Ok(cache)
    }

    /// `regs_write_internal` (§4.4): the inverse order, d → FPSCR → CPSR →
    /// PC → r0..r14. d-registers go first while r0/r1 are still free to
    /// clobber; PC is restored via `mov pc, r0` before r0..r14 are
    /// reloaded, because writing CPSR via MRC would otherwise clobber the
    /// CPSR we just wrote if done afterward.
    pub(crate) fn regs_write_internal(&mut self, cache: &RegisterCache) -> Result<(), Error> {
        for i in 0..16u32 {
            let value = cache.d[i as usize];
            self.write_gp(0, value as u32)?;
            self.write_gp(1, (value >> 32) as u32)?;
            self.exec(vmov_d_r0_r1(i))?;
        }

        self.write_gp(0, cache.fpscr)?;
        self.exec(VMSR_FPSCR_R0)?;

        self.write_gp(0, cache.cpsr)?;
        self.exec(MSR_CPSR_R0)?;

        self.write_gp(0, cache.r[15])?;
        self.exec(MOV_PC_R0)?;

        for i in 0..15u16 {
            self.write_gp(i, cache.r[i as usize])?;
        }

        Ok(())
    }
}
