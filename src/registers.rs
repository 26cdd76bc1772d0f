//! The ARMv7-A debug register map (§4.2), expressed with `bitfield!` exactly
//! as the teacher's `armv7a.rs` expresses `Dbgdscr`/`Dbgdrcr`/`Dbgdidr`/
//! `Dbgbvr`/`Dbgbcr` — one bitfield struct per register, a small trait
//! giving each its word index and a human name, and a `From<u32>`/
//! `Into<u32>` pair so the raw word read from an `AccessPort` converts
//! straight into the typed view.

use bitfield::bitfield;

/// A debug register addressable on the APB, by word index relative to the
/// debug base address (§4.2).
pub trait DebugRegister: Copy + From<u32> + Into<u32> {
    /// Word index of this register relative to `debug_base`.
    const NUMBER: u32;
    /// Human-readable register name, used in log messages.
    const NAME: &'static str;

    /// The register's absolute word address given the block's base.
    fn address(debug_base: u32) -> u32 {
        debug_base + Self::NUMBER * 4
    }
}

/// Method of debug entry, decoded from `DSCR.MOE` (§4.7). The external
/// `halt_wait` contract only distinguishes `Request` from everything else
/// (SIGINT vs SIGTRAP, per spec §4.7), but keeping the full table lets
/// callers log *why* a target halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// MOE 0b0000: halt request from the debugger.
    Request,
    /// MOE 0b0001 or 0b0011 or 0b1010: breakpoint (hardware or `BKPT`).
    Breakpoint,
    /// MOE 0b0010: asynchronous watchpoint.
    Watchpoint,
    /// MOE 0b0100: external halt request.
    External,
    /// MOE 0b0101 or 0b1000: vector catch / exception.
    Exception,
    /// Any other, reserved encoding.
    Unknown,
}

impl HaltReason {
    pub fn from_moe(moe: u32) -> Self {
        match moe & 0xF {
            0b0000 => HaltReason::Request,
            0b0001 | 0b0011 | 0b1010 => HaltReason::Breakpoint,
            0b0010 => HaltReason::Watchpoint,
            0b0100 => HaltReason::External,
            0b0101 | 0b1000 => HaltReason::Exception,
            _ => HaltReason::Unknown,
        }
    }
}

bitfield! {
    /// DBGDIDR — Debug ID Register (word index 0).
    #[derive(Copy, Clone)]
    pub struct Didr(u32);
    impl Debug;

    /// Number of breakpoints implemented minus one.
    pub brps, _: 27, 24;
}

impl DebugRegister for Didr {
    const NUMBER: u32 = 0;
    const NAME: &'static str = "DBGDIDR";
}
impl From<u32> for Didr {
    fn from(value: u32) -> Self {
        Didr(value)
    }
}
impl From<Didr> for u32 {
    fn from(value: Didr) -> Self {
        value.0
    }
}

bitfield! {
    /// DBGDSCR — Debug Status and Control Register (word index 34).
    #[derive(Copy, Clone)]
    pub struct Dscr(u32);
    impl Debug;

    /// TXfull. DBGDTRTX register full.
    pub txfull, _: 29;
    /// InstrCompl_l. Latched instruction-complete.
    pub instrcompl, set_instrcompl: 24;
    /// External DCC access mode: 0b00 non-blocking, 0b01 stall, 0b10 fast.
    pub extdccmode, set_extdccmode: 21, 20;
    /// Halting debug-mode enable.
    pub hdbgen, set_hdbgen: 14;
    /// ITR mechanism enable.
    pub itren, set_itren: 13;
    /// Interrupts disable.
    pub intdis, set_intdis: 11;
    /// Sticky Undefined Instruction.
    pub und_i, _: 8;
    /// Sticky Synchronous Data Abort.
    pub sdabort_l, _: 6;
    /// Method of Debug entry.
    pub moe, _: 5, 2;
    /// Processor Restarted.
    pub restarted, _: 1;
    /// Processor Halted.
    pub halted, _: 0;
}

impl Dscr {
    pub fn halt_reason(&self) -> HaltReason {
        if self.halted() {
            HaltReason::from_moe(self.moe())
        } else {
            HaltReason::Unknown
        }
    }
}

impl DebugRegister for Dscr {
    const NUMBER: u32 = 34;
    const NAME: &'static str = "DBGDSCR";
}
impl From<u32> for Dscr {
    fn from(value: u32) -> Self {
        Dscr(value)
    }
}
impl From<Dscr> for u32 {
    fn from(value: Dscr) -> Self {
        value.0
    }
}

/// `EXTDCCMODE` encodings (§4.2).
pub const EXTDCCMODE_STALL: u32 = 1;
pub const EXTDCCMODE_FAST: u32 = 2;

bitfield! {
    /// DBGDRCR — Debug Run Control Register (word index 36).
    #[derive(Copy, Clone)]
    pub struct Drcr(u32);
    impl Debug;

    /// Clear Sticky Exceptions.
    pub cse, set_cse: 2;
    /// Restart request.
    pub rrq, set_rrq: 1;
    /// Halt request.
    pub hrq, set_hrq: 0;
}

impl DebugRegister for Drcr {
    const NUMBER: u32 = 36;
    const NAME: &'static str = "DBGDRCR";
}
impl From<u32> for Drcr {
    fn from(value: u32) -> Self {
        Drcr(value)
    }
}
impl From<Drcr> for u32 {
    fn from(value: Drcr) -> Self {
        value.0
    }
}

bitfield! {
    /// DBGBVR(i) — Breakpoint Value Register (base word index 64).
    #[derive(Copy, Clone)]
    pub struct Bvr(u32);
    impl Debug;

    pub value, set_value: 31, 0;
}

impl DebugRegister for Bvr {
    const NUMBER: u32 = 64;
    const NAME: &'static str = "DBGBVR";
}
impl From<u32> for Bvr {
    fn from(value: u32) -> Self {
        Bvr(value)
    }
}
impl From<Bvr> for u32 {
    fn from(value: Bvr) -> Self {
        value.0
    }
}

bitfield! {
    /// DBGBCR(i) — Breakpoint Control Register (base word index 80).
    #[derive(Copy, Clone)]
    pub struct Bcr(u32);
    impl Debug;

    /// Breakpoint type: 0b0000 address match, 0b0100 address mismatch.
    pub bt, set_bt: 23, 20;
    /// Byte address select.
    pub bas, set_bas: 8, 5;
    /// Breakpoint enable.
    pub e, set_e: 0;
}

/// Breakpoint type: normal address match.
pub const BP_TYPE_ADDRESS_MATCH: u32 = 0b0000;
/// Breakpoint type: address mismatch (used for single-step, §4.8).
pub const BP_TYPE_INSTRUCTION_MISMATCH: u32 = 0b0100;

impl DebugRegister for Bcr {
    const NUMBER: u32 = 80;
    const NAME: &'static str = "DBGBCR";
}
impl From<u32> for Bcr {
    fn from(value: u32) -> Self {
        Bcr(value)
    }
}
impl From<Bcr> for u32 {
    fn from(value: Bcr) -> Self {
        value.0
    }
}

/// Word index of `DTRRX` (host→target DCC register, §4.2).
pub const DTRRX: u32 = 32;
/// Word index of `ITR` (Instruction Transfer Register, §4.2).
pub const ITR: u32 = 33;
/// Word index of `DTRTX` (target→host DCC register, §4.2).
pub const DTRTX: u32 = 35;

/// Word address of `BVR(i)`.
pub fn bvr_address(debug_base: u32, i: usize) -> u32 {
    Bvr::address(debug_base) + (i as u32) * 4
}

/// Word address of `BCR(i)`.
pub fn bcr_address(debug_base: u32, i: usize) -> u32 {
    Bcr::address(debug_base) + (i as u32) * 4
}
