//! `TargetSession`/`PrivateState` (§3): the handle the upper debugger layer
//! holds, and the private state it exclusively owns.
//!
//! Grounded in the teacher's `Armv7a<'probe>` + `State` split (`Armv7a`
//! borrows a `&'probe mut State` that outlives individual core-interface
//! calls). This crate doesn't need the borrow-split lifetime dance — there
//! is exactly one `PrivateState` per probed core and nothing else contends
//! for it — so `TargetSession` owns its `PrivateState` outright, matching
//! spec §9's "opaque private-state handle... an owning handle" guidance
//! over the teacher's borrow-and-lifetime approach.

use crate::access_port::{is_ahb_ap, AccessPort, AccessWidth, DebugPort};
use crate::error::Error;
use crate::platform::Platform;
use crate::regfile::RegisterCache;
use crate::registers::{DebugRegister, Didr};

/// Default index this driver probes for a companion AHB access port
/// (§9 Open Question: made configurable rather than hardcoded).
pub fn default_ahb_ap_index() -> u8 {
    0
}

/// Private, per-core debug state (§3). Never constructed directly by
/// callers outside this crate; reached only through [`TargetSession`].
pub struct PrivateState {
    /// Physical word address of the debug register block on the APB.
    pub(crate) debug_base: u32,
    /// Handle to the debug access port. Always present.
    pub(crate) apb: Box<dyn AccessPort>,
    /// Handle to the companion system-bus access port, present iff its IDR
    /// matched the AHB signature at probe time (§3).
    pub(crate) ahb: Option<Box<dyn AccessPort>>,
    /// In-memory snapshot of r0..r15, CPSR, FPSCR, d0..d15 (§3). Valid for
    /// inspection only while the core is halted.
    pub(crate) reg_cache: RegisterCache,
    /// Number of breakpoint comparator pairs the device advertises,
    /// `((DBGDIDR >> 24) & 0xF) + 1` (§3).
    pub(crate) hw_breakpoint_max: u32,
    /// Soft allocation table: low bit = in-use, remaining bits = armed
    /// address (§3).
    pub(crate) hw_breakpoint: [u32; 16],
    /// Saved control value of comparator 0, since it is temporarily
    /// repurposed for single-step (§3).
    pub(crate) bpc0: u32,
    /// Sticky flag set on any debugger-induced MMU or data-abort fault,
    /// cleared on the next `check_error` (§3).
    pub(crate) mmu_fault: bool,
}

impl PrivateState {
    /// `true` iff a companion AHB access port was wired up at probe time
    /// (§3 invariant: memory I/O goes through it when present).
    pub fn has_ahb(&self) -> bool {
        self.ahb.is_some()
    }
}

/// One probed ARMv7-A core (§3). Owns its [`PrivateState`] exclusively and
/// the [`Platform`] collaborator used for reset/timing; the debug/system
/// access ports inside `PrivateState` are themselves shared with the
/// ADIv5 layer via ordinary Rust ownership (an `AccessPort` handle this
/// session exclusively holds for its own lifetime — see `access_port.rs`
/// doc comment on the C-handle-to-ownership translation).
pub struct TargetSession {
    pub(crate) state: PrivateState,
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) ahb_ap_index: u8,
    /// Invoked from `halt_wait` when the probe is permanently lost, so the
    /// enclosing target-list/attach lifecycle manager can tear this
    /// session down (§9: "express this as a message... rather than a
    /// direct global mutation").
    pub(crate) on_probe_lost: Option<Box<dyn FnMut() + Send>>,
}

/// Human-readable driver name exposed on each session (§6.4).
pub const DRIVER_NAME: &str = "ARM Cortex-A";

impl TargetSession {
    /// `probe` (§4.9): given an already-acquired APB access port and the
    /// debug port it came from, discover the debug register block, look
    /// for a companion AHB AP at `ahb_ap_index` and wire up the fast
    /// memory path if its IDR matches the AHB signature, and read
    /// `DBGDIDR` to learn how many breakpoint comparators this core has.
    ///
    /// `ahb_ap_index` resolves spec §9's Open Question: the teacher's
    /// analogue (and the distilled spec) hardcodes AP index 0; here it's a
    /// constructor parameter (default [`default_ahb_ap_index`]).
    pub fn probe(
        mut apb: Box<dyn AccessPort>,
        dp: &mut dyn DebugPort,
        debug_base: u32,
        ahb_ap_index: u8,
        platform: Box<dyn Platform>,
    ) -> Result<TargetSession, Error> {
        apb.set_access_width(AccessWidth::Word)?;

        let ahb = match dp.new_ap(ahb_ap_index)? {
            Some(mut ap) if is_ahb_ap(ap.idr()) => {
                ap.set_access_width(AccessWidth::Word)?;
                log::debug!("found companion AHB access port at index {ahb_ap_index}, wiring up the fast memory path");
                Some(ap)
            }
            Some(_) => {
                log::debug!("AP at index {ahb_ap_index} is not an AHB access port, using the slow memory path");
                None
            }
            None => {
                log::debug!("no AP at index {ahb_ap_index}, using the slow memory path");
                None
            }
        };

        let didr = Didr(apb.read_word_32(Didr::address(debug_base))?);
        let hw_breakpoint_max = didr.brps() as u32 + 1;

        log::debug!("probed ARMv7-A core at debug base {debug_base:#010x}, {hw_breakpoint_max} hardware breakpoints, ahb={}", ahb.is_some());

        let state = PrivateState {
            debug_base,
            apb,
            ahb,
            reg_cache: RegisterCache::default(),
            hw_breakpoint_max,
            hw_breakpoint: [0; 16],
            bpc0: 0,
            mmu_fault: false,
        };

        Ok(TargetSession {
            state,
            platform,
            ahb_ap_index,
            on_probe_lost: None,
        })
    }

    /// `true` iff a companion AHB access port is wired up (§3).
    pub fn has_ahb(&self) -> bool {
        self.state.has_ahb()
    }

    /// The driver identifier string (§6.4).
    pub fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Register a callback to run when `halt_wait` concludes the probe is
    /// permanently lost (§4.7, §9).
    pub fn on_probe_lost(&mut self, callback: Box<dyn FnMut() + Send>) {
        self.on_probe_lost = Some(callback);
    }

    /// `check_error` (§4.10, §6.2): `true` iff the AHB's transport-error
    /// accumulator is non-zero, or `mmu_fault` is set; clears `mmu_fault` as
    /// a side effect.
    ///
    /// Preserved verbatim per spec §9's open question: when no AHB is
    /// present, APB transport errors are *not* additionally surfaced here
    /// — only `mmu_fault` is consulted. This is an intentional preservation
    /// of the documented source behaviour, not an omission.
    pub fn check_error(&mut self) -> bool {
        let ahb_error = self
            .state
            .ahb
            .as_ref()
            .map(|ahb| ahb.has_error())
            .unwrap_or(false);
        let had_fault = self.state.mmu_fault || ahb_error;
        self.state.mmu_fault = false;
        had_fault
    }
}
