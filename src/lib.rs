//! Debug-state-machine driver core for an ARMv7-A (Cortex-A class)
//! application processor, speaking to the target's external debug
//! interface through an ADIv5 access port.
//!
//! This crate is the target-specific backend a JTAG/SWD probe plugs into
//! the upper debugger layer (typically a GDB remote stub) through: it turns
//! a halted-or-running ARMv7-A core, reached only through memory-mapped
//! debug registers on an APB access port, into the abstract "halted
//! target" view of [`Target`] — register file, memory, hardware
//! breakpoints, halt/resume/step, reset.
//!
//! The ADIv5 transport, the GDB remote protocol, the platform reset line
//! and the target-list/attach lifecycle are all external collaborators,
//! modeled here as the [`access_port`] and [`platform`] trait contracts
//! this crate consumes rather than code it owns.

pub mod access_port;
pub mod breakpoint;
mod dcc;
pub mod error;
mod halt;
mod memory;
pub mod opcodes;
pub mod platform;
mod probe;
pub mod regfile;
pub mod registers;
mod reset;
pub mod session;

pub use access_port::{AccessPort, AccessWidth, DebugPort};
pub use error::Error;
pub use halt::{SIGINT, SIGLOST, SIGTRAP};
pub use platform::{Platform, Timeout};
pub use regfile::{RegisterCache, GDB_REGS_SIZE};
pub use session::{default_ahb_ap_index, TargetSession, DRIVER_NAME};

/// The `Target` operation table exposed to the upper debugger layer
/// (§6.2). [`TargetSession`] implements every operation inherently (see
/// its impl blocks across `probe.rs`/`halt.rs`/`memory.rs`/`breakpoint.rs`
/// and below); this trait exists so a GDB stub can hold
/// `Box<dyn Target>` without naming the concrete core type, matching the
/// teacher's `CoreInterface` trait object boundary.
pub trait Target {
    /// Enter halting debug mode and leave the core halted (§4.9).
    fn attach(&mut self) -> Result<bool, Error>;
    /// Flush the register cache, disable halting debug mode, resume
    /// (§4.9).
    fn detach(&mut self) -> Result<(), Error>;
    /// `true` iff a fault is pending; clears `mmu_fault` (§4.10).
    fn check_error(&mut self) -> bool;
    /// Read target memory into `dest` from virtual address `src_va`
    /// (§4.5).
    fn mem_read(&mut self, dest: &mut [u8], src_va: u32) -> Result<(), Error>;
    /// Write `src` to target memory at virtual address `dest_va` (§4.5).
    fn mem_write(&mut self, dest_va: u32, src: &[u8]) -> Result<(), Error>;
    /// Copy the cached register file into `out` in the GDB byte layout
    /// (§6.3). `out` must be [`GDB_REGS_SIZE`] bytes.
    fn regs_read(&mut self, out: &mut [u8]);
    /// Replace the cached register file from the GDB byte layout (§6.3).
    /// Takes effect in the core on the next resume. `input` must be
    /// [`GDB_REGS_SIZE`] bytes.
    fn regs_write(&mut self, input: &[u8]);
    /// Size in bytes of the [`Target::regs_read`]/[`Target::regs_write`]
    /// layout (§6.2).
    fn regs_size(&self) -> usize;
    /// Platform-specific reset sequence (§4.9).
    fn reset(&mut self) -> Result<(), Error>;
    /// Request a halt asynchronously (§4.7).
    fn halt_request(&mut self) -> Result<(), Error>;
    /// Poll for halt; `0` means still running (§4.7).
    fn halt_wait(&mut self, timeout_ms: u64) -> Result<i32, Error>;
    /// Resume, optionally single-stepping (§4.7).
    fn halt_resume(&mut self, step: bool) -> Result<(), Error>;
    /// Allocate a hardware breakpoint comparator; `-1` if none free (§4.8).
    fn set_hw_bp(&mut self, addr: u32, len: u32) -> Result<i32, Error>;
    /// Release a hardware breakpoint comparator; `-1` if not found (§4.8).
    fn clear_hw_bp(&mut self, addr: u32, len: u32) -> Result<i32, Error>;
}

impl Target for TargetSession {
    fn attach(&mut self) -> Result<bool, Error> {
        TargetSession::attach(self)
    }

    fn detach(&mut self) -> Result<(), Error> {
        TargetSession::detach(self)
    }

    fn check_error(&mut self) -> bool {
        TargetSession::check_error(self)
    }

    fn mem_read(&mut self, dest: &mut [u8], src_va: u32) -> Result<(), Error> {
        let len = dest.len();
        self.state.mem_read(dest, src_va, len)
    }

    fn mem_write(&mut self, dest_va: u32, src: &[u8]) -> Result<(), Error> {
        self.state.mem_write(dest_va, src)
    }

    fn regs_read(&mut self, out: &mut [u8]) {
        out.copy_from_slice(&self.state.reg_cache.to_gdb_bytes());
    }

    fn regs_write(&mut self, input: &[u8]) {
        self.state.reg_cache = RegisterCache::from_gdb_bytes(input);
    }

    fn regs_size(&self) -> usize {
        GDB_REGS_SIZE
    }

    fn reset(&mut self) -> Result<(), Error> {
        TargetSession::reset(self)
    }

    fn halt_request(&mut self) -> Result<(), Error> {
        TargetSession::halt_request(self)
    }

    fn halt_wait(&mut self, timeout_ms: u64) -> Result<i32, Error> {
        TargetSession::halt_wait(self, timeout_ms)
    }

    fn halt_resume(&mut self, step: bool) -> Result<(), Error> {
        TargetSession::halt_resume(self, step)
    }

    fn set_hw_bp(&mut self, addr: u32, len: u32) -> Result<i32, Error> {
        self.state.set_hw_bp(addr, len)
    }

    fn clear_hw_bp(&mut self, addr: u32, _len: u32) -> Result<i32, Error> {
        self.state.clear_hw_bp(addr)
    }
}

/// GDB target-description XML fragments (§6.3). This crate has no GDB
/// server of its own (out of scope, §1); these associated constants let a
/// downstream stub build the `qXfer:features:read` response without
/// hand-copying the register list.
pub mod target_description {
    /// The ARM core feature: r0..r12, sp, lr, pc, cpsr.
    pub const ARM_CORE_FEATURE: &str = r#"<feature name="org.gnu.gdb.arm.core">
  <reg name="r0" bitsize="32"/>
  <reg name="r1" bitsize="32"/>
  <reg name="r2" bitsize="32"/>
  <reg name="r3" bitsize="32"/>
  <reg name="r4" bitsize="32"/>
  <reg name="r5" bitsize="32"/>
  <reg name="r6" bitsize="32"/>
  <reg name="r7" bitsize="32"/>
  <reg name="r8" bitsize="32"/>
  <reg name="r9" bitsize="32"/>
  <reg name="r10" bitsize="32"/>
  <reg name="r11" bitsize="32"/>
  <reg name="r12" bitsize="32"/>
  <reg name="sp" bitsize="32" type="data_ptr"/>
  <reg name="lr" bitsize="32" type="code_ptr"/>
  <reg name="pc" bitsize="32" type="code_ptr"/>
  <reg name="cpsr" bitsize="32"/>
</feature>"#;

    /// The VFP feature: fpscr, d0..d15.
    pub const ARM_VFP_FEATURE: &str = r#"<feature name="org.gnu.gdb.arm.vfp">
  <reg name="fpscr" bitsize="32"/>
  <reg name="d0" bitsize="64" type="float"/>
  <reg name="d1" bitsize="64" type="float"/>
  <reg name="d2" bitsize="64" type="float"/>
  <reg name="d3" bitsize="64" type="float"/>
  <reg name="d4" bitsize="64" type="float"/>
  <reg name="d5" bitsize="64" type="float"/>
  <reg name="d6" bitsize="64" type="float"/>
  <reg name="d7" bitsize="64" type="float"/>
  <reg name="d8" bitsize="64" type="float"/>
  <reg name="d9" bitsize="64" type="float"/>
  <reg name="d10" bitsize="64" type="float"/>
  <reg name="d11" bitsize="64" type="float"/>
  <reg name="d12" bitsize="64" type="float"/>
  <reg name="d13" bitsize="64" type="float"/>
  <reg name="d14" bitsize="64" type="float"/>
  <reg name="d15" bitsize="64" type="float"/>
</feature>"#;
}
