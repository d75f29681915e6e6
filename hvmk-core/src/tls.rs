//! Per-PP TLS: the syscall register contract and the active-triple/callback
//! bookkeeping the exec loop needs. Modeled as a `PerCpu` array indexed by
//! `PpId`; the only legal unsynchronized access is from the PP that owns the
//! slot, which is why every accessor consumes a `CurrentPp` witness instead
//! of trusting the caller.
//!
//! Ground: Design Notes §9 ("Global TLS" — per-PP segment modeled as an
//! array, access gated by a witness token rather than raw `unsafe`).

use core::cell::UnsafeCell;

use hvmk_hal::{PpId, VmId, VpId, VsId, Verdict};

use crate::config::MAX_PPS;

/// Proof that the calling code is running on physical processor `pp` and
/// therefore may access `PerCpu`'s slot for it without synchronisation.
/// Constructed only by the boot entry point and the exec loop, never by
/// syscall handlers directly.
#[derive(Debug, Clone, Copy)]
pub struct CurrentPp(PpId);

impl CurrentPp {
    /// # Safety
    /// The caller must guarantee it is actually executing on physical
    /// processor `pp` — this is the one place in the crate where that fact
    /// is asserted rather than checked.
    pub unsafe fn new(pp: PpId) -> Self {
        Self(pp)
    }

    pub fn pp(self) -> PpId {
        self.0
    }
}

/// Which extension callback is currently executing on this PP, if any.
/// Distinguished from a single "is this a fail callback" bit because the
/// fail callback's `again` must re-attempt the *original* callback, not
/// just loop on itself (spec.md §4.6 FAIL_EXT state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutingCallback {
    None,
    Bootstrap,
    Vmexit,
    Fail,
}

/// The active triple bound to this PP by the last successful `vs.run`, used
/// to route the next VM-exit back to the right extension callback and to
/// know what to flush/reload on the next `run`.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTriple {
    pub vm: VmId,
    pub vp: VpId,
    pub vs: VsId,
}

impl ActiveTriple {
    pub const NONE: Self = Self { vm: VmId::INVALID, vp: VpId::INVALID, vs: VsId::INVALID };

    pub fn is_set(&self) -> bool {
        self.vs.is_valid()
    }
}

/// Per-PP register file mirroring the host calling convention's view of the
/// syscall ABI: the immediate plus six general inputs/outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallRegs {
    pub ext_reg0: u64,
    pub ext_reg1: u64,
    pub ext_reg2: u64,
    pub ext_reg3: u64,
    pub ext_reg4: u64,
    pub ext_reg5: u64,
}

pub struct Cpu {
    pub regs: SyscallRegs,
    pub active: ActiveTriple,
    pub executing: ExecutingCallback,
    /// Set by a `control_op` syscall issued during the callback currently
    /// executing on this PP; consulted by `exec_loop` in preference to the
    /// callback function's raw return value once it regains control.
    pub pending_verdict: Option<Verdict>,
}

impl Cpu {
    const fn new() -> Self {
        Self {
            regs: SyscallRegs { ext_reg0: 0, ext_reg1: 0, ext_reg2: 0, ext_reg3: 0, ext_reg4: 0, ext_reg5: 0 },
            active: ActiveTriple::NONE,
            executing: ExecutingCallback::None,
            pending_verdict: None,
        }
    }
}

pub struct PerCpu {
    cpus: [UnsafeCell<Cpu>; MAX_PPS],
}

unsafe impl Sync for PerCpu {}

impl PerCpu {
    pub const fn new() -> Self {
        Self { cpus: [const { UnsafeCell::new(Cpu::new()) }; MAX_PPS] }
    }

    pub fn get(&self, who: CurrentPp) -> &mut Cpu {
        let idx = who.pp().as_usize();
        unsafe { &mut *self.cpus[idx].get() }
    }
}

impl Default for PerCpu {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_PER_CPU: PerCpu = PerCpu::new();

/// The single per-PP TLS table backing every PP in this image.
pub fn per_cpu() -> &'static PerCpu {
    &GLOBAL_PER_CPU
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_triple_none_is_not_set() {
        assert!(!ActiveTriple::NONE.is_set());
    }

    #[test]
    fn per_cpu_slots_are_independent() {
        let pc = PerCpu::new();
        let pp0 = unsafe { CurrentPp::new(PpId::new(0)) };
        let pp1 = unsafe { CurrentPp::new(PpId::new(1)) };
        pc.get(pp0).regs.ext_reg0 = 7;
        pc.get(pp1).regs.ext_reg0 = 9;
        assert_eq!(pc.get(pp0).regs.ext_reg0, 7);
        assert_eq!(pc.get(pp1).regs.ext_reg0, 9);
    }
}
