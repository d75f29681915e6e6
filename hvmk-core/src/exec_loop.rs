//! Per-PP execution loop (spec.md §4.6):
//!
//!   BOOT ──► BOOTSTRAP_EXT ──► RUNNING ──┬──► VMEXIT_EXT ──► RUNNING
//!     │                                  └──► FAIL_EXT ────► RUNNING
//!     └──► HALT
//!
//! `bootstrap_ip` is entered exactly once; its `again` is the diagram's
//! single BOOTSTRAP_EXT → RUNNING arrow, not a self-loop — the extension is
//! expected to have already armed a VM/VP/VS triple (via `vs.run` called
//! from inside its own bootstrap code) before returning it. From there the
//! loop alternates `run_current`/`advance_ip_and_run_current` with
//! `vmexit_ip` the same way a hardware VM-exit trampoline would.
//!
//! Ground: spec.md §4.6; the callback-hook seam follows the same
//! isolate-the-privileged-operation-behind-a-trait shape as
//! `ArchIntrinsics` (Design Notes §9).

use hvmk_hal::{ExtId, Status, Verdict};

use crate::arch_ctx;
use crate::ext;
use crate::tls::{self, CurrentPp, ExecutingCallback};
use crate::vs_engine;

/// Why `ExecLoop::run` returned control to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halted {
    /// A callback declared `exit`, whether by returning it or via
    /// `control_op.exit`.
    Exit,
    /// The bootstrap callback declared `wait` before ever reaching
    /// `running`. The caller is expected to park this PP and call `run`
    /// again once woken.
    Waiting,
    /// The fail callback itself was already executing when another fault
    /// arrived, or it answered anything but `again`.
    Fault,
}

/// Drives one extension's three callbacks on one PP until it halts.
pub struct ExecLoop {
    who: CurrentPp,
    ext: ExtId,
}

impl ExecLoop {
    pub fn new(who: CurrentPp, ext: ExtId) -> Self {
        Self { who, ext }
    }

    /// Runs until the PP halts. In production this never returns; tests
    /// drive it against a scripted callback hook and read the `Halted`
    /// reason back.
    pub fn run(&mut self) -> Halted {
        if let Err(halted) = self.bootstrap() {
            return halted;
        }
        loop {
            let reason = match vs_engine::run_current(self.who) {
                Ok(reason) => reason,
                Err(e) => match self.fail(Status::from(e).as_u64()) {
                    Some(halted) => return halted,
                    None => continue,
                },
            };
            if let Some(halted) = self.vmexit(reason) {
                return halted;
            }
        }
    }

    fn bootstrap(&mut self) -> Result<(), Halted> {
        let ip = match ext::get(self.ext).ok().and_then(|e| e.bootstrap_ip()) {
            Some(ip) => ip,
            None => return Err(self.fail(Status::FailureUnsupported.as_u64()).unwrap_or(Halted::Fault)),
        };
        // Started the moment bootstrap is entered, not when it returns
        // (spec.md §4.6: "once its bootstrap callback has been entered").
        let _ = ext::mark_started(self.ext);
        match self.invoke(ExecutingCallback::Bootstrap, ip, self.ext.get() as u64, 0) {
            Verdict::Exit => Err(Halted::Exit),
            Verdict::Wait => Err(Halted::Waiting),
            Verdict::Again => Ok(()),
        }
    }

    fn vmexit(&mut self, reason: u64) -> Option<Halted> {
        let vs = tls::per_cpu().get(self.who).active.vs;
        let ip = match ext::get(self.ext).ok().and_then(|e| e.vmexit_ip()) {
            Some(ip) => ip,
            None => return self.fail(Status::FailureUnsupported.as_u64()),
        };
        match self.invoke(ExecutingCallback::Vmexit, ip, vs.get() as u64, reason) {
            Verdict::Exit => Some(Halted::Exit),
            // The callback re-entered the guest itself through a `run*`
            // syscall; either verdict just sends `run()`'s loop around
            // again to pick up the next exit.
            Verdict::Wait | Verdict::Again => None,
        }
    }

    /// Invokes `fail_ip` with `code`. Already running the fail callback
    /// halts instead of re-entering it (spec.md §9's open question on
    /// fail-of-fail `again`).
    fn fail(&mut self, code: u64) -> Option<Halted> {
        if tls::per_cpu().get(self.who).executing == ExecutingCallback::Fail {
            return Some(Halted::Fault);
        }
        let ip = match ext::get(self.ext).ok().and_then(|e| e.fail_ip()) {
            Some(ip) => ip,
            None => return Some(Halted::Fault),
        };
        match self.invoke(ExecutingCallback::Fail, ip, code, 0) {
            Verdict::Again => None,
            Verdict::Exit | Verdict::Wait => Some(Halted::Fault),
        }
    }

    /// Calls the installed `CallbackHook`, recording which callback is
    /// executing so `fail` can detect re-entrancy, and preferring a verdict
    /// recorded by `control_op` over the callback's raw return value.
    fn invoke(&mut self, which: ExecutingCallback, ip: u64, arg0: u64, arg1: u64) -> Verdict {
        {
            let cpu = tls::per_cpu().get(self.who);
            cpu.executing = which;
            cpu.pending_verdict = None;
        }
        let raw = arch_ctx::callback_hook().invoke(ip, arg0, arg1);
        let cpu = tls::per_cpu().get(self.who);
        cpu.executing = ExecutingCallback::None;
        cpu.pending_verdict.take().unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvmk_hal::PpId;

    use crate::config::EXT_CODE_ADDR;
    use crate::ext::CallbackKind;
    use crate::{vm, vp};

    fn setup() -> CurrentPp {
        arch_ctx::init_sim();
        unsafe { CurrentPp::new(PpId::new(0)) }
    }

    #[test]
    fn bootstrap_exit_halts_immediately() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
        arch_ctx::scripted_callback_hook().push(Verdict::Exit);

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Exit);
        ext::destroy(id).unwrap();
    }

    #[test]
    fn bootstrap_wait_parks_without_halting_as_fault() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
        arch_ctx::scripted_callback_hook().push(Verdict::Wait);

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Waiting);
        ext::destroy(id).unwrap();
    }

    #[test]
    fn missing_bootstrap_callback_faults() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Fault);
        ext::destroy(id).unwrap();
    }

    #[test]
    fn running_with_no_active_triple_faults_without_fail_callback() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
        arch_ctx::scripted_callback_hook().push(Verdict::Again);

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Fault);
        ext::destroy(id).unwrap();
    }

    #[test]
    fn full_cycle_runs_then_exits_on_vmexit() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
        ext::register_callback(id, CallbackKind::Vmexit, EXT_CODE_ADDR + 8).unwrap();

        let vm = vm::create().unwrap();
        let vp = vp::create(vm).unwrap();
        let vs = vs_engine::create(vp, PpId::new(0)).unwrap();
        vs_engine::run(who, vm, vp, vs).unwrap();

        arch_ctx::scripted_callback_hook().push(Verdict::Again);
        arch_ctx::scripted_callback_hook().push(Verdict::Exit);

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Exit);
        assert_eq!(arch_ctx::scripted_callback_hook().calls().len(), 2);
        ext::destroy(id).unwrap();
    }

    #[test]
    fn fail_callback_again_retries_the_run_loop() {
        let who = setup();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
        ext::register_callback(id, CallbackKind::Fail, EXT_CODE_ADDR + 16).unwrap();

        // Bootstrap declares `again` without ever arming a VS, so the first
        // `run_current` in the main loop fails with `WrongPp`; the fail
        // callback's `again` should send it back around, where it fails the
        // same way again, until the fail callback finally gives up.
        arch_ctx::scripted_callback_hook().push(Verdict::Again); // bootstrap
        arch_ctx::scripted_callback_hook().push(Verdict::Again); // fail: retry
        arch_ctx::scripted_callback_hook().push(Verdict::Exit); // fail: give up

        let mut loop_ = ExecLoop::new(who, id);
        assert_eq!(loop_.run(), Halted::Fault);
        ext::destroy(id).unwrap();
    }
}
