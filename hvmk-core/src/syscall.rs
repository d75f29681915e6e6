//! Syscall dispatcher (spec.md §4.5): decodes the family:index immediate,
//! validates the calling extension's handle, and routes to the relevant
//! component. The only place in the crate that flattens component errors
//! into the wire-level `hvmk_hal::Status`.
//!
//! Register contract: inputs/outputs flow through the per-PP `SyscallRegs`
//! (`ext_reg0..5`) rather than function arguments, per spec.md §4.5 ("the
//! dispatcher never consumes CPU stack depth proportional to the syscall's
//! semantics") — `dispatch` reads and writes them directly instead of
//! threading a parameter list.

use hvmk_hal::{ExtId, GprTag, PpId, Status, VmId, VpId, VsId, Verdict};

use crate::tls::CurrentPp;
use crate::{ext, mem_op, vm, vp, vs_engine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Family {
    Handle = 0,
    Control = 1,
    Callback = 2,
    Debug = 3,
    Vm = 4,
    Vp = 5,
    Vs = 6,
    Intrinsic = 7,
    Mem = 8,
}

impl Family {
    fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Family::Handle,
            1 => Family::Control,
            2 => Family::Callback,
            3 => Family::Debug,
            4 => Family::Vm,
            5 => Family::Vp,
            6 => Family::Vs,
            7 => Family::Intrinsic,
            8 => Family::Mem,
            _ => return None,
        })
    }
}

/// Unpacks the 64-bit immediate: family in the high 32 bits, index within
/// that family in the low 32 bits.
pub fn pack(family: Family, index: u32) -> u64 {
    ((family as u64) << 32) | index as u64
}

fn decode(word: u64) -> (Option<Family>, u32) {
    (Family::from_u32((word >> 32) as u32), word as u32)
}

impl From<ext::ExtError> for Status {
    fn from(e: ext::ExtError) -> Self {
        match e {
            ext::ExtError::Table(crate::capability_table::TableError::InvalidId)
            | ext::ExtError::Table(crate::capability_table::TableError::NotAllocated)
            | ext::ExtError::HandleMismatch
            | ext::ExtError::NotOpen => Status::FailureInvalidHandle,
            ext::ExtError::Table(_) | ext::ExtError::CallbackOutsideImage | ext::ExtError::AlreadyRegistered => Status::FailureUnknown,
        }
    }
}

impl From<crate::capability_table::TableError> for Status {
    fn from(e: crate::capability_table::TableError) -> Self {
        use crate::capability_table::TableError::*;
        match e {
            OutOfIds | StillReferenced => Status::FailureUnknown,
            InvalidId | NotAllocated => Status::InvalidInputReg1,
        }
    }
}

impl From<vs_engine::VsError> for Status {
    fn from(e: vs_engine::VsError) -> Self {
        use vs_engine::VsError::*;
        match e {
            Table(t) => t.into(),
            NotAllocated | VpMismatch | VmMismatch | WrongPp => Status::InvalidInputReg1,
            InvalidField => Status::InvalidInputReg2,
            NotRootVs => Status::FailureUnsupported,
            OutOfMemory | HardwareFailure => Status::FailureUnknown,
        }
    }
}

impl From<mem_op::MemOpError> for Status {
    fn from(e: mem_op::MemOpError) -> Self {
        match e {
            mem_op::MemOpError::InvalidAddress => Status::InvalidInputReg1,
            mem_op::MemOpError::OutOfMemory => Status::FailureUnknown,
        }
    }
}

/// Reads the handle cookie from `ext_reg0` and confirms it authorises the
/// caller, per spec.md §4.5 ("every syscall ... first validates that
/// `ext_reg0` is the handle currently open by the calling extension").
/// Returns the authorised `ExtId` on success.
fn authorize_caller(who: CurrentPp) -> Result<ExtId, Status> {
    let cookie = crate::tls::per_cpu().get(who).regs.ext_reg0;
    let id = ExtId::new((cookie >> 16) as u16);
    ext::authorize(id, cookie).map_err(|_| Status::FailureInvalidHandle)?;
    Ok(id)
}

fn require_vmexit_extension(id: ExtId) -> Result<(), Status> {
    let obj = ext::get(id).map_err(Status::from)?;
    if !obj.is_vmexit_extension() {
        return Err(Status::InvalidPermDenied);
    }
    Ok(())
}

/// Decodes and executes one syscall. `syscall` is the family:index
/// immediate; inputs and outputs travel through `ext_reg0..5` in the
/// calling PP's TLS.
pub fn dispatch(who: CurrentPp, syscall: u64) -> Status {
    let (family, index) = match decode(syscall) {
        (Some(f), i) => (f, i),
        (None, _) => return Status::FailureUnsupported,
    };

    match family {
        Family::Handle => handle_op(who, index),
        Family::Control => control_op(who, index),
        Family::Callback => callback_op(who, index),
        Family::Debug => debug_op(who, index),
        Family::Vm => vm_op(who, index),
        Family::Vp => vp_op(who, index),
        Family::Vs => vs_op(who, index),
        Family::Intrinsic => intrinsic_op(who, index),
        Family::Mem => mem_op_dispatch(who, index),
    }
}

fn regs(who: CurrentPp) -> &'static mut crate::tls::SyscallRegs {
    &mut crate::tls::per_cpu().get(who).regs
}

fn handle_op(who: CurrentPp, index: u32) -> Status {
    match index {
        // open_handle: ext_reg0 = raw ExtId, out ext_reg1 = cookie.
        0 => {
            let id = ExtId::new(regs(who).ext_reg0 as u16);
            match ext::open_handle(id) {
                Ok(cookie) => {
                    regs(who).ext_reg1 = cookie;
                    Status::Success
                }
                Err(e) => e.into(),
            }
        }
        // close_handle: ext_reg0 = cookie.
        1 => {
            let cookie = regs(who).ext_reg0;
            let id = ExtId::new((cookie >> 16) as u16);
            match ext::close_handle(id, cookie) {
                Ok(()) => Status::Success,
                Err(e) => e.into(),
            }
        }
        _ => Status::FailureUnsupported,
    }
}

fn control_op(who: CurrentPp, index: u32) -> Status {
    if authorize_caller(who).is_err() {
        return Status::FailureInvalidHandle;
    }
    let verdict = match index {
        0 => Verdict::Exit,
        1 => Verdict::Wait,
        2 => Verdict::Again,
        _ => return Status::FailureUnsupported,
    };
    crate::tls::per_cpu().get(who).pending_verdict = Some(verdict);
    Status::Success
}

fn callback_op(who: CurrentPp, index: u32) -> Status {
    let id = match authorize_caller(who) {
        Ok(id) => id,
        Err(s) => return s,
    };
    let ip = regs(who).ext_reg1;
    let kind = match index {
        0 => ext::CallbackKind::Bootstrap,
        1 => ext::CallbackKind::Vmexit,
        2 => ext::CallbackKind::Fail,
        _ => return Status::FailureUnsupported,
    };
    match ext::register_callback(id, kind, ip) {
        Ok(()) => Status::Success,
        Err(e) => e.into(),
    }
}

fn debug_op(who: CurrentPp, index: u32) -> Status {
    match index {
        0 => {
            let ch = regs(who).ext_reg1 as u8 as char;
            let _ = core::fmt::write(&mut crate::log::RingBufferWriter, format_args!("{ch}"));
            Status::Success
        }
        1 => {
            // ext_reg1 = pointer, ext_reg2 = length. The pointer is always
            // inside the extension's own address space; the core trusts it
            // the same way it trusts any other syscall input register.
            let ptr = regs(who).ext_reg1 as *const u8;
            let len = regs(who).ext_reg2 as usize;
            let bytes = unsafe { core::slice::from_raw_parts(ptr, len) };
            let s = core::str::from_utf8(bytes).unwrap_or("<non-utf8>");
            let _ = core::fmt::write(&mut crate::log::RingBufferWriter, format_args!("{s}"));
            Status::Success
        }
        // dump_vm: ext_reg1 = raw VmId.
        2 => match vm::dump(VmId::new(regs(who).ext_reg1 as u16)) {
            Ok(()) => Status::Success,
            Err(e) => Status::from(e),
        },
        // dump_vp: ext_reg1 = raw VpId.
        3 => match vp::dump(VpId::new(regs(who).ext_reg1 as u16)) {
            Ok(()) => Status::Success,
            Err(e) => Status::from(e),
        },
        // dump_vs: ext_reg1 = raw VsId.
        4 => match vs_engine::dump(VsId::new(regs(who).ext_reg1 as u16)) {
            Ok(()) => Status::Success,
            Err(e) => Status::from(e),
        },
        // dump_ext: ext_reg1 = raw ExtId.
        5 => match ext::dump(ExtId::new(regs(who).ext_reg1 as u16)) {
            Ok(()) => Status::Success,
            Err(e) => Status::from(e),
        },
        // dump_page_pool / dump_huge_pool: no arguments.
        6 => {
            mem_op::dump_page_pool();
            Status::Success
        }
        7 => {
            mem_op::dump_huge_pool();
            Status::Success
        }
        // dump_vmexit_log: ext_reg1 = raw PpId.
        8 => match crate::vmexit_log::dump(PpId::new(regs(who).ext_reg1 as u16)) {
            Ok(()) => Status::Success,
            Err(()) => Status::InvalidInputReg1,
        },
        _ => Status::FailureUnsupported,
    }
}

fn vm_op(who: CurrentPp, index: u32) -> Status {
    let id = match authorize_caller(who) {
        Ok(id) => id,
        Err(s) => return s,
    };
    if let Err(s) = require_vmexit_extension(id) {
        return s;
    }
    match index {
        0 => match vm::create() {
            Ok(vmid) => {
                regs(who).ext_reg1 = vmid.get() as u64;
                Status::Success
            }
            Err(e) => Status::from(e),
        },
        1 => {
            let vmid = VmId::new(regs(who).ext_reg1 as u16);
            match vm::destroy(vmid) {
                Ok(()) => Status::Success,
                Err(e) => Status::from(e),
            }
        }
        // map_direct / unmap_direct: pure direct-map arithmetic, handled by
        // mem_op's phys<->virt translation; exposed again here because
        // spec.md §4.5 lists them under vm_op rather than mem_op.
        2 => match mem_op::phys_to_virt(regs(who).ext_reg1) {
            Ok(virt) => {
                regs(who).ext_reg2 = virt;
                Status::Success
            }
            Err(e) => e.into(),
        },
        3 => match mem_op::virt_to_phys(regs(who).ext_reg1) {
            Ok(_) => Status::Success,
            Err(e) => e.into(),
        },
        // unmap_direct_broadcast: reserved but permanently unsupported
        // (spec.md §5, Design Notes §9 open question resolved in DESIGN.md).
        4 => Status::FailureUnsupported,
        // tlb_flush: local-PP only; cross-PP shootdown is the extension's
        // responsibility (spec.md §5).
        5 => {
            crate::arch_ctx::intrinsics().invlpg(regs(who).ext_reg1);
            Status::Success
        }
        _ => Status::FailureUnsupported,
    }
}

fn vp_op(who: CurrentPp, index: u32) -> Status {
    if authorize_caller(who).is_err() {
        return Status::FailureInvalidHandle;
    }
    match index {
        0 => {
            let vmid = VmId::new(regs(who).ext_reg1 as u16);
            match vp::create(vmid) {
                Ok(vpid) => {
                    regs(who).ext_reg2 = vpid.get() as u64;
                    Status::Success
                }
                Err(e) => Status::from(e),
            }
        }
        1 => {
            let vpid = VpId::new(regs(who).ext_reg1 as u16);
            match vp::destroy(vpid) {
                Ok(()) => Status::Success,
                Err(e) => Status::from(e),
            }
        }
        2 => {
            let vpid = VpId::new(regs(who).ext_reg1 as u16);
            let pp = PpId::new(regs(who).ext_reg2 as u16);
            if !vp::is_allocated(vpid) {
                return Status::InvalidInputReg1;
            }
            unsafe { vp::get_mut(vpid) }.expect("validated above").migrate(pp);
            Status::Success
        }
        _ => Status::FailureUnsupported,
    }
}

fn vs_op(who: CurrentPp, index: u32) -> Status {
    if authorize_caller(who).is_err() {
        return Status::FailureInvalidHandle;
    }
    match index {
        0 => {
            let vpid = VpId::new(regs(who).ext_reg1 as u16);
            let pp = PpId::new(regs(who).ext_reg2 as u16);
            match vs_engine::create(vpid, pp) {
                Ok(vsid) => {
                    regs(who).ext_reg3 = vsid.get() as u64;
                    Status::Success
                }
                Err(e) => Status::from(e),
            }
        }
        1 => status_of(vs_engine::destroy(VsId::new(regs(who).ext_reg1 as u16))),
        2 => status_of(vs_engine::init_as_root(VsId::new(regs(who).ext_reg1 as u16))),
        3 => {
            let vsid = VsId::new(regs(who).ext_reg1 as u16);
            let reg = gpr_tag(regs(who).ext_reg2);
            match reg.and_then(|r| vs_engine::read_reg(vsid, r).ok()) {
                Some(v) => {
                    regs(who).ext_reg3 = v;
                    Status::Success
                }
                None => Status::InvalidInputReg2,
            }
        }
        4 => {
            let vsid = VsId::new(regs(who).ext_reg1 as u16);
            let reg = gpr_tag(regs(who).ext_reg2);
            match reg {
                Some(r) => status_of(vs_engine::write_reg(vsid, r, regs(who).ext_reg3)),
                None => Status::InvalidInputReg2,
            }
        }
        5 => {
            let vmid = VmId::new(regs(who).ext_reg1 as u16);
            let vpid = VpId::new(regs(who).ext_reg2 as u16);
            let vsid = VsId::new(regs(who).ext_reg3 as u16);
            match vs_engine::run(who, vmid, vpid, vsid) {
                Ok(reason) => {
                    regs(who).ext_reg1 = reason;
                    Status::Success
                }
                Err(e) => Status::from(e),
            }
        }
        6 => match vs_engine::run_current(who) {
            Ok(reason) => {
                regs(who).ext_reg1 = reason;
                Status::Success
            }
            Err(e) => Status::from(e),
        },
        7 => status_of(vs_engine::advance_ip(VsId::new(regs(who).ext_reg1 as u16))),
        8 => match vs_engine::advance_ip_and_run_current(who) {
            Ok(reason) => {
                regs(who).ext_reg1 = reason;
                Status::Success
            }
            Err(e) => Status::from(e),
        },
        9 => Status::from(vs_engine::promote(VsId::new(regs(who).ext_reg1 as u16))),
        10 => status_of(vs_engine::clear(VsId::new(regs(who).ext_reg1 as u16))),
        11 => {
            let vsid = VsId::new(regs(who).ext_reg1 as u16);
            match vs_engine::read64(vsid, regs(who).ext_reg2 as u32) {
                Ok(v) => {
                    regs(who).ext_reg3 = v;
                    Status::Success
                }
                Err(e) => Status::from(e),
            }
        }
        12 => {
            let vsid = VsId::new(regs(who).ext_reg1 as u16);
            status_of(vs_engine::write64(vsid, regs(who).ext_reg2 as u32, regs(who).ext_reg3))
        }
        _ => Status::FailureUnsupported,
    }
}

fn gpr_tag(raw: u64) -> Option<GprTag> {
    if (raw as usize) < GprTag::COUNT {
        // SAFETY net: `GprTag` is a fieldless `#[repr(usize)]`-style index
        // enum; `GprFile` itself only ever indexes through `GprTag::index`,
        // so round-tripping through the small table below keeps this
        // conversion safe without transmuting an arbitrary integer.
        gpr_tag_table().get(raw as usize).copied()
    } else {
        None
    }
}

fn gpr_tag_table() -> &'static [GprTag] {
    use GprTag::*;
    &[Rax, Rbx, Rcx, Rdx, Rbp, Rsi, Rdi, R8, R9, R10, R11, R12, R13, R14, R15, Rip, Rsp, Rflags]
}

fn status_of<E: Into<Status>>(r: Result<(), E>) -> Status {
    match r {
        Ok(()) => Status::Success,
        Err(e) => e.into(),
    }
}

fn intrinsic_op(who: CurrentPp, index: u32) -> Status {
    if authorize_caller(who).is_err() {
        return Status::FailureInvalidHandle;
    }
    let intrinsics = crate::arch_ctx::intrinsics();
    match index {
        0 => {
            regs(who).ext_reg2 = intrinsics.rdmsr(regs(who).ext_reg1 as u32);
            Status::Success
        }
        1 => {
            intrinsics.wrmsr(regs(who).ext_reg1 as u32, regs(who).ext_reg2);
            Status::Success
        }
        2 => {
            intrinsics.invlpga(regs(who).ext_reg1, regs(who).ext_reg2 as u32);
            Status::Success
        }
        3 => match intrinsics.invept(regs(who).ext_reg1) {
            Ok(()) => Status::Success,
            Err(_) => Status::FailureUnknown,
        },
        4 => match intrinsics.invvpid(regs(who).ext_reg1 as u16) {
            Ok(()) => Status::Success,
            Err(_) => Status::FailureUnknown,
        },
        _ => Status::FailureUnsupported,
    }
}

fn mem_op_dispatch(who: CurrentPp, index: u32) -> Status {
    if authorize_caller(who).is_err() {
        return Status::FailureInvalidHandle;
    }
    match index {
        0 => match mem_op::alloc_page() {
            Ok(v) => {
                regs(who).ext_reg1 = v;
                Status::Success
            }
            Err(e) => e.into(),
        },
        1 => status_of(mem_op::free_page(regs(who).ext_reg1)),
        2 => match mem_op::alloc_huge() {
            Ok(v) => {
                regs(who).ext_reg1 = v;
                Status::Success
            }
            Err(e) => e.into(),
        },
        3 => status_of(mem_op::free_huge(regs(who).ext_reg1)),
        4 => match mem_op::alloc_heap(regs(who).ext_reg1 as usize, regs(who).ext_reg2 as usize) {
            Ok(v) => {
                regs(who).ext_reg3 = v;
                Status::Success
            }
            Err(e) => e.into(),
        },
        _ => Status::FailureUnsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXT_CODE_ADDR;

    fn setup() -> CurrentPp {
        crate::arch_ctx::init_sim();
        unsafe { CurrentPp::new(PpId::new(0)) }
    }

    fn open_ext(who: CurrentPp) -> (ExtId, u64) {
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        regs(who).ext_reg0 = id.get() as u64;
        assert_eq!(handle_op(who, 0), Status::Success);
        (id, regs(who).ext_reg1)
    }

    #[test]
    fn unknown_family_is_unsupported() {
        let who = setup();
        assert_eq!(dispatch(who, pack(Family::Mem, 99)), Status::FailureUnsupported);
    }

    #[test]
    fn open_handle_then_vm_op_without_vmexit_registration_is_denied() {
        let who = setup();
        let (_id, cookie) = open_ext(who);
        regs(who).ext_reg0 = cookie;
        assert_eq!(dispatch(who, pack(Family::Vm, 0)), Status::InvalidPermDenied);
    }

    #[test]
    fn vm_op_succeeds_for_the_vmexit_extension() {
        let who = setup();
        let (id, cookie) = open_ext(who);
        regs(who).ext_reg0 = cookie;
        regs(who).ext_reg1 = EXT_CODE_ADDR;
        assert_eq!(dispatch(who, pack(Family::Callback, 1)), Status::Success);
        assert_eq!(dispatch(who, pack(Family::Vm, 0)), Status::Success);
        let vmid = regs(who).ext_reg1;
        assert!(vm::is_allocated(VmId::new(vmid as u16)));
        vm::destroy(VmId::new(vmid as u16)).unwrap();
        ext::close_handle(id, cookie).unwrap();
        ext::destroy(id).unwrap();
    }

    #[test]
    fn control_op_records_verdict() {
        let who = setup();
        let (id, cookie) = open_ext(who);
        regs(who).ext_reg0 = cookie;
        assert_eq!(dispatch(who, pack(Family::Control, 2)), Status::Success);
        assert_eq!(crate::tls::per_cpu().get(who).pending_verdict, Some(Verdict::Again));
        ext::close_handle(id, cookie).unwrap();
        ext::destroy(id).unwrap();
    }

    #[test]
    fn debug_op_dump_page_and_huge_pool_always_succeed() {
        let who = setup();
        assert_eq!(dispatch(who, pack(Family::Debug, 6)), Status::Success);
        assert_eq!(dispatch(who, pack(Family::Debug, 7)), Status::Success);
    }

    #[test]
    fn debug_op_dump_vm_rejects_unallocated_id() {
        let who = setup();
        regs(who).ext_reg1 = 0xAAAA;
        assert_eq!(dispatch(who, pack(Family::Debug, 2)), Status::InvalidInputReg1);
    }

    #[test]
    fn debug_op_dump_vm_vp_vs_ext_succeed_for_live_objects() {
        let who = setup();
        let (id, _cookie) = open_ext(who);

        let vmid = vm::create().unwrap();
        let vpid = vp::create(vmid).unwrap();
        let vsid = vs_engine::create(vpid, PpId::new(0)).unwrap();

        regs(who).ext_reg1 = vmid.get() as u64;
        assert_eq!(dispatch(who, pack(Family::Debug, 2)), Status::Success);
        regs(who).ext_reg1 = vpid.get() as u64;
        assert_eq!(dispatch(who, pack(Family::Debug, 3)), Status::Success);
        regs(who).ext_reg1 = vsid.get() as u64;
        assert_eq!(dispatch(who, pack(Family::Debug, 4)), Status::Success);
        regs(who).ext_reg1 = id.get() as u64;
        assert_eq!(dispatch(who, pack(Family::Debug, 5)), Status::Success);

        vs_engine::destroy(vsid).unwrap();
        vp::destroy(vpid).unwrap();
        vm::destroy(vmid).unwrap();
        ext::destroy(id).unwrap();
    }

    #[test]
    fn debug_op_dump_vmexit_log_rejects_out_of_range_pp() {
        let who = setup();
        regs(who).ext_reg1 = 0xFFFF;
        assert_eq!(dispatch(who, pack(Family::Debug, 8)), Status::InvalidInputReg1);
    }

    #[test]
    fn debug_op_dump_vmexit_log_succeeds_after_a_run() {
        let who = setup();
        let (id, cookie) = open_ext(who);
        regs(who).ext_reg0 = cookie;

        let vmid = vm::create().unwrap();
        let vpid = vp::create(vmid).unwrap();
        let vsid = vs_engine::create(vpid, PpId::new(0)).unwrap();
        vs_engine::run(who, vmid, vpid, vsid).unwrap();

        regs(who).ext_reg1 = 0;
        assert_eq!(dispatch(who, pack(Family::Debug, 8)), Status::Success);

        vs_engine::destroy(vsid).unwrap();
        vp::destroy(vpid).unwrap();
        vm::destroy(vmid).unwrap();
        ext::close_handle(id, cookie).unwrap();
        ext::destroy(id).unwrap();
    }

    #[test]
    fn mem_op_alloc_free_round_trips() {
        let who = setup();
        let (id, cookie) = open_ext(who);
        regs(who).ext_reg0 = cookie;
        assert_eq!(dispatch(who, pack(Family::Mem, 0)), Status::Success);
        let virt = regs(who).ext_reg1;
        regs(who).ext_reg1 = virt;
        assert_eq!(dispatch(who, pack(Family::Mem, 1)), Status::Success);
        ext::close_handle(id, cookie).unwrap();
        ext::destroy(id).unwrap();
    }
}
