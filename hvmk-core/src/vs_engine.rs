//! The VS (Virtual State) engine: owns one VMCS (Intel) or VMCB (AMD) per
//! object and implements the nine operations in spec.md §4.3, including the
//! six-step `run` algorithm and lazy migration.
//!
//! Ground: spec.md §4.3, Design Notes §9 ("Variant objects" — `enum Vs {
//! Vmx(Vmcs), Svm(Vmcb) }` selected at construction from a runtime arch
//! probe, never per-architecture header selection).

use hvmk_hal::cpu::GprFile;
use hvmk_hal::{GprTag, PpId, VmId, VpId, VsId};
use hvmk_x86_64::{SvmVs, VendorExtension, VmxVs};

use crate::arch_ctx;
use crate::capability_table::{Table, TableError};
use crate::config::MAX_VSS;
use crate::tls::{ActiveTriple, CurrentPp};
use crate::{vm, vp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsError {
    Table(TableError),
    NotAllocated,
    InvalidField,
    NotRootVs,
    VpMismatch,
    VmMismatch,
    WrongPp,
    OutOfMemory,
    HardwareFailure,
}

impl From<TableError> for VsError {
    fn from(e: TableError) -> Self {
        VsError::Table(e)
    }
}

impl From<hvmk_hal::IntrinsicError> for VsError {
    fn from(_: hvmk_hal::IntrinsicError) -> Self {
        VsError::HardwareFailure
    }
}

impl From<hvmk_hal::MemoryError> for VsError {
    fn from(_: hvmk_hal::MemoryError) -> Self {
        VsError::OutOfMemory
    }
}

pub enum VsBackend {
    Vmx(VmxVs<'static>),
    Svm(SvmVs<'static>),
}

pub struct VsObject {
    id: VsId,
    assigned_vp: VpId,
    assigned_pp: PpId,
    active: bool,
    is_root: bool,
    gprs: GprFile,
    backend: VsBackend,
}

impl VsObject {
    pub fn id(&self) -> VsId {
        self.id
    }

    pub fn assigned_vp(&self) -> VpId {
        self.assigned_vp
    }

    pub fn assigned_pp(&self) -> PpId {
        self.assigned_pp
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn launched(&self) -> bool {
        match &self.backend {
            VsBackend::Vmx(b) => b.launched(),
            VsBackend::Svm(_) => false,
        }
    }

    pub fn clean(&self) -> bool {
        match &self.backend {
            VsBackend::Vmx(_) => true,
            VsBackend::Svm(b) => b.read_field(hvmk_hal::vs_fields::vmcb_offset::VMCB_CLEAN) != 0,
        }
    }
}

static VS_TABLE: Table<VsObject, MAX_VSS> = Table::new();

fn new_backend_region() -> Result<u64, VsError> {
    Ok(arch_ctx::page_pool().alloc_page()?)
}

/// `create(vp, pp)`: allocates a fresh backend region, zeroed, `launched =
/// false`, `clean = false`.
pub fn create(assigned_vp: VpId, assigned_pp: PpId) -> Result<VsId, VsError> {
    if !vp::is_allocated(assigned_vp) {
        return Err(VsError::VpMismatch);
    }
    let phys = new_backend_region()?;
    let backend = match arch_ctx::vendor() {
        VendorExtension::Vmx => {
            let mut vs = VmxVs::new(phys, arch_ctx::intrinsics());
            vs.clear()?;
            VsBackend::Vmx(vs)
        }
        VendorExtension::Svm => {
            // SAFETY: `phys` was just allocated fresh from the page pool and
            // is identity-mapped by construction of this workspace's page
            // pool contract (host virtual == guest physical for core state).
            let vs = unsafe { SvmVs::new(phys, phys as *mut u8, arch_ctx::intrinsics()) };
            VsBackend::Svm(vs)
        }
    };
    let idx = VS_TABLE.alloc(VsObject {
        id: VsId::INVALID,
        assigned_vp,
        assigned_pp,
        active: false,
        is_root: false,
        gprs: GprFile::zeroed(),
        backend,
    })?;
    let id = VsId::new(idx as u16);
    unsafe {
        VS_TABLE.get_mut(idx)?.id = id;
    }
    vp::mark_vs_attached(assigned_vp)?;
    Ok(id)
}

/// Creates the root VS for `pp` at a fixed slot (`id == pp_id`), called once
/// per PP at bootstrap.
pub fn create_root(pp: PpId, assigned_vp: VpId) -> Result<VsId, VsError> {
    let phys = new_backend_region()?;
    let backend = match arch_ctx::vendor() {
        VendorExtension::Vmx => {
            let mut vs = VmxVs::new(phys, arch_ctx::intrinsics());
            vs.clear()?;
            VsBackend::Vmx(vs)
        }
        VendorExtension::Svm => {
            let vs = unsafe { SvmVs::new(phys, phys as *mut u8, arch_ctx::intrinsics()) };
            VsBackend::Svm(vs)
        }
    };
    VS_TABLE.alloc_at(
        pp.as_usize(),
        VsObject { id: VsId::new(pp.get()), assigned_vp, assigned_pp: pp, active: false, is_root: true, gprs: GprFile::zeroed(), backend },
    )?;
    vp::mark_vs_attached(assigned_vp)?;
    Ok(VsId::new(pp.get()))
}

pub fn destroy(id: VsId) -> Result<(), VsError> {
    let (active, assigned_vp) = {
        let vs = VS_TABLE.get(id.as_usize())?;
        (vs.active, vs.assigned_vp)
    };
    VS_TABLE.free(id.as_usize(), active)?;
    vp::mark_vs_detached(assigned_vp)?;
    Ok(())
}

/// `init_as_root(vs)`: initialises a root VS from host state captured by the
/// late-launch shim. In this software model that host state is the identity
/// seed produced by `VmxVs::clear`/`SvmVs::new`; callers supplying real host
/// register values do so through `write_reg`/`write64` afterward.
pub fn init_as_root(id: VsId) -> Result<(), VsError> {
    let vs = VS_TABLE.get(id.as_usize())?;
    if !vs.is_root {
        return Err(VsError::NotRootVs);
    }
    Ok(())
}

pub fn read64(id: VsId, field: u32) -> Result<u64, VsError> {
    let vs = VS_TABLE.get(id.as_usize())?;
    match &vs.backend {
        VsBackend::Vmx(b) => {
            b.load()?;
            let field = hvmk_hal::vs_fields::VmcsField::from_raw(field).ok_or(VsError::InvalidField)?;
            Ok(b.read(field)?)
        }
        VsBackend::Svm(b) => Ok(b.read_field(field as usize)),
    }
}

pub fn write64(id: VsId, field: u32, value: u64) -> Result<(), VsError> {
    let vs = VS_TABLE.get(id.as_usize())?;
    match &vs.backend {
        VsBackend::Vmx(b) => {
            b.load()?;
            let field = hvmk_hal::vs_fields::VmcsField::from_raw(field).ok_or(VsError::InvalidField)?;
            Ok(b.write(field, value)?)
        }
        VsBackend::Svm(b) => {
            b.write_field(field as usize, value);
            Ok(())
        }
    }
}

macro_rules! narrow_rw {
    ($read_name:ident, $write_name:ident, $ty:ty) => {
        pub fn $read_name(id: VsId, field: u32) -> Result<$ty, VsError> {
            Ok(read64(id, field)? as $ty)
        }

        pub fn $write_name(id: VsId, field: u32, value: $ty) -> Result<(), VsError> {
            write64(id, field, value as u64)
        }
    };
}

narrow_rw!(read8, write8, u8);
narrow_rw!(read16, write16, u16);
narrow_rw!(read32, write32, u32);

/// # Safety
/// Exclusive access to this VS, per the same discipline as
/// `capability_table::Table::get_mut`.
pub unsafe fn get_mut(id: VsId) -> Result<&'static mut VsObject, VsError> {
    Ok(unsafe { VS_TABLE.get_mut(id.as_usize())? })
}

pub fn get(id: VsId) -> Result<&'static VsObject, VsError> {
    Ok(VS_TABLE.get(id.as_usize())?)
}

/// Writes one tabular row describing `id` to the log ring buffer
/// (`debug_op.dump_vs`).
pub fn dump(id: VsId) -> Result<(), VsError> {
    let vs = VS_TABLE.get(id.as_usize())?;
    crate::log::dump_row(
        "vs",
        &[
            ("id", vs.id.get() as u64),
            ("assigned_vp", vs.assigned_vp.get() as u64),
            ("assigned_pp", vs.assigned_pp.get() as u64),
            ("active", vs.active as u64),
            ("is_root", vs.is_root as u64),
            ("launched", vs.launched() as u64),
            ("clean", vs.clean() as u64),
        ],
    );
    Ok(())
}

pub fn read_reg(id: VsId, reg: GprTag) -> Result<u64, VsError> {
    Ok(VS_TABLE.get(id.as_usize())?.gprs.read(reg))
}

pub fn write_reg(id: VsId, reg: GprTag, value: u64) -> Result<(), VsError> {
    unsafe { get_mut(id) }?.gprs.write(reg, value);
    Ok(())
}

/// `clear(vs)`: Intel VMCLEAR (`launched = false`); AMD zeroes the VMCB
/// Clean Bits field so the next `VMRUN` does a full reload.
pub fn clear(id: VsId) -> Result<(), VsError> {
    let vs = unsafe { get_mut(id) }?;
    match &mut vs.backend {
        VsBackend::Vmx(b) => Ok(b.clear()?),
        VsBackend::Svm(b) => {
            b.write_field(hvmk_hal::vs_fields::vmcb_offset::VMCB_CLEAN, 0);
            Ok(())
        }
    }
}

/// Tears down the hypervisor on this PP and re-enters natively. In this
/// software model there is no hardware to hand control back to, so this
/// always returns the failure path described in spec.md §4.3 ("returns only
/// on failure").
pub fn promote(_id: VsId) -> VsError {
    VsError::HardwareFailure
}

/// The six-step `run` algorithm (spec.md §4.3).
pub fn run(who: CurrentPp, vmid: VmId, vpid: VpId, vsid: VsId) -> Result<u64, VsError> {
    // Step 1: validate.
    if !vm::is_allocated(vmid) {
        return Err(VsError::VmMismatch);
    }
    if !vp::is_allocated(vpid) {
        return Err(VsError::VpMismatch);
    }
    {
        let vp = vp::get(vpid)?;
        if vp.assigned_vm() != vmid {
            return Err(VsError::VmMismatch);
        }
    }
    {
        let vs = VS_TABLE.get(vsid.as_usize())?;
        if vs.assigned_vp != vpid {
            return Err(VsError::VpMismatch);
        }
    }

    // Step 2: assignment on first use.
    {
        let vp = unsafe { vp::get_mut(vpid) }?;
        if !vp.assign_pp_on_first_use(who.pp()) {
            return Err(VsError::WrongPp);
        }
    }

    // Step 3: lazy migration — clear and re-home if the VS moved PPs.
    {
        let needs_migration = VS_TABLE.get(vsid.as_usize())?.assigned_pp != who.pp();
        if needs_migration {
            clear(vsid)?;
            unsafe { get_mut(vsid) }?.assigned_pp = who.pp();
        }
    }

    // Step 4: active-triple bookkeeping — deactivate the outgoing triple (if
    // any) and mark the incoming VM/VP/VS active on this PP.
    let cpu = crate::tls::per_cpu().get(who);
    let outgoing = cpu.active;
    if outgoing.is_set() && outgoing.vs != vsid {
        if let Ok(old) = unsafe { get_mut(outgoing.vs) } {
            old.active = false;
        }
        if let Ok(old_vp) = unsafe { vp::get_mut(outgoing.vp) } {
            old_vp.set_active(false);
        }
        if let Ok(old_vm) = vm::get(outgoing.vm) {
            old_vm.clear_active(who.pp());
        }
    }
    cpu.active = ActiveTriple { vm: vmid, vp: vpid, vs: vsid };
    {
        let vs = unsafe { get_mut(vsid) }?;
        vs.active = true;
    }
    unsafe { vp::get_mut(vpid) }?.set_active(true);
    vm::get(vmid)?.mark_active(who.pp());

    // Step 5: dispatch to architecture.
    let vs = unsafe { get_mut(vsid) }?;
    let reason = match &mut vs.backend {
        VsBackend::Vmx(b) => {
            b.load()?;
            b.enter()?
        }
        VsBackend::Svm(b) => b.enter()?,
    };

    // Step 6: control returns here on a VM-exit; the exec loop is
    // responsible for invoking `vmexit_ip` with this reason.
    crate::vmexit_log::record(who.pp(), vmid, vpid, vsid, reason);
    Ok(reason)
}

pub fn run_current(who: CurrentPp) -> Result<u64, VsError> {
    let active = crate::tls::per_cpu().get(who).active;
    if !active.is_set() {
        return Err(VsError::WrongPp);
    }
    run(who, active.vm, active.vp, active.vs)
}

/// `advance_ip(vs)`: bumps guest RIP by the exit instruction length
/// (Intel), or adopts the hardware-computed next-RIP (`NRIP`, AMD).
pub fn advance_ip(id: VsId) -> Result<(), VsError> {
    let vs = unsafe { get_mut(id) }?;
    match &mut vs.backend {
        VsBackend::Vmx(b) => {
            b.load()?;
            let rip = b.read(hvmk_hal::vs_fields::VmcsField::GUEST_RIP)?;
            let len = b.read(hvmk_hal::vs_fields::VmcsField::VM_EXIT_INSTRUCTION_LEN)?;
            b.write(hvmk_hal::vs_fields::VmcsField::GUEST_RIP, rip + len)?;
            Ok(())
        }
        VsBackend::Svm(b) => {
            let nrip = b.read_field(hvmk_hal::vs_fields::vmcb_offset::NRIP);
            if nrip != 0 {
                b.write_field(hvmk_hal::vs_fields::vmcb_offset::GUEST_RIP, nrip);
            }
            Ok(())
        }
    }
}

pub fn advance_ip_and_run_current(who: CurrentPp) -> Result<u64, VsError> {
    let active = crate::tls::per_cpu().get(who).active;
    if !active.is_set() {
        return Err(VsError::WrongPp);
    }
    advance_ip(active.vs)?;
    run_current(who)
}
