//! Virtual machine capability objects (spec.md §3/§4.1).
//!
//! VM 0 is the implicit root VM created at bootstrap; it represents the
//! host OS state captured by the late-launch shim. A VM is destroyable only
//! when no VP is assigned to it and it is not active on any PP.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use hvmk_hal::{PpId, VmId};

use crate::capability_table::{Table, TableError};
use crate::config::MAX_VMS;

pub const ROOT_VM_ID: VmId = VmId::new(0);

pub struct VmObject {
    id: VmId,
    /// Count of VPs currently assigned to this VM, maintained by `vp::create`
    /// / `vp::destroy` so `vm::destroy` can refuse while any remain.
    vp_count: AtomicU32,
    /// One bit per PP the VM is currently active on (multi-core VMs may be
    /// active on more than one PP at once).
    active_on_pp: AtomicU64,
}

impl VmObject {
    fn new(id: VmId) -> Self {
        Self { id, vp_count: AtomicU32::new(0), active_on_pp: AtomicU64::new(0) }
    }

    pub fn id(&self) -> VmId {
        self.id
    }

    pub fn is_active_anywhere(&self) -> bool {
        self.active_on_pp.load(Ordering::Acquire) != 0
    }

    pub fn is_active_on(&self, pp: PpId) -> bool {
        self.active_on_pp.load(Ordering::Acquire) & (1 << pp.get()) != 0
    }

    pub fn mark_active(&self, pp: PpId) {
        self.active_on_pp.fetch_or(1 << pp.get(), Ordering::Release);
    }

    pub fn clear_active(&self, pp: PpId) {
        self.active_on_pp.fetch_and(!(1 << pp.get()), Ordering::Release);
    }

    pub(crate) fn mark_vp_attached(&self) {
        self.vp_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_vp_detached(&self) {
        self.vp_count.fetch_sub(1, Ordering::AcqRel);
    }

    fn has_vps(&self) -> bool {
        self.vp_count.load(Ordering::Acquire) != 0
    }
}

static VM_TABLE: Table<VmObject, MAX_VMS> = Table::new();

pub fn init_root() -> Result<(), TableError> {
    VM_TABLE.alloc_at(ROOT_VM_ID.as_usize(), VmObject::new(ROOT_VM_ID))
}

pub fn create() -> Result<VmId, TableError> {
    let idx = VM_TABLE.alloc(VmObject::new(VmId::INVALID))?;
    let id = VmId::new(idx as u16);
    unsafe {
        VM_TABLE.get_mut(idx)?.id = id;
    }
    Ok(id)
}

pub fn destroy(id: VmId) -> Result<(), TableError> {
    if id == ROOT_VM_ID {
        return Err(TableError::StillReferenced);
    }
    let still_referenced = {
        let vm = VM_TABLE.get(id.as_usize())?;
        vm.has_vps() || vm.is_active_anywhere()
    };
    VM_TABLE.free(id.as_usize(), still_referenced)
}

pub fn get(id: VmId) -> Result<&'static VmObject, TableError> {
    VM_TABLE.get(id.as_usize())
}

pub fn is_allocated(id: VmId) -> bool {
    VM_TABLE.is_allocated(id.as_usize())
}

/// Writes one tabular row describing `id` to the log ring buffer
/// (`debug_op.dump_vm`).
pub fn dump(id: VmId) -> Result<(), TableError> {
    let vm = VM_TABLE.get(id.as_usize())?;
    crate::log::dump_row(
        "vm",
        &[
            ("id", vm.id.get() as u64),
            ("vp_count", vm.vp_count.load(Ordering::Acquire) as u64),
            ("active_on_pp", vm.active_on_pp.load(Ordering::Acquire)),
        ],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_vm_for_test() -> VmId {
        create().unwrap()
    }

    #[test]
    fn create_allocates_distinct_ids() {
        let a = fresh_vm_for_test();
        let b = fresh_vm_for_test();
        assert_ne!(a, b);
    }

    #[test]
    fn destroy_refuses_while_active() {
        let vm = fresh_vm_for_test();
        get(vm).unwrap().mark_active(PpId::new(0));
        assert_eq!(destroy(vm), Err(TableError::StillReferenced));
        get(vm).unwrap().clear_active(PpId::new(0));
        assert_eq!(destroy(vm), Ok(()));
    }

    #[test]
    fn destroy_refuses_while_vp_attached() {
        let vm = fresh_vm_for_test();
        get(vm).unwrap().mark_vp_attached();
        assert_eq!(destroy(vm), Err(TableError::StillReferenced));
        get(vm).unwrap().mark_vp_detached();
        assert_eq!(destroy(vm), Ok(()));
    }

    #[test]
    fn root_vm_cannot_be_destroyed() {
        assert_eq!(destroy(ROOT_VM_ID), Err(TableError::StillReferenced));
    }
}
