//! Virtual processor capability objects (spec.md §3/§4.1).
//!
//! A VP's `assigned_vm` is fixed at creation; `assigned_pp` starts invalid
//! and is set once on first `vs.run` ("assignment on first use", spec.md
//! §4.3 step 2), thereafter changing only through `migrate`.

use hvmk_hal::{PpId, VmId, VpId};

use crate::capability_table::{Table, TableError};
use crate::config::MAX_VPS;
use crate::vm;

pub struct VpObject {
    id: VpId,
    assigned_vm: VmId,
    assigned_pp: PpId,
    active: bool,
    /// Set while a VS is assigned to this VP; `vs_engine::create`/`destroy`
    /// toggle it so `vp::destroy` can refuse while a VS still references
    /// this VP, without vp.rs needing to depend on vs_engine.
    has_vs: bool,
}

impl VpObject {
    pub fn id(&self) -> VpId {
        self.id
    }

    pub fn assigned_vm(&self) -> VmId {
        self.assigned_vm
    }

    pub fn assigned_pp(&self) -> PpId {
        self.assigned_pp
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Assignment-on-first-use: if unset, binds to `pp`; otherwise requires
    /// equality. Returns `false` if `pp` conflicts with an existing binding.
    pub fn assign_pp_on_first_use(&mut self, pp: PpId) -> bool {
        if !self.assigned_pp.is_valid() {
            self.assigned_pp = pp;
            true
        } else {
            self.assigned_pp == pp
        }
    }

    pub fn migrate(&mut self, pp: PpId) {
        self.assigned_pp = pp;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

static VP_TABLE: Table<VpObject, MAX_VPS> = Table::new();

pub fn create(assigned_vm: VmId) -> Result<VpId, TableError> {
    if !vm::is_allocated(assigned_vm) {
        return Err(TableError::InvalidId);
    }
    let idx = VP_TABLE.alloc(VpObject {
        id: VpId::INVALID,
        assigned_vm,
        assigned_pp: PpId::INVALID,
        active: false,
        has_vs: false,
    })?;
    let id = VpId::new(idx as u16);
    unsafe {
        VP_TABLE.get_mut(idx)?.id = id;
    }
    vm::get(assigned_vm)?.mark_vp_attached();
    Ok(id)
}

pub fn destroy(id: VpId) -> Result<(), TableError> {
    let (still_referenced, assigned_vm) = {
        let vp = VP_TABLE.get(id.as_usize())?;
        (vp.has_vs || vp.active, vp.assigned_vm)
    };
    VP_TABLE.free(id.as_usize(), still_referenced)?;
    vm::get(assigned_vm)?.mark_vp_detached();
    Ok(())
}

pub fn get(id: VpId) -> Result<&'static VpObject, TableError> {
    VP_TABLE.get(id.as_usize())
}

pub fn is_allocated(id: VpId) -> bool {
    VP_TABLE.is_allocated(id.as_usize())
}

/// Writes one tabular row describing `id` to the log ring buffer
/// (`debug_op.dump_vp`).
pub fn dump(id: VpId) -> Result<(), TableError> {
    let vp = VP_TABLE.get(id.as_usize())?;
    crate::log::dump_row(
        "vp",
        &[
            ("id", vp.id.get() as u64),
            ("assigned_vm", vp.assigned_vm.get() as u64),
            ("assigned_pp", vp.assigned_pp.get() as u64),
            ("active", vp.active as u64),
            ("has_vs", vp.has_vs as u64),
        ],
    );
    Ok(())
}

/// # Safety
/// Caller must hold exclusive access to this VP per the `CurrentPp`
/// discipline documented on `capability_table::Table::get_mut`.
pub unsafe fn get_mut(id: VpId) -> Result<&'static mut VpObject, TableError> {
    unsafe { VP_TABLE.get_mut(id.as_usize()) }
}

pub(crate) fn mark_vs_attached(id: VpId) -> Result<(), TableError> {
    unsafe { get_mut(id) }?.has_vs = true;
    Ok(())
}

pub(crate) fn mark_vs_detached(id: VpId) -> Result<(), TableError> {
    unsafe { get_mut(id) }?.has_vs = false;
    Ok(())
}
