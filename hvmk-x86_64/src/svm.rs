//! AMD SVM VS backend: owns one 4KiB VMCB region. Unlike VMX there is no
//! load/clear instruction pair — the VMCB is addressed directly by physical
//! address on `VMRUN`/`VMSAVE`/`VMLOAD`, and its fields are read with plain
//! memory loads at the byte offsets in `hvmk_hal::vs_fields::vmcb_offset`.
//!
//! Ground: `zerovisor-hal`'s `arch::x86_64::svm::{Vmcb, VmcbState, vmrun}`.

use hvmk_hal::vs_fields::vmcb_offset;
use hvmk_hal::{ArchIntrinsics, IntrinsicError, PhysicalAddress};

pub struct SvmVs<'a> {
    phys_addr: PhysicalAddress,
    /// Identity-mapped virtual pointer to the VMCB backing this `phys_addr`.
    /// Page mapping is the page pool's concern, not this crate's; the
    /// caller supplies the mapped pointer at construction time.
    host_ptr: *mut u8,
    intrinsics: &'a dyn ArchIntrinsics,
}

unsafe impl<'a> Send for SvmVs<'a> {}

impl<'a> SvmVs<'a> {
    /// # Safety
    /// `host_ptr` must point to a `vmcb_offset::VMCB_SIZE`-byte mapping of
    /// `phys_addr` that outlives this value.
    pub unsafe fn new(phys_addr: PhysicalAddress, host_ptr: *mut u8, intrinsics: &'a dyn ArchIntrinsics) -> Self {
        Self { phys_addr, host_ptr, intrinsics }
    }

    pub fn phys_addr(&self) -> PhysicalAddress {
        self.phys_addr
    }

    #[inline]
    fn read_u64(&self, offset: usize) -> u64 {
        unsafe { core::ptr::read_volatile(self.host_ptr.add(offset) as *const u64) }
    }

    #[inline]
    fn write_u64(&self, offset: usize, value: u64) {
        unsafe { core::ptr::write_volatile(self.host_ptr.add(offset) as *mut u64, value) }
    }

    pub fn read_field(&self, offset: usize) -> u64 {
        self.read_u64(offset)
    }

    pub fn write_field(&self, offset: usize, value: u64) {
        self.write_u64(offset, value)
    }

    pub fn exit_code(&self) -> u64 {
        self.read_u64(vmcb_offset::EXITCODE)
    }

    pub fn exit_info1(&self) -> u64 {
        self.read_u64(vmcb_offset::EXITINFO1)
    }

    pub fn exit_info2(&self) -> u64 {
        self.read_u64(vmcb_offset::EXITINFO2)
    }

    /// `VMRUN`. AMD has no separate launch/resume distinction; the same
    /// instruction both loads and runs the guest described by the VMCB.
    pub fn enter(&mut self) -> Result<u64, IntrinsicError> {
        self.intrinsics.vmrun(self.phys_addr)?;
        Ok(self.exit_code())
    }
}
