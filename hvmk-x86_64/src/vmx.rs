//! Intel VT-x VS backend: owns one 4KiB VMCS region and tracks whether it
//! has ever been entered since its last `VMCLEAR` (`VMLAUNCH` vs.
//! `VMRESUME`, spec.md §4.3).
//!
//! Ground: `zerovisor-hal`'s `arch::x86_64::vmcs::Vmcs`/`ActiveVmcs`, split
//! here so the `VMREAD`/`VMWRITE`/`VMLAUNCH`/`VMRESUME` calls go through
//! `ArchIntrinsics` instead of inline `asm!`.

use hvmk_hal::vs_fields::VmcsField;
use hvmk_hal::{ArchIntrinsics, IntrinsicError, PhysicalAddress};

pub struct VmxVs<'a> {
    phys_addr: PhysicalAddress,
    launched: bool,
    intrinsics: &'a dyn ArchIntrinsics,
}

impl<'a> VmxVs<'a> {
    pub fn new(phys_addr: PhysicalAddress, intrinsics: &'a dyn ArchIntrinsics) -> Self {
        Self { phys_addr, launched: false, intrinsics }
    }

    pub fn phys_addr(&self) -> PhysicalAddress {
        self.phys_addr
    }

    pub fn launched(&self) -> bool {
        self.launched
    }

    /// `VMCLEAR`. Must be called once before this VMCS is ever loaded, and
    /// again whenever migrating it to a different PP (spec.md §4.3 step 3).
    pub fn clear(&mut self) -> Result<(), IntrinsicError> {
        self.intrinsics.vmclear(self.phys_addr)?;
        self.launched = false;
        Ok(())
    }

    /// `VMPTRLD`. Must precede any `read`/`write`/`enter` call.
    pub fn load(&self) -> Result<(), IntrinsicError> {
        self.intrinsics.vmptrld(self.phys_addr)
    }

    pub fn read(&self, field: VmcsField) -> Result<u64, IntrinsicError> {
        self.intrinsics.vmread(field as u32)
    }

    pub fn write(&self, field: VmcsField, value: u64) -> Result<(), IntrinsicError> {
        self.intrinsics.vmwrite(field as u32, value)
    }

    /// `VMLAUNCH` on first entry since the last `clear`, `VMRESUME`
    /// thereafter. Returns the raw exit reason field.
    pub fn enter(&mut self) -> Result<u64, IntrinsicError> {
        let reason = if self.launched {
            self.intrinsics.vmresume()?
        } else {
            let r = self.intrinsics.vmlaunch()?;
            self.launched = true;
            r
        };
        Ok(reason)
    }
}
