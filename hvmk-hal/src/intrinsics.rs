//! Isolates every privileged instruction behind one trait so the VS engine
//! never emits `asm!` directly. Production code gets an `unsafe impl` in
//! `hvmk-x86_64`; tests get `SimIntrinsics`, a deterministic software model.
//!
//! Ground: the bare `asm!` call sites in `zerovisor-hal`'s
//! `arch::x86_64::vmcs::ActiveVmcs` (`vmread`/`vmwrite`) and
//! `arch::x86_64::svm::vmrun_asm`, pulled up into a single seam per the
//! "isolate privileged instructions, test with a deterministic double"
//! design note.

use crate::cpu::PhysicalAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicError {
    VmxFailInvalid,
    VmxFailValid(u32),
    SvmFail,
    Unsupported,
}

/// Every privileged x86_64 instruction the VS engine needs. Implementations
/// run at CPL0 in the real core; `SimIntrinsics` never executes a single
/// instruction, it only mutates in-memory state so unit and property tests
/// can run on the host.
pub trait ArchIntrinsics {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> (u32, u32, u32, u32);
    fn rdmsr(&self, msr: u32) -> u64;
    fn wrmsr(&self, msr: u32, value: u64);
    fn invlpg(&self, addr: PhysicalAddress);

    // Intel VMX
    fn vmxon(&self, region_pa: PhysicalAddress) -> Result<(), IntrinsicError>;
    fn vmxoff(&self);
    fn vmclear(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError>;
    fn vmptrld(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError>;
    fn vmread(&self, field: u32) -> Result<u64, IntrinsicError>;
    fn vmwrite(&self, field: u32, value: u64) -> Result<(), IntrinsicError>;
    /// `VMLAUNCH` if the VMCS has never been entered since its last
    /// `VMCLEAR`, `VMRESUME` otherwise; the caller (vs_engine) tracks which.
    fn vmlaunch(&self) -> Result<u64, IntrinsicError>;
    fn vmresume(&self) -> Result<u64, IntrinsicError>;
    fn invept(&self, eptp: u64) -> Result<(), IntrinsicError>;
    fn invvpid(&self, vpid: u16) -> Result<(), IntrinsicError>;

    // AMD SVM
    fn vmrun(&self, vmcb_pa: PhysicalAddress) -> Result<(), IntrinsicError>;
    fn vmsave(&self, vmcb_pa: PhysicalAddress);
    fn vmload(&self, vmcb_pa: PhysicalAddress);
    fn invlpga(&self, addr: PhysicalAddress, asid: u32);
    fn clgi(&self);
    fn stgi(&self);
}

#[cfg(any(test, feature = "sim"))]
pub mod sim {
    use super::*;
    use spin::Mutex;

    /// Deterministic software model of the privileged-instruction surface.
    /// `vmlaunch`/`vmresume`/`vmrun` always report a VMCALL-equivalent exit
    /// so the exec-loop state machine can be exercised without hardware.
    pub struct SimIntrinsics {
        msrs: Mutex<heapless::FnvIndexMap<u32, u64, 64>>,
        vmcs_fields: Mutex<heapless::FnvIndexMap<u32, u64, 128>>,
        current_vmcs: Mutex<Option<PhysicalAddress>>,
    }

    impl SimIntrinsics {
        pub fn new() -> Self {
            Self {
                msrs: Mutex::new(heapless::FnvIndexMap::new()),
                vmcs_fields: Mutex::new(heapless::FnvIndexMap::new()),
                current_vmcs: Mutex::new(None),
            }
        }
    }

    impl Default for SimIntrinsics {
        fn default() -> Self {
            Self::new()
        }
    }

    const SIMULATED_EXIT_REASON_VMCALL: u64 = 18;

    impl ArchIntrinsics for SimIntrinsics {
        fn cpuid(&self, _leaf: u32, _subleaf: u32) -> (u32, u32, u32, u32) {
            (0, 0, 0, 0)
        }

        fn rdmsr(&self, msr: u32) -> u64 {
            *self.msrs.lock().get(&msr).unwrap_or(&0)
        }

        fn wrmsr(&self, msr: u32, value: u64) {
            let _ = self.msrs.lock().insert(msr, value);
        }

        fn invlpg(&self, _addr: PhysicalAddress) {}

        fn vmxon(&self, _region_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
            Ok(())
        }

        fn vmxoff(&self) {}

        fn vmclear(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
            let mut cur = self.current_vmcs.lock();
            if *cur == Some(vmcs_pa) {
                *cur = None;
            }
            Ok(())
        }

        fn vmptrld(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
            *self.current_vmcs.lock() = Some(vmcs_pa);
            Ok(())
        }

        fn vmread(&self, field: u32) -> Result<u64, IntrinsicError> {
            if self.current_vmcs.lock().is_none() {
                return Err(IntrinsicError::VmxFailInvalid);
            }
            Ok(*self.vmcs_fields.lock().get(&field).unwrap_or(&0))
        }

        fn vmwrite(&self, field: u32, value: u64) -> Result<(), IntrinsicError> {
            if self.current_vmcs.lock().is_none() {
                return Err(IntrinsicError::VmxFailInvalid);
            }
            let _ = self.vmcs_fields.lock().insert(field, value);
            Ok(())
        }

        fn vmlaunch(&self) -> Result<u64, IntrinsicError> {
            if self.current_vmcs.lock().is_none() {
                return Err(IntrinsicError::VmxFailInvalid);
            }
            Ok(SIMULATED_EXIT_REASON_VMCALL)
        }

        fn vmresume(&self) -> Result<u64, IntrinsicError> {
            self.vmlaunch()
        }

        fn invept(&self, _eptp: u64) -> Result<(), IntrinsicError> {
            Ok(())
        }

        fn invvpid(&self, _vpid: u16) -> Result<(), IntrinsicError> {
            Ok(())
        }

        fn vmrun(&self, _vmcb_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
            Ok(())
        }

        fn vmsave(&self, _vmcb_pa: PhysicalAddress) {}
        fn vmload(&self, _vmcb_pa: PhysicalAddress) {}
        fn invlpga(&self, _addr: PhysicalAddress, _asid: u32) {}
        fn clgi(&self) {}
        fn stgi(&self) {}
    }

    #[test]
    fn vmwrite_then_vmread_round_trips_after_load() {
        let sim = SimIntrinsics::new();
        sim.vmptrld(0x1000).unwrap();
        sim.vmwrite(0x681E, 0xdead_beef).unwrap();
        assert_eq!(sim.vmread(0x681E).unwrap(), 0xdead_beef);
    }

    #[test]
    fn vmread_without_load_fails() {
        let sim = SimIntrinsics::new();
        assert_eq!(sim.vmread(0x681E), Err(IntrinsicError::VmxFailInvalid));
    }

    #[test]
    fn vmclear_invalidates_current_pointer() {
        let sim = SimIntrinsics::new();
        sim.vmptrld(0x2000).unwrap();
        sim.vmclear(0x2000).unwrap();
        assert_eq!(sim.vmwrite(0x681E, 1), Err(IntrinsicError::VmxFailInvalid));
    }
}
