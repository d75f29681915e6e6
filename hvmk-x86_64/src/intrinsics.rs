//! Production `ArchIntrinsics` implementation. Every privileged instruction
//! lives here behind a single `unsafe` boundary; no other module in the
//! workspace is allowed to contain an `asm!` block.
//!
//! Ground: the `vmread`/`vmwrite` asm wrappers in `zerovisor-hal`'s
//! `arch::x86_64::vmcs::ActiveVmcs` and the `vmrun_asm` wrapper in
//! `arch::x86_64::svm`.

use core::arch::asm;
use hvmk_hal::{ArchIntrinsics, IntrinsicError, PhysicalAddress};

/// Runs on bare metal at CPL0. Carries no state of its own; the VMCS/VMCB
/// pointer currently loaded is hardware state, not Rust state.
pub struct X86Intrinsics;

impl X86Intrinsics {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for X86Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
unsafe fn vmx_op(carry_means_invalid: bool, zero_means_valid_with_error: bool) -> Result<(), IntrinsicError> {
    if carry_means_invalid {
        return Err(IntrinsicError::VmxFailInvalid);
    }
    if zero_means_valid_with_error {
        // Caller reads VM_INSTRUCTION_ERROR separately; this path only
        // distinguishes CF=1 (invalid) from ZF=1 (valid, error field set).
        return Err(IntrinsicError::VmxFailValid(0));
    }
    Ok(())
}

impl ArchIntrinsics for X86Intrinsics {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> (u32, u32, u32, u32) {
        let (eax, ebx, ecx, edx);
        unsafe {
            asm!(
                "cpuid",
                inout("eax") leaf => eax,
                out("ebx") ebx,
                inout("ecx") subleaf => ecx,
                out("edx") edx,
            );
        }
        (eax, ebx, ecx, edx)
    }

    fn rdmsr(&self, msr: u32) -> u64 {
        let (lo, hi): (u32, u32);
        unsafe {
            asm!("rdmsr", in("ecx") msr, out("eax") lo, out("edx") hi, options(nomem, nostack));
        }
        ((hi as u64) << 32) | lo as u64
    }

    fn wrmsr(&self, msr: u32, value: u64) {
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        unsafe {
            asm!("wrmsr", in("ecx") msr, in("eax") lo, in("edx") hi, options(nomem, nostack));
        }
    }

    fn invlpg(&self, addr: PhysicalAddress) {
        unsafe {
            asm!("invlpg [{}]", in(reg) addr, options(nostack));
        }
    }

    fn vmxon(&self, region_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmxon [{region}]",
                "setc {carry}",
                region = in(reg) &region_pa,
                carry = out(reg_byte) carry,
                options(nostack),
            );
        }
        unsafe { vmx_op(carry != 0, false) }
    }

    fn vmxoff(&self) {
        unsafe {
            asm!("vmxoff", options(nostack));
        }
    }

    fn vmclear(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmclear [{region}]",
                "setc {carry}",
                region = in(reg) &vmcs_pa,
                carry = out(reg_byte) carry,
                options(nostack),
            );
        }
        unsafe { vmx_op(carry != 0, false) }
    }

    fn vmptrld(&self, vmcs_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmptrld [{region}]",
                "setc {carry}",
                region = in(reg) &vmcs_pa,
                carry = out(reg_byte) carry,
                options(nostack),
            );
        }
        unsafe { vmx_op(carry != 0, false) }
    }

    fn vmread(&self, field: u32) -> Result<u64, IntrinsicError> {
        let value: u64;
        let carry: u8;
        unsafe {
            asm!(
                "vmread {field:r}, {value}",
                "setc {carry}",
                field = in(reg) field as u64,
                value = lateout(reg) value,
                carry = out(reg_byte) carry,
                options(nostack, preserves_flags),
            );
        }
        if carry != 0 {
            return Err(IntrinsicError::VmxFailInvalid);
        }
        Ok(value)
    }

    fn vmwrite(&self, field: u32, value: u64) -> Result<(), IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmwrite {value}, {field:r}",
                "setc {carry}",
                field = in(reg) field as u64,
                value = in(reg) value,
                carry = out(reg_byte) carry,
                options(nostack, preserves_flags),
            );
        }
        if carry != 0 {
            return Err(IntrinsicError::VmxFailInvalid);
        }
        Ok(())
    }

    fn vmlaunch(&self) -> Result<u64, IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmlaunch",
                "setc {carry}",
                carry = out(reg_byte) carry,
                options(nostack),
            );
        }
        if carry != 0 {
            return Err(IntrinsicError::VmxFailInvalid);
        }
        self.vmread(hvmk_hal::vs_fields::VmcsField::EXIT_REASON as u32)
    }

    fn vmresume(&self) -> Result<u64, IntrinsicError> {
        let carry: u8;
        unsafe {
            asm!(
                "vmresume",
                "setc {carry}",
                carry = out(reg_byte) carry,
                options(nostack),
            );
        }
        if carry != 0 {
            return Err(IntrinsicError::VmxFailInvalid);
        }
        self.vmread(hvmk_hal::vs_fields::VmcsField::EXIT_REASON as u32)
    }

    fn invept(&self, eptp: u64) -> Result<(), IntrinsicError> {
        let descriptor: [u64; 2] = [eptp, 0];
        let carry: u8;
        unsafe {
            asm!(
                "invept {desc:r}, [{descptr}]",
                desc = in(reg) 1u64,
                descptr = in(reg) &descriptor,
                options(nostack),
            );
            asm!("setc {carry}", carry = out(reg_byte) carry, options(nostack));
        }
        unsafe { vmx_op(carry != 0, false) }
    }

    fn invvpid(&self, vpid: u16) -> Result<(), IntrinsicError> {
        let descriptor: [u64; 2] = [vpid as u64, 0];
        let carry: u8;
        unsafe {
            asm!(
                "invvpid {desc:r}, [{descptr}]",
                desc = in(reg) 1u64,
                descptr = in(reg) &descriptor,
                options(nostack),
            );
            asm!("setc {carry}", carry = out(reg_byte) carry, options(nostack));
        }
        unsafe { vmx_op(carry != 0, false) }
    }

    fn vmrun(&self, vmcb_pa: PhysicalAddress) -> Result<(), IntrinsicError> {
        unsafe {
            asm!(
                "vmrun",
                in("rax") vmcb_pa,
                clobber_abi("C"),
            );
        }
        Ok(())
    }

    fn vmsave(&self, vmcb_pa: PhysicalAddress) {
        unsafe {
            asm!("vmsave", in("rax") vmcb_pa, clobber_abi("C"));
        }
    }

    fn vmload(&self, vmcb_pa: PhysicalAddress) {
        unsafe {
            asm!("vmload", in("rax") vmcb_pa, clobber_abi("C"));
        }
    }

    fn invlpga(&self, addr: PhysicalAddress, asid: u32) {
        unsafe {
            asm!("invlpga", in("rax") addr, in("ecx") asid, clobber_abi("C"));
        }
    }

    fn clgi(&self) {
        unsafe {
            asm!("clgi", options(nostack));
        }
    }

    fn stgi(&self) {
        unsafe {
            asm!("stgi", options(nostack));
        }
    }
}
