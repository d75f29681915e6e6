#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Concrete x86_64 VS backends (Intel VT-x VMCS, AMD SVM VMCB) and the
//! production `ArchIntrinsics` implementation. The core depends on this
//! crate only through `hvmk_hal::ArchIntrinsics` and the two VS structs
//! below; it never sees an `asm!` block.

pub mod callback;
pub mod intrinsics;
pub mod svm;
pub mod vmx;

pub use callback::NativeCallbackHook;
pub use intrinsics::X86Intrinsics;
pub use svm::SvmVs;
pub use vmx::VmxVs;

/// Which virtualisation extension this physical processor supports, as
/// reported by `CPUID`. A PP with neither is not bootable as a hvmk host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorExtension {
    Vmx,
    Svm,
}

/// Detects VMX (`CPUID.1:ECX.VMX[bit 5]`) or SVM
/// (`CPUID.80000001H:ECX.SVM[bit 2]`) support.
pub fn detect_vendor_extension(intrinsics: &dyn hvmk_hal::ArchIntrinsics) -> Option<VendorExtension> {
    let (_, _, ecx1, _) = intrinsics.cpuid(1, 0);
    if ecx1 & (1 << 5) != 0 {
        return Some(VendorExtension::Vmx);
    }
    let (_, _, ecx_ext, _) = intrinsics.cpuid(0x8000_0001, 0);
    if ecx_ext & (1 << 2) != 0 {
        return Some(VendorExtension::Svm);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvmk_hal::intrinsics::sim::SimIntrinsics;

    #[test]
    fn sim_reports_no_vendor_extension() {
        let sim = SimIntrinsics::new();
        assert_eq!(detect_vendor_extension(&sim), None);
    }
}
