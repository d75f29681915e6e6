//! Logical register file shared between the VS engine's cached GPRs and the
//! per-PP TLS register file used by the syscall ABI.
//!
//! Ground: `zerovisor-hal`'s `CpuState`/`SegmentRegister`, trimmed to the
//! x86_64-only scope of this core (the arm64/riscv variants the teacher
//! carried are a non-goal here).

use bitflags::bitflags;

pub type PhysicalAddress = u64;
pub type VirtualAddress = u64;

bitflags! {
    /// CPU feature bits relevant to staging a VS (reported by `CPUID`
    /// through `ArchIntrinsics`, not modelled exhaustively).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFeatures: u64 {
        const VMX              = 1 << 0;
        const SVM               = 1 << 1;
        const NESTED_PAGING     = 1 << 2;
        const INVPCID           = 1 << 3;
        const XSAVE             = 1 << 4;
    }
}

/// Which hardware vendor's virtualisation extension this PP supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
}

/// Logical general-purpose register tag used by `vs_engine::read_reg` /
/// `write_reg` and by the per-PP TLS register file (`ext_reg0..5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GprTag {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
    Rsp,
    Rflags,
}

impl GprTag {
    pub const COUNT: usize = 18;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Segment register snapshot (selector + hidden descriptor-cache fields).
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentRegister {
    pub selector: u16,
    pub base: u64,
    pub limit: u32,
    pub access_rights: u32,
}

/// GDTR/IDTR snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorTableRegister {
    pub base: u64,
    pub limit: u16,
}

/// Cached general-purpose register file for a VS. Flushed into / loaded
/// from the per-PP TLS slots by `vs_engine::run`'s active-triple bookkeeping
/// (spec.md §4.3 step 4).
#[derive(Debug, Clone, Copy)]
pub struct GprFile {
    regs: [u64; GprTag::COUNT],
}

impl GprFile {
    pub const fn zeroed() -> Self {
        Self { regs: [0; GprTag::COUNT] }
    }

    #[inline]
    pub fn read(&self, tag: GprTag) -> u64 {
        self.regs[tag.index()]
    }

    #[inline]
    pub fn write(&mut self, tag: GprTag, value: u64) {
        self.regs[tag.index()] = value;
    }
}

impl Default for GprFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_file_round_trips() {
        let mut f = GprFile::zeroed();
        f.write(GprTag::R12, 0xdead_beef);
        assert_eq!(f.read(GprTag::R12), 0xdead_beef);
        assert_eq!(f.read(GprTag::Rax), 0);
    }
}
