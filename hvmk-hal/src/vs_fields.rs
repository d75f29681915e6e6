//! Field encodings for the two VS backends: Intel VMCS field IDs consumed by
//! `VMREAD`/`VMWRITE`, and AMD VMCB byte offsets consumed by direct memory
//! access into the control/save-state areas.
//!
//! Ground: `zerovisor-hal`'s `arch::x86_64::vmcs::VmcsField` (copied
//! verbatim, it is already a complete SDM-derived encoding table) and
//! `arch::x86_64::svm::vmcb_offsets` (same).

/// Intel SDM Appendix B VMCS field encodings.
#[repr(u32)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmcsField {
    // 16-bit Control Fields
    VIRTUAL_PROCESSOR_ID = 0x0000,
    POSTED_INTR_NOTIFICATION = 0x0002,
    EPTP_INDEX = 0x0004,

    // 16-bit Guest State Fields
    GUEST_ES_SELECTOR = 0x0800,
    GUEST_CS_SELECTOR = 0x0802,
    GUEST_SS_SELECTOR = 0x0804,
    GUEST_DS_SELECTOR = 0x0806,
    GUEST_FS_SELECTOR = 0x0808,
    GUEST_GS_SELECTOR = 0x080A,
    GUEST_LDTR_SELECTOR = 0x080C,
    GUEST_TR_SELECTOR = 0x080E,
    GUEST_INTR_STATUS = 0x0810,
    GUEST_PML_INDEX = 0x0812,

    // 16-bit Host State Fields
    HOST_ES_SELECTOR = 0x0C00,
    HOST_CS_SELECTOR = 0x0C02,
    HOST_SS_SELECTOR = 0x0C04,
    HOST_DS_SELECTOR = 0x0C06,
    HOST_FS_SELECTOR = 0x0C08,
    HOST_GS_SELECTOR = 0x0C0A,
    HOST_TR_SELECTOR = 0x0C0C,

    // 64-bit Control Fields
    IO_BITMAP_A = 0x2000,
    IO_BITMAP_B = 0x2002,
    MSR_BITMAP = 0x2004,
    VM_EXIT_MSR_STORE_ADDR = 0x2006,
    VM_EXIT_MSR_LOAD_ADDR = 0x2008,
    VM_ENTRY_MSR_LOAD_ADDR = 0x200A,
    EXECUTIVE_VMCS_POINTER = 0x200C,
    PML_ADDRESS = 0x200E,
    TSC_OFFSET = 0x2010,
    VIRTUAL_APIC_PAGE_ADDR = 0x2012,
    APIC_ACCESS_ADDR = 0x2014,
    POSTED_INTR_DESC_ADDR = 0x2016,
    VM_FUNCTION_CONTROL = 0x2018,
    EPT_POINTER = 0x201A,
    EOI_EXIT_BITMAP0 = 0x201C,
    EOI_EXIT_BITMAP1 = 0x201E,
    EOI_EXIT_BITMAP2 = 0x2020,
    EOI_EXIT_BITMAP3 = 0x2022,
    EPTP_LIST_ADDRESS = 0x2024,
    VMREAD_BITMAP = 0x2026,
    VMWRITE_BITMAP = 0x2028,
    VE_INFO_ADDRESS = 0x202A,
    XSS_EXIT_BITMAP = 0x202C,
    ENCLS_EXITING_BITMAP = 0x202E,
    SUB_PAGE_PERM_TABLE_PTR = 0x2030,
    TSC_MULTIPLIER = 0x2032,

    // 64-bit Read-Only Data Fields
    GUEST_PHYS_ADDR = 0x2400,

    // 64-bit Guest State Fields
    VMCS_LINK_POINTER = 0x2800,
    GUEST_IA32_DEBUGCTL = 0x2802,
    GUEST_IA32_PAT = 0x2804,
    GUEST_IA32_EFER = 0x2806,
    GUEST_IA32_PERF_GLOBAL_CTRL = 0x2808,
    GUEST_PDPTR0 = 0x280A,
    GUEST_PDPTR1 = 0x280C,
    GUEST_PDPTR2 = 0x280E,
    GUEST_PDPTR3 = 0x2810,
    GUEST_IA32_BNDCFGS = 0x2812,
    GUEST_IA32_RTIT_CTL = 0x2814,

    // 64-bit Host State Fields
    HOST_IA32_PAT = 0x2C00,
    HOST_IA32_EFER = 0x2C02,
    HOST_IA32_PERF_GLOBAL_CTRL = 0x2C04,

    // 32-bit Control Fields
    PIN_BASED_VM_EXEC_CONTROL = 0x4000,
    CPU_BASED_VM_EXEC_CONTROL = 0x4002,
    EXCEPTION_BITMAP = 0x4004,
    PAGE_FAULT_ERROR_CODE_MASK = 0x4006,
    PAGE_FAULT_ERROR_CODE_MATCH = 0x4008,
    CR3_TARGET_COUNT = 0x400A,
    VM_EXIT_CONTROLS = 0x400C,
    VM_EXIT_MSR_STORE_COUNT = 0x400E,
    VM_EXIT_MSR_LOAD_COUNT = 0x4010,
    VM_ENTRY_CONTROLS = 0x4012,
    VM_ENTRY_MSR_LOAD_COUNT = 0x4014,
    VM_ENTRY_INTR_INFO_FIELD = 0x4016,
    VM_ENTRY_EXCEPTION_ERROR_CODE = 0x4018,
    VM_ENTRY_INSTRUCTION_LEN = 0x401A,
    TPR_THRESHOLD = 0x401C,
    SECONDARY_VM_EXEC_CONTROL = 0x401E,
    PLE_GAP = 0x4020,
    PLE_WINDOW = 0x4022,

    // 32-bit Read-Only Data Fields
    VM_INSTRUCTION_ERROR = 0x4400,
    EXIT_REASON = 0x4402,
    VM_EXIT_INTR_INFO = 0x4404,
    VM_EXIT_INTR_ERROR_CODE = 0x4406,
    IDT_VECTORING_INFO_FIELD = 0x4408,
    IDT_VECTORING_ERROR_CODE = 0x440A,
    VM_EXIT_INSTRUCTION_LEN = 0x440C,
    VMX_INSTRUCTION_INFO = 0x440E,

    // 32-bit Guest State Fields
    GUEST_ES_LIMIT = 0x4800,
    GUEST_CS_LIMIT = 0x4802,
    GUEST_SS_LIMIT = 0x4804,
    GUEST_DS_LIMIT = 0x4806,
    GUEST_FS_LIMIT = 0x4808,
    GUEST_GS_LIMIT = 0x480A,
    GUEST_LDTR_LIMIT = 0x480C,
    GUEST_TR_LIMIT = 0x480E,
    GUEST_GDTR_LIMIT = 0x4810,
    GUEST_IDTR_LIMIT = 0x4812,
    GUEST_ES_AR_BYTES = 0x4814,
    GUEST_CS_AR_BYTES = 0x4816,
    GUEST_SS_AR_BYTES = 0x4818,
    GUEST_DS_AR_BYTES = 0x481A,
    GUEST_FS_AR_BYTES = 0x481C,
    GUEST_GS_AR_BYTES = 0x481E,
    GUEST_LDTR_AR_BYTES = 0x4820,
    GUEST_TR_AR_BYTES = 0x4822,
    GUEST_INTERRUPTIBILITY_INFO = 0x4824,
    GUEST_ACTIVITY_STATE = 0x4826,
    GUEST_SMBASE = 0x4828,
    GUEST_IA32_SYSENTER_CS = 0x482A,
    VMX_PREEMPTION_TIMER_VALUE = 0x482E,

    // 32-bit Host State Fields
    HOST_IA32_SYSENTER_CS = 0x4C00,

    // Natural-width Control Fields
    CR0_GUEST_HOST_MASK = 0x6000,
    CR4_GUEST_HOST_MASK = 0x6002,
    CR0_READ_SHADOW = 0x6004,
    CR4_READ_SHADOW = 0x6006,
    CR3_TARGET_VALUE0 = 0x6008,
    CR3_TARGET_VALUE1 = 0x600A,
    CR3_TARGET_VALUE2 = 0x600C,
    CR3_TARGET_VALUE3 = 0x600E,

    // Natural-width Read-Only Data Fields
    EXIT_QUALIFICATION = 0x6400,
    IO_RCX = 0x6402,
    IO_RSI = 0x6404,
    IO_RDI = 0x6406,
    IO_RIP = 0x6408,
    GUEST_LINEAR_ADDR = 0x640A,

    // Natural-width Guest State Fields
    GUEST_CR0 = 0x6800,
    GUEST_CR3 = 0x6802,
    GUEST_CR4 = 0x6804,
    GUEST_ES_BASE = 0x6806,
    GUEST_CS_BASE = 0x6808,
    GUEST_SS_BASE = 0x680A,
    GUEST_DS_BASE = 0x680C,
    GUEST_FS_BASE = 0x680E,
    GUEST_GS_BASE = 0x6810,
    GUEST_LDTR_BASE = 0x6812,
    GUEST_TR_BASE = 0x6814,
    GUEST_GDTR_BASE = 0x6816,
    GUEST_IDTR_BASE = 0x6818,
    GUEST_DR7 = 0x681A,
    GUEST_RSP = 0x681C,
    GUEST_RIP = 0x681E,
    GUEST_RFLAGS = 0x6820,
    GUEST_PENDING_DBG_EXCEPTIONS = 0x6822,
    GUEST_IA32_SYSENTER_ESP = 0x6824,
    GUEST_IA32_SYSENTER_EIP = 0x6826,

    // General-purpose guest registers (non-architectural, used by this
    // core's GPR cache sync instead of a separate side table)
    GUEST_RAX = 0x6828,
    GUEST_RBX = 0x682A,
    GUEST_RCX = 0x682C,
    GUEST_RDX = 0x682E,
    GUEST_RSI = 0x6830,
    GUEST_RDI = 0x6832,
    GUEST_RBP = 0x6834,
    GUEST_R8 = 0x6836,
    GUEST_R9 = 0x6838,
    GUEST_R10 = 0x683A,
    GUEST_R11 = 0x683C,
    GUEST_R12 = 0x683E,
    GUEST_R13 = 0x6840,
    GUEST_R14 = 0x6842,
    GUEST_R15 = 0x6844,

    // Natural-width Host State Fields
    HOST_CR0 = 0x6C00,
    HOST_CR3 = 0x6C02,
    HOST_CR4 = 0x6C04,
    HOST_FS_BASE = 0x6C06,
    HOST_GS_BASE = 0x6C08,
    HOST_TR_BASE = 0x6C0A,
    HOST_GDTR_BASE = 0x6C0C,
    HOST_IDTR_BASE = 0x6C0E,
    HOST_IA32_SYSENTER_ESP = 0x6C10,
    HOST_IA32_SYSENTER_EIP = 0x6C12,
    HOST_RSP = 0x6C14,
    HOST_RIP = 0x6C16,
}

impl VmcsField {
    /// Converts a raw field encoding (as carried over the syscall ABI) back
    /// into a typed field, rejecting anything this table doesn't know about
    /// rather than transmuting an arbitrary `u32` into the enum.
    pub fn from_raw(raw: u32) -> Option<Self> {
        use VmcsField::*;
        Some(match raw {
            0x0000 => VIRTUAL_PROCESSOR_ID,
            0x0002 => POSTED_INTR_NOTIFICATION,
            0x0004 => EPTP_INDEX,
            0x0800 => GUEST_ES_SELECTOR,
            0x0802 => GUEST_CS_SELECTOR,
            0x0804 => GUEST_SS_SELECTOR,
            0x0806 => GUEST_DS_SELECTOR,
            0x0808 => GUEST_FS_SELECTOR,
            0x080A => GUEST_GS_SELECTOR,
            0x080C => GUEST_LDTR_SELECTOR,
            0x080E => GUEST_TR_SELECTOR,
            0x0810 => GUEST_INTR_STATUS,
            0x0812 => GUEST_PML_INDEX,
            0x0C00 => HOST_ES_SELECTOR,
            0x0C02 => HOST_CS_SELECTOR,
            0x0C04 => HOST_SS_SELECTOR,
            0x0C06 => HOST_DS_SELECTOR,
            0x0C08 => HOST_FS_SELECTOR,
            0x0C0A => HOST_GS_SELECTOR,
            0x0C0C => HOST_TR_SELECTOR,
            0x2000 => IO_BITMAP_A,
            0x2002 => IO_BITMAP_B,
            0x2004 => MSR_BITMAP,
            0x2006 => VM_EXIT_MSR_STORE_ADDR,
            0x2008 => VM_EXIT_MSR_LOAD_ADDR,
            0x200A => VM_ENTRY_MSR_LOAD_ADDR,
            0x200C => EXECUTIVE_VMCS_POINTER,
            0x200E => PML_ADDRESS,
            0x2010 => TSC_OFFSET,
            0x2012 => VIRTUAL_APIC_PAGE_ADDR,
            0x2014 => APIC_ACCESS_ADDR,
            0x2016 => POSTED_INTR_DESC_ADDR,
            0x2018 => VM_FUNCTION_CONTROL,
            0x201A => EPT_POINTER,
            0x201C => EOI_EXIT_BITMAP0,
            0x201E => EOI_EXIT_BITMAP1,
            0x2020 => EOI_EXIT_BITMAP2,
            0x2022 => EOI_EXIT_BITMAP3,
            0x2024 => EPTP_LIST_ADDRESS,
            0x2026 => VMREAD_BITMAP,
            0x2028 => VMWRITE_BITMAP,
            0x202A => VE_INFO_ADDRESS,
            0x202C => XSS_EXIT_BITMAP,
            0x202E => ENCLS_EXITING_BITMAP,
            0x2030 => SUB_PAGE_PERM_TABLE_PTR,
            0x2032 => TSC_MULTIPLIER,
            0x2400 => GUEST_PHYS_ADDR,
            0x2800 => VMCS_LINK_POINTER,
            0x2802 => GUEST_IA32_DEBUGCTL,
            0x2804 => GUEST_IA32_PAT,
            0x2806 => GUEST_IA32_EFER,
            0x2808 => GUEST_IA32_PERF_GLOBAL_CTRL,
            0x280A => GUEST_PDPTR0,
            0x280C => GUEST_PDPTR1,
            0x280E => GUEST_PDPTR2,
            0x2810 => GUEST_PDPTR3,
            0x2812 => GUEST_IA32_BNDCFGS,
            0x2814 => GUEST_IA32_RTIT_CTL,
            0x2C00 => HOST_IA32_PAT,
            0x2C02 => HOST_IA32_EFER,
            0x2C04 => HOST_IA32_PERF_GLOBAL_CTRL,
            0x4000 => PIN_BASED_VM_EXEC_CONTROL,
            0x4002 => CPU_BASED_VM_EXEC_CONTROL,
            0x4004 => EXCEPTION_BITMAP,
            0x4006 => PAGE_FAULT_ERROR_CODE_MASK,
            0x4008 => PAGE_FAULT_ERROR_CODE_MATCH,
            0x400A => CR3_TARGET_COUNT,
            0x400C => VM_EXIT_CONTROLS,
            0x400E => VM_EXIT_MSR_STORE_COUNT,
            0x4010 => VM_EXIT_MSR_LOAD_COUNT,
            0x4012 => VM_ENTRY_CONTROLS,
            0x4014 => VM_ENTRY_MSR_LOAD_COUNT,
            0x4016 => VM_ENTRY_INTR_INFO_FIELD,
            0x4018 => VM_ENTRY_EXCEPTION_ERROR_CODE,
            0x401A => VM_ENTRY_INSTRUCTION_LEN,
            0x401C => TPR_THRESHOLD,
            0x401E => SECONDARY_VM_EXEC_CONTROL,
            0x4020 => PLE_GAP,
            0x4022 => PLE_WINDOW,
            0x4400 => VM_INSTRUCTION_ERROR,
            0x4402 => EXIT_REASON,
            0x4404 => VM_EXIT_INTR_INFO,
            0x4406 => VM_EXIT_INTR_ERROR_CODE,
            0x4408 => IDT_VECTORING_INFO_FIELD,
            0x440A => IDT_VECTORING_ERROR_CODE,
            0x440C => VM_EXIT_INSTRUCTION_LEN,
            0x440E => VMX_INSTRUCTION_INFO,
            0x4800 => GUEST_ES_LIMIT,
            0x4802 => GUEST_CS_LIMIT,
            0x4804 => GUEST_SS_LIMIT,
            0x4806 => GUEST_DS_LIMIT,
            0x4808 => GUEST_FS_LIMIT,
            0x480A => GUEST_GS_LIMIT,
            0x480C => GUEST_LDTR_LIMIT,
            0x480E => GUEST_TR_LIMIT,
            0x4810 => GUEST_GDTR_LIMIT,
            0x4812 => GUEST_IDTR_LIMIT,
            0x4814 => GUEST_ES_AR_BYTES,
            0x4816 => GUEST_CS_AR_BYTES,
            0x4818 => GUEST_SS_AR_BYTES,
            0x481A => GUEST_DS_AR_BYTES,
            0x481C => GUEST_FS_AR_BYTES,
            0x481E => GUEST_GS_AR_BYTES,
            0x4820 => GUEST_LDTR_AR_BYTES,
            0x4822 => GUEST_TR_AR_BYTES,
            0x4824 => GUEST_INTERRUPTIBILITY_INFO,
            0x4826 => GUEST_ACTIVITY_STATE,
            0x4828 => GUEST_SMBASE,
            0x482A => GUEST_IA32_SYSENTER_CS,
            0x482E => VMX_PREEMPTION_TIMER_VALUE,
            0x4C00 => HOST_IA32_SYSENTER_CS,
            0x6000 => CR0_GUEST_HOST_MASK,
            0x6002 => CR4_GUEST_HOST_MASK,
            0x6004 => CR0_READ_SHADOW,
            0x6006 => CR4_READ_SHADOW,
            0x6008 => CR3_TARGET_VALUE0,
            0x600A => CR3_TARGET_VALUE1,
            0x600C => CR3_TARGET_VALUE2,
            0x600E => CR3_TARGET_VALUE3,
            0x6400 => EXIT_QUALIFICATION,
            0x6402 => IO_RCX,
            0x6404 => IO_RSI,
            0x6406 => IO_RDI,
            0x6408 => IO_RIP,
            0x640A => GUEST_LINEAR_ADDR,
            0x6800 => GUEST_CR0,
            0x6802 => GUEST_CR3,
            0x6804 => GUEST_CR4,
            0x6806 => GUEST_ES_BASE,
            0x6808 => GUEST_CS_BASE,
            0x680A => GUEST_SS_BASE,
            0x680C => GUEST_DS_BASE,
            0x680E => GUEST_FS_BASE,
            0x6810 => GUEST_GS_BASE,
            0x6812 => GUEST_LDTR_BASE,
            0x6814 => GUEST_TR_BASE,
            0x6816 => GUEST_GDTR_BASE,
            0x6818 => GUEST_IDTR_BASE,
            0x681A => GUEST_DR7,
            0x681C => GUEST_RSP,
            0x681E => GUEST_RIP,
            0x6820 => GUEST_RFLAGS,
            0x6822 => GUEST_PENDING_DBG_EXCEPTIONS,
            0x6824 => GUEST_IA32_SYSENTER_ESP,
            0x6826 => GUEST_IA32_SYSENTER_EIP,
            0x6828 => GUEST_RAX,
            0x682A => GUEST_RBX,
            0x682C => GUEST_RCX,
            0x682E => GUEST_RDX,
            0x6830 => GUEST_RSI,
            0x6832 => GUEST_RDI,
            0x6834 => GUEST_RBP,
            0x6836 => GUEST_R8,
            0x6838 => GUEST_R9,
            0x683A => GUEST_R10,
            0x683C => GUEST_R11,
            0x683E => GUEST_R12,
            0x6840 => GUEST_R13,
            0x6842 => GUEST_R14,
            0x6844 => GUEST_R15,
            0x6C00 => HOST_CR0,
            0x6C02 => HOST_CR3,
            0x6C04 => HOST_CR4,
            0x6C06 => HOST_FS_BASE,
            0x6C08 => HOST_GS_BASE,
            0x6C0A => HOST_TR_BASE,
            0x6C0C => HOST_GDTR_BASE,
            0x6C0E => HOST_IDTR_BASE,
            0x6C10 => HOST_IA32_SYSENTER_ESP,
            0x6C12 => HOST_IA32_SYSENTER_EIP,
            0x6C14 => HOST_RSP,
            0x6C16 => HOST_RIP,
            _ => return None,
        })
    }
}

/// AMD64 APM Vol. 2 VMCB byte offsets, control area and save-state area.
pub mod vmcb_offset {
    pub const INTERCEPT_CR_READ: usize = 0x000;
    pub const INTERCEPT_CR_WRITE: usize = 0x002;
    pub const INTERCEPT_DR_READ: usize = 0x004;
    pub const INTERCEPT_DR_WRITE: usize = 0x006;
    pub const INTERCEPT_EXCEPTION: usize = 0x008;
    pub const INTERCEPT_INSTR1: usize = 0x00C;
    pub const INTERCEPT_INSTR2: usize = 0x010;
    pub const INTERCEPT_INSTR3: usize = 0x014;
    pub const PAUSE_FILTER_THRESHOLD: usize = 0x03C;
    pub const PAUSE_FILTER_COUNT: usize = 0x03E;
    pub const IOPM_BASE_PA: usize = 0x040;
    pub const MSRPM_BASE_PA: usize = 0x048;
    pub const TSC_OFFSET: usize = 0x050;
    pub const GUEST_ASID: usize = 0x058;
    pub const TLB_CONTROL: usize = 0x05C;
    pub const VINTR: usize = 0x060;
    pub const INTERRUPT_SHADOW: usize = 0x068;
    pub const EXITCODE: usize = 0x070;
    pub const EXITINFO1: usize = 0x078;
    pub const EXITINFO2: usize = 0x080;
    pub const EXITINTINFO: usize = 0x088;
    pub const NP_ENABLE: usize = 0x090;
    pub const AVIC_APIC_BAR: usize = 0x098;
    pub const GHCB_PA: usize = 0x0A0;
    pub const EVENTINJ: usize = 0x0A8;
    pub const N_CR3: usize = 0x0B0;
    pub const LBR_VIRTUALIZATION_ENABLE: usize = 0x0B8;
    pub const VMCB_CLEAN: usize = 0x0C0;
    pub const NRIP: usize = 0x0C8;

    pub const GUEST_ES_SELECTOR: usize = 0x400;
    pub const GUEST_ES_ATTRIB: usize = 0x402;
    pub const GUEST_ES_LIMIT: usize = 0x404;
    pub const GUEST_ES_BASE: usize = 0x408;

    pub const GUEST_CS_SELECTOR: usize = 0x410;
    pub const GUEST_CS_ATTRIB: usize = 0x412;
    pub const GUEST_CS_LIMIT: usize = 0x414;
    pub const GUEST_CS_BASE: usize = 0x418;

    pub const GUEST_SS_SELECTOR: usize = 0x420;
    pub const GUEST_SS_ATTRIB: usize = 0x422;
    pub const GUEST_SS_LIMIT: usize = 0x424;
    pub const GUEST_SS_BASE: usize = 0x428;

    pub const GUEST_DS_SELECTOR: usize = 0x430;
    pub const GUEST_DS_ATTRIB: usize = 0x432;
    pub const GUEST_DS_LIMIT: usize = 0x434;
    pub const GUEST_DS_BASE: usize = 0x438;

    pub const GUEST_GDTR_LIMIT: usize = 0x464;
    pub const GUEST_GDTR_BASE: usize = 0x468;
    pub const GUEST_IDTR_LIMIT: usize = 0x484;
    pub const GUEST_IDTR_BASE: usize = 0x488;

    pub const GUEST_CR0: usize = 0x500;
    pub const GUEST_CR2: usize = 0x508;
    pub const GUEST_CR3: usize = 0x510;
    pub const GUEST_CR4: usize = 0x518;
    pub const GUEST_DR6: usize = 0x520;
    pub const GUEST_DR7: usize = 0x528;
    pub const GUEST_RFLAGS: usize = 0x530;
    pub const GUEST_RIP: usize = 0x538;
    pub const GUEST_RSP: usize = 0x5D8;
    pub const GUEST_RAX: usize = 0x5F8;

    pub const VMCB_SIZE: usize = 0x1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vmcs_field_encodings_match_sdm() {
        assert_eq!(VmcsField::GUEST_RIP as u32, 0x681E);
        assert_eq!(VmcsField::HOST_RIP as u32, 0x6C16);
        assert_eq!(VmcsField::EXIT_REASON as u32, 0x4402);
    }

    #[test]
    fn vmcb_offsets_fit_one_page() {
        assert!(vmcb_offset::GUEST_RAX < vmcb_offset::VMCB_SIZE);
    }

    #[test]
    fn from_raw_round_trips_known_fields() {
        assert_eq!(VmcsField::from_raw(0x681E), Some(VmcsField::GUEST_RIP));
        assert_eq!(VmcsField::from_raw(0xFFFF), None);
    }
}
