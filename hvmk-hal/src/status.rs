//! The `bf_status_t`-equivalent wire status returned to the extension from
//! every syscall (spec.md §6).

/// Status taxonomy returned by the syscall dispatcher. Never constructed by
/// any component other than `syscall_dispatch` — components return their own
/// closed error enums and the dispatcher is the single place that knows how
/// to flatten them into this wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Status {
    Success = 0,
    FailureUnknown = 1,
    FailureInvalidHandle = 2,
    FailureUnsupported = 3,
    InvalidPermDenied = 4,
    InvalidInputReg1 = 5,
    InvalidInputReg2 = 6,
    InvalidInputReg3 = 7,
    InvalidInputReg4 = 8,
    InvalidInputReg5 = 9,
}

impl Status {
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self as u64
    }
}
