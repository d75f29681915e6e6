//! Crate-wide error enum. Every component keeps its own closed error enum;
//! this is only the type `syscall_dispatch` flattens them into before
//! mapping to the wire-level `Status`.
//!
//! Ground: the `ZerovisorError`/`From<VmError>` pattern in
//! `zerovisor-core/src/vm.rs`.

use crate::capability_table::TableError;
use crate::elf_loader::ElfError;
use crate::ext::ExtError;
use crate::vs_engine::VsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Table(TableError),
    Elf(ElfError),
    Vs(VsError),
    Ext(ExtError),
    InvalidHandle,
    PermDenied,
    Unsupported,
    InvalidInput(u8),
    Unknown,
}

impl From<TableError> for Error {
    fn from(e: TableError) -> Self {
        Error::Table(e)
    }
}

impl From<ElfError> for Error {
    fn from(e: ElfError) -> Self {
        Error::Elf(e)
    }
}

impl From<VsError> for Error {
    fn from(e: VsError) -> Self {
        Error::Vs(e)
    }
}

impl From<ExtError> for Error {
    fn from(e: ExtError) -> Self {
        Error::Ext(e)
    }
}
