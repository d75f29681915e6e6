#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! The hvmk core: the capability-object model (VM/VP/VS/EXT), the syscall
//! dispatcher that the extension drives it through, the ELF loader that
//! stages the extension's image, and the per-PP execution loop. Everything
//! privileged lives behind `hvmk_hal` traits wired up through [`arch_ctx`];
//! this crate touches no hardware directly and schedules nothing.
//!
//! Ground: `zerovisor-core`'s module-per-subsystem layout, narrowed to the
//! subsystems spec.md names as "the core" — the boot shim, the physical
//! allocator's implementation, and device/guest policy stay out, reached
//! only through the `page_pool`/`huge_pool`/`heap_pool`/`ArchIntrinsics`/
//! `CallbackHook` seams.

extern crate alloc;

pub mod arch_ctx;
pub mod capability_table;
pub mod config;
pub mod elf_loader;
pub mod error;
pub mod exec_loop;
pub mod ext;
pub mod log;
pub mod mem_op;
pub mod syscall;
pub mod tls;
pub mod vm;
pub mod vmexit_log;
pub mod vp;
pub mod vs_engine;

pub use error::Error;

use hvmk_hal::{PpId, VmId, VpId, VsId};

/// Creates this PP's share of bootstrap state: the root VM if it does not
/// already exist (shared by every PP), a VP under it, and this PP's root VS
/// (spec.md §3: "VM 0 is the root VM... created implicitly at bootstrap";
/// "a root VS is a VS whose `id` equals the `pp_id`... created at
/// bootstrap"). Called once per PP by the boot entry point before
/// constructing that PP's [`exec_loop::ExecLoop`].
pub fn bootstrap_pp(pp: PpId) -> Result<(VmId, VpId, VsId), Error> {
    if !vm::is_allocated(vm::ROOT_VM_ID) {
        vm::init_root()?;
    }
    let vp = vp::create(vm::ROOT_VM_ID)?;
    let vs = vs_engine::create_root(pp, vp)?;
    vs_engine::init_as_root(vs)?;
    Ok((vm::ROOT_VM_ID, vp, vs))
}
