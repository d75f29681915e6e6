#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Wires `hvmk-hal`, `hvmk-x86_64`, and `hvmk-core` together and exposes the
//! two entry points a boot shim calls: [`boot_pp`] (never returns) and
//! [`core`], the lower-level accessor tests use to drive a PP's loop by
//! hand.
//!
//! The boot shim, the physical allocator behind `page_pool`/`huge_pool`/
//! `heap_pool`, and mapping the extension's code window into the address
//! space are all external collaborators per spec.md §1 — this crate assumes
//! `EXT_CODE_ADDR..EXT_CODE_ADDR+EXT_CODE_SIZE` is already mapped
//! read/write/exec before `boot_pp` is called, the same way it assumes the
//! caller already did the VT-x/SVM enable sequence.

use hvmk_core::config::{EXT_CODE_ADDR, EXT_CODE_SIZE};
use hvmk_core::exec_loop::{ExecLoop, Halted};
use hvmk_core::{arch_ctx, elf_loader, error::Error, ext, tls};
use hvmk_hal::{ExtId, PpId};

#[cfg(feature = "x86_64")]
pub use hvmk_x86_64::{NativeCallbackHook, VendorExtension, X86Intrinsics};

#[cfg(feature = "x86_64")]
use hvmk_hal::{ArchIntrinsics, CallbackHook, HeapPool, HugePool, PagePool};

/// Parses `image`, copies its `PT_LOAD` segments into the extension's fixed
/// code window, relocates it in place, registers it as the one extension
/// this build hosts, and calls its ELF entry point once so it can register
/// its bootstrap/vmexit/fail callbacks via `callback_op` before
/// [`boot_pp`] starts driving them.
///
/// # Safety
/// `EXT_CODE_ADDR..EXT_CODE_ADDR+EXT_CODE_SIZE` must already be mapped
/// read/write/exec in the current address space; every segment's
/// `phys_addr` (`load_base + mem_offset`, `load_base == EXT_CODE_ADDR`)
/// must land inside that window, which the caller — not the loader — is
/// responsible for sizing `image` to respect.
pub unsafe fn load_extension(image: &[u8]) -> Result<ExtId, Error> {
    let module = elf_loader::Module::parse(image, EXT_CODE_ADDR)?;
    let entry = module.entry();

    for seg in module.segments() {
        let filesz = seg.filesz as usize;
        let memsz = seg.memsz as usize;
        let src = &image[seg.file_offset as usize..][..filesz];
        // SAFETY: per this function's contract, `seg.phys_addr` lies inside
        // the already-mapped extension code window.
        unsafe {
            let dst = seg.phys_addr as *mut u8;
            ::core::ptr::copy_nonoverlapping(src.as_ptr(), dst, filesz);
            if memsz > filesz {
                ::core::ptr::write_bytes(dst.add(filesz), 0, memsz - filesz);
            }
        }
    }

    let modules = [module];
    elf_loader::relocate_x86_64(&modules, 0, &mut |addr, value| {
        // SAFETY: `addr` is `load_base + r_offset` inside the same mapped
        // window as the segment copies above.
        unsafe { ::core::ptr::write_unaligned(addr as *mut u64, value) };
    })?;

    let id = ext::create(EXT_CODE_ADDR, EXT_CODE_SIZE)?;
    // The ELF entry point is a plain call, not one of the three tracked
    // callbacks; it runs once to let the extension register them and its
    // return value carries no meaning to the run loop.
    let _ = arch_ctx::callback_hook().invoke(entry, id.get() as u64, 0);
    Ok(id)
}

/// Boots physical processor `pp`: installs the architecture/collaborator
/// seam, bootstraps this PP's root VM/VP/VS triple, loads and registers
/// `ext_image`, then drives the extension's [`ExecLoop`] until it halts.
///
/// Only meaningful against the real VMX/SVM backend, hence gated the same
/// way that backend is.
///
/// # Safety
/// Must run at most once per PP, on the PP it names, with VT-x/SVM already
/// enabled and the extension code window already mapped (see
/// [`load_extension`]).
#[cfg(feature = "x86_64")]
pub unsafe fn boot_pp(
    pp: PpId,
    intrinsics: &'static dyn ArchIntrinsics,
    page_pool: &'static dyn PagePool,
    huge_pool: &'static dyn HugePool,
    heap_pool: &'static dyn HeapPool,
    callback_hook: &'static dyn CallbackHook,
    vendor: VendorExtension,
    ext_image: &[u8],
) -> ! {
    arch_ctx::init(intrinsics, page_pool, huge_pool, heap_pool, callback_hook, vendor);
    hvmk_core::bootstrap_pp(pp).expect("bootstrap_pp");
    // SAFETY: forwarded from this function's own contract.
    let ext_id = unsafe { load_extension(ext_image) }.expect("load_extension");

    // SAFETY: this is the one call into `core()` for the PP this function
    // was told to boot; nothing else on this PP races it.
    let mut loop_ = unsafe { core(pp, ext_id) };
    loop {
        match loop_.run() {
            Halted::Waiting => continue,
            Halted::Exit | Halted::Fault => break,
        }
    }
    loop {
        ::core::hint::spin_loop();
    }
}

/// Lower-level accessor: builds the [`ExecLoop`] for `pp` driving `ext`
/// without looping forever. Used by tests and by [`boot_pp`] itself.
///
/// # Safety
/// Caller must be running on physical processor `pp`.
pub unsafe fn core(pp: PpId, ext: ExtId) -> ExecLoop {
    let who = unsafe { tls::CurrentPp::new(pp) };
    ExecLoop::new(who, ext)
}
