//! Whole-syscall-surface coverage: an extension driving a PP's exec loop
//! from a cold boot, two extensions contending over `vm_op`, capability
//! destroy ordering, lazy VS migration across two PPs, the direct-map
//! memory syscalls, and an ELF image with a relocation nothing defines.
//!
//! Every scenario here goes through `syscall::dispatch` rather than calling
//! component functions directly, the way an extension would actually reach
//! this crate.

use hvmk_core::config::{EXT_CODE_ADDR, EXT_DIRECT_MAP_ADDR};
use hvmk_core::exec_loop::{ExecLoop, Halted};
use hvmk_core::ext::{self, CallbackKind};
use hvmk_core::syscall::{self, Family};
use hvmk_core::tls::{self, CurrentPp, SyscallRegs};
use hvmk_core::{arch_ctx, elf_loader, vp, vs_engine};
use hvmk_hal::{ExtId, PpId, Status, Verdict, VpId, VsId};

/// `MAX_EXTENSIONS` is 2 and the scripted callback hook `init_sim` installs
/// is a single process-wide instance; every test that touches either is
/// serialised so the default parallel runner can't interleave two
/// scenarios over the same handles.
static LOCK: spin::Mutex<()> = spin::Mutex::new(());

fn regs(who: CurrentPp) -> &'static mut SyscallRegs {
    &mut tls::per_cpu().get(who).regs
}

fn setup(pp: u16) -> CurrentPp {
    arch_ctx::init_sim();
    unsafe { CurrentPp::new(PpId::new(pp)) }
}

/// Opens a fresh extension's handle the way `handle_op.open_handle` expects
/// to be called: raw `ExtId` in, cookie out.
fn open(who: CurrentPp) -> (ExtId, u64) {
    let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
    regs(who).ext_reg0 = id.get() as u64;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Handle, 0)), Status::Success);
    (id, regs(who).ext_reg1)
}

fn close_and_destroy(id: ExtId, cookie: u64) {
    ext::close_handle(id, cookie).unwrap();
    ext::destroy(id).unwrap();
}

#[test]
fn bootstrap_root_vm_through_exec_loop() {
    let _guard = LOCK.lock();
    let who = setup(0);
    let (id, cookie) = open(who);
    ext::register_callback(id, CallbackKind::Bootstrap, EXT_CODE_ADDR).unwrap();
    arch_ctx::scripted_callback_hook().push(Verdict::Exit);

    let mut loop_ = ExecLoop::new(who, id);
    assert_eq!(loop_.run(), Halted::Exit);
    assert!(ext::get(id).unwrap().is_started());

    close_and_destroy(id, cookie);
}

#[test]
fn vm_op_denied_without_vmexit_registration() {
    let _guard = LOCK.lock();
    let who = setup(1);
    let (vmexit_id, vmexit_cookie) = open(who);
    ext::register_callback(vmexit_id, CallbackKind::Vmexit, EXT_CODE_ADDR).unwrap();
    let (plain_id, plain_cookie) = open(who);

    regs(who).ext_reg0 = plain_cookie;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 0)), Status::InvalidPermDenied);

    regs(who).ext_reg0 = vmexit_cookie;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 0)), Status::Success);
    let vmid = regs(who).ext_reg1;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 1)), Status::Success);

    close_and_destroy(plain_id, plain_cookie);
    close_and_destroy(vmexit_id, vmexit_cookie);
    let _ = vmid;
}

#[test]
fn destroy_ordering_through_syscalls() {
    let _guard = LOCK.lock();
    let who = setup(2);
    let (id, cookie) = open(who);
    ext::register_callback(id, CallbackKind::Vmexit, EXT_CODE_ADDR).unwrap();
    regs(who).ext_reg0 = cookie;

    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 0)), Status::Success);
    let vmid = regs(who).ext_reg1;

    regs(who).ext_reg1 = vmid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vp, 0)), Status::Success);
    let vpid = regs(who).ext_reg2;

    // The VM still has a VP attached.
    regs(who).ext_reg1 = vmid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 1)), Status::FailureUnknown);

    regs(who).ext_reg1 = vpid;
    regs(who).ext_reg2 = 6; // arbitrary PP, assigned on first use only by vs.run.
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vs, 0)), Status::Success);
    let vsid = regs(who).ext_reg3;

    // The VP still has a VS attached.
    regs(who).ext_reg1 = vpid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vp, 1)), Status::FailureUnknown);

    // Destroy in the only order the capability model allows: VS, then VP,
    // then VM.
    regs(who).ext_reg1 = vsid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vs, 1)), Status::Success);
    regs(who).ext_reg1 = vpid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vp, 1)), Status::Success);
    regs(who).ext_reg1 = vmid;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Vm, 1)), Status::Success);

    close_and_destroy(id, cookie);
}

#[test]
fn lazy_vs_migration_through_syscalls() {
    let _guard = LOCK.lock();
    let pp_a = setup(3);
    let pp_b = unsafe { CurrentPp::new(PpId::new(4)) };

    let (id, cookie) = open(pp_a);
    ext::register_callback(id, CallbackKind::Vmexit, EXT_CODE_ADDR).unwrap();
    regs(pp_a).ext_reg0 = cookie;

    assert_eq!(syscall::dispatch(pp_a, syscall::pack(Family::Vm, 0)), Status::Success);
    let vmid = regs(pp_a).ext_reg1;

    regs(pp_a).ext_reg1 = vmid;
    assert_eq!(syscall::dispatch(pp_a, syscall::pack(Family::Vp, 0)), Status::Success);
    let vpid = regs(pp_a).ext_reg2;

    regs(pp_a).ext_reg1 = vpid;
    regs(pp_a).ext_reg2 = pp_a.pp().get() as u64;
    assert_eq!(syscall::dispatch(pp_a, syscall::pack(Family::Vs, 0)), Status::Success);
    let vsid = regs(pp_a).ext_reg3;

    // First `run` assigns the VP (and therefore the VS) to PP 3.
    regs(pp_a).ext_reg1 = vmid;
    regs(pp_a).ext_reg2 = vpid;
    regs(pp_a).ext_reg3 = vsid;
    assert_eq!(syscall::dispatch(pp_a, syscall::pack(Family::Vs, 5)), Status::Success);
    assert_eq!(vs_engine::get(VsId::new(vsid as u16)).unwrap().assigned_pp(), pp_a.pp());
    assert!(vs_engine::get(VsId::new(vsid as u16)).unwrap().launched());

    // An operator migrates the VP to PP 4; the next `run` from there must
    // clear and re-home the VS rather than reuse stale VMCS/VMCB state.
    unsafe { vp::get_mut(VpId::new(vpid as u16)) }.unwrap().migrate(pp_b.pp());

    regs(pp_b).ext_reg0 = cookie;
    regs(pp_b).ext_reg1 = vmid;
    regs(pp_b).ext_reg2 = vpid;
    regs(pp_b).ext_reg3 = vsid;
    assert_eq!(syscall::dispatch(pp_b, syscall::pack(Family::Vs, 5)), Status::Success);
    assert_eq!(vs_engine::get(VsId::new(vsid as u16)).unwrap().assigned_pp(), pp_b.pp());

    // A VS that has been run is active on its PP for good: there is no
    // syscall to deactivate it short of migrating the triple again, so this
    // scenario intentionally leaves the VM/VP/VS allocated rather than
    // exercising an unsupported teardown path.
    close_and_destroy(id, cookie);
}

#[test]
fn direct_map_alloc_free_round_trips() {
    let _guard = LOCK.lock();
    let who = setup(5);
    let (id, cookie) = open(who);
    regs(who).ext_reg0 = cookie;

    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Mem, 0)), Status::Success);
    let page_virt = regs(who).ext_reg1;
    assert!(page_virt >= EXT_DIRECT_MAP_ADDR);
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Mem, 1)), Status::Success);

    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Mem, 2)), Status::Success);
    let huge_virt = regs(who).ext_reg1;
    assert!(huge_virt >= EXT_DIRECT_MAP_ADDR);
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Mem, 3)), Status::Success);

    regs(who).ext_reg1 = 64;
    regs(who).ext_reg2 = 16;
    assert_eq!(syscall::dispatch(who, syscall::pack(Family::Mem, 4)), Status::Success);
    let heap_virt = regs(who).ext_reg3;
    assert!(heap_virt >= EXT_DIRECT_MAP_ADDR);

    close_and_destroy(id, cookie);
}

// --- Scenario 6: an ELF image whose one relocation resolves against no one. ---

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const DYN_SIZE: usize = 16;
const SYM_SIZE: usize = 24;
const RELA_SIZE: usize = 24;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PF_R: u32 = 4;
const PF_X: u32 = 1;
const DT_SYMTAB: i64 = 6;
const DT_STRTAB: i64 = 5;
const DT_RELA: i64 = 7;
const DT_NULL: i64 = 0;
const R_X86_64_GLOB_DAT: u64 = 6;

fn put(buf: &mut [u8], off: usize, bytes: &[u8]) {
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}

/// Hand-assembles the raw byte layout `elf_loader`'s `#[repr(C)]` structs
/// encode (their definitions are private to that module, so only the
/// byte-slice surface `Module::parse` exposes is reachable from here): one
/// `PT_LOAD` segment, a `PT_DYNAMIC` segment with exactly one `DT_RELA`
/// entry whose `R_X86_64_GLOB_DAT` relocation names a symbol this, the
/// image's only module, trivially can't resolve against any *other*
/// module — `resolve_global` skips `this` by construction, so a one-module
/// relocation list always misses.
fn build_unresolvable_dyn_image() -> std::vec::Vec<u8> {
    const PHDR0_OFF: usize = EHDR_SIZE;
    const PHDR1_OFF: usize = PHDR0_OFF + PHDR_SIZE;
    const DYN_OFF: usize = PHDR1_OFF + PHDR_SIZE;
    const DYN_COUNT: usize = 4;
    const DYN_BYTES: usize = DYN_COUNT * DYN_SIZE;
    const SYM_OFF: usize = DYN_OFF + DYN_BYTES;
    const STRTAB_OFF: usize = SYM_OFF + SYM_SIZE;
    const RELA_OFF: usize = STRTAB_OFF;
    const TOTAL: usize = RELA_OFF + 2 * RELA_SIZE;

    let mut image = vec![0u8; TOTAL];

    // Elf64Ehdr
    put(&mut image, 0, &[0x7f, b'E', b'L', b'F']);
    image[4] = 2; // ELFCLASS64
    image[5] = 1; // ELFDATA2LSB
    put(&mut image, 16, &3u16.to_le_bytes()); // e_type = ET_DYN
    put(&mut image, 18, &62u16.to_le_bytes()); // e_machine = EM_X86_64
    put(&mut image, 20, &1u32.to_le_bytes()); // e_version
    put(&mut image, 24, &0u64.to_le_bytes()); // e_entry
    put(&mut image, 32, &(PHDR0_OFF as u64).to_le_bytes()); // e_phoff
    put(&mut image, 40, &0u64.to_le_bytes()); // e_shoff
    put(&mut image, 48, &0u32.to_le_bytes()); // e_flags
    put(&mut image, 52, &(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    put(&mut image, 54, &(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    put(&mut image, 56, &2u16.to_le_bytes()); // e_phnum
    put(&mut image, 58, &0u16.to_le_bytes()); // e_shentsize
    put(&mut image, 60, &0u16.to_le_bytes()); // e_shnum
    put(&mut image, 62, &0u16.to_le_bytes()); // e_shstrndx

    // Elf64Phdr[0]: PT_LOAD, empty.
    put(&mut image, PHDR0_OFF, &PT_LOAD.to_le_bytes());
    put(&mut image, PHDR0_OFF + 4, &(PF_R | PF_X).to_le_bytes());
    put(&mut image, PHDR0_OFF + 8, &0u64.to_le_bytes()); // p_offset
    put(&mut image, PHDR0_OFF + 16, &0u64.to_le_bytes()); // p_vaddr
    put(&mut image, PHDR0_OFF + 24, &0u64.to_le_bytes()); // p_paddr
    put(&mut image, PHDR0_OFF + 32, &0u64.to_le_bytes()); // p_filesz
    put(&mut image, PHDR0_OFF + 40, &0u64.to_le_bytes()); // p_memsz
    put(&mut image, PHDR0_OFF + 48, &0x1000u64.to_le_bytes()); // p_align

    // Elf64Phdr[1]: PT_DYNAMIC.
    put(&mut image, PHDR1_OFF, &PT_DYNAMIC.to_le_bytes());
    put(&mut image, PHDR1_OFF + 4, &PF_R.to_le_bytes());
    put(&mut image, PHDR1_OFF + 8, &(DYN_OFF as u64).to_le_bytes()); // p_offset
    put(&mut image, PHDR1_OFF + 16, &(DYN_OFF as u64).to_le_bytes()); // p_vaddr
    put(&mut image, PHDR1_OFF + 24, &(DYN_OFF as u64).to_le_bytes()); // p_paddr
    put(&mut image, PHDR1_OFF + 32, &(DYN_BYTES as u64).to_le_bytes()); // p_filesz
    put(&mut image, PHDR1_OFF + 40, &(DYN_BYTES as u64).to_le_bytes()); // p_memsz
    put(&mut image, PHDR1_OFF + 48, &8u64.to_le_bytes()); // p_align

    // Dynamic tags.
    let dyn_entry = |tag: i64, val: u64| -> [u8; DYN_SIZE] {
        let mut e = [0u8; DYN_SIZE];
        e[0..8].copy_from_slice(&tag.to_le_bytes());
        e[8..16].copy_from_slice(&val.to_le_bytes());
        e
    };
    put(&mut image, DYN_OFF, &dyn_entry(DT_SYMTAB, SYM_OFF as u64));
    put(&mut image, DYN_OFF + DYN_SIZE, &dyn_entry(DT_STRTAB, STRTAB_OFF as u64));
    put(&mut image, DYN_OFF + 2 * DYN_SIZE, &dyn_entry(DT_RELA, RELA_OFF as u64));
    put(&mut image, DYN_OFF + 3 * DYN_SIZE, &dyn_entry(DT_NULL, 0));

    // One symbol table entry, index 0, all-zero (name/value are irrelevant
    // — `resolve_global` never gets far enough to read them).
    // (image already zero-initialised at SYM_OFF..SYM_OFF+SYM_SIZE.)

    // One relocation: GLOB_DAT against symbol index 0, then a zero
    // sentinel entry to stop `relocate_x86_64`'s scan.
    let rela_entry = |offset: u64, info: u64, addend: i64| -> [u8; RELA_SIZE] {
        let mut e = [0u8; RELA_SIZE];
        e[0..8].copy_from_slice(&offset.to_le_bytes());
        e[8..16].copy_from_slice(&info.to_le_bytes());
        e[16..24].copy_from_slice(&addend.to_le_bytes());
        e
    };
    put(&mut image, RELA_OFF, &rela_entry(0x2000, R_X86_64_GLOB_DAT, 0));
    put(&mut image, RELA_OFF + RELA_SIZE, &rela_entry(0, 0, 0));

    image
}

#[test]
fn elf_relocation_against_undefined_symbol_is_rejected() {
    let image = build_unresolvable_dyn_image();
    let module = elf_loader::Module::parse(&image, 0).unwrap();
    let modules = [module];
    let result = elf_loader::relocate_x86_64(&modules, 0, &mut |_, _| {
        panic!("no relocation should be written once resolution fails")
    });
    assert_eq!(result, Err(elf_loader::ElfError::NoSuchSymbol));
}
