//! ELF64 loader (spec.md §4.2): parses a statically-linked dynamic or
//! executable image, reports `PT_LOAD` segments without allocating memory
//! itself, and resolves relocations across a small set of loaded modules.
//!
//! Ground: `examples/original_source/bfutil/include/bfelf_loader.h`
//! (`bfelf_file_t`, the hash-table symbol lookup, `private_relocate_symbol`)
//! for exact semantics; struct layout and parsing style follow
//! `amoljassal-sis-kernel-showcase`'s `process::exec::elf` loader.

use crate::config::{BFELF_MAX_NEEDED, BFELF_MAX_SEGMENTS, MAX_NUM_MODULES};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EM_X86_64: u16 = 62;
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;

const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

const DT_NULL: i64 = 0;
const DT_NEEDED: i64 = 1;
const DT_HASH: i64 = 4;
const DT_STRTAB: i64 = 5;
const DT_SYMTAB: i64 = 6;
const DT_RELA: i64 = 7;
const DT_INIT: i64 = 12;
const DT_FINI: i64 = 13;
const DT_INIT_ARRAY: i64 = 25;
const DT_FINI_ARRAY: i64 = 26;

const STN_UNDEF: u32 = 0;
const STB_WEAK: u8 = 2;

const R_X86_64_RELATIVE: u32 = 8;
const R_X86_64_GLOB_DAT: u32 = 6;
const R_X86_64_JUMP_SLOT: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    InvalidSignature,
    UnsupportedFile,
    InvalidFile,
    InvalidIndex,
    LoaderFull,
    NoSuchSymbol,
    UnsupportedRelocation,
    OutOfMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPerm {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadInstruction {
    pub perm: SegmentPerm,
    pub mem_offset: u64,
    pub file_offset: u64,
    pub memsz: u64,
    pub filesz: u64,
    pub phys_addr: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SectionRefs {
    pub eh_frame: Option<(u64, u64)>,
    pub ctors: Option<(u64, u64)>,
    pub dtors: Option<(u64, u64)>,
    pub notes: Option<(u64, u64)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DynamicInfo {
    hash: u64,
    strtab: u64,
    symtab: u64,
    rela: u64,
    rela_count: u64,
    init: Option<u64>,
    fini: Option<u64>,
    init_array: Option<(u64, u64)>,
    fini_array: Option<(u64, u64)>,
}

/// A fully parsed module: its load instructions and the dynamic linking
/// data needed to resolve symbols against sibling modules.
pub struct Module<'a> {
    image: &'a [u8],
    segments: [Option<LoadInstruction>; BFELF_MAX_SEGMENTS],
    segment_count: usize,
    needed: [Option<u64>; BFELF_MAX_NEEDED],
    needed_count: usize,
    dynamic: Option<DynamicInfo>,
    entry: u64,
    load_base: u64,
    /// Total memory footprint of every `PT_LOAD` segment, i.e. the last
    /// segment's `p_paddr + p_memsz` minus the first segment's `p_paddr`
    /// (spec.md §4.2, "reports total memory size"). Zero if the image has
    /// no loadable segments.
    total_memsz: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: u32,
    p_offset: u64,
    p_vaddr: u64,
    p_paddr: u64,
    p_filesz: u64,
    p_memsz: u64,
    p_align: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Shdr {
    sh_name: u32,
    sh_type: u32,
    sh_flags: u64,
    sh_addr: u64,
    sh_offset: u64,
    sh_size: u64,
    sh_link: u32,
    sh_info: u32,
    sh_addralign: u64,
    sh_entsize: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Dyn {
    d_tag: i64,
    d_val: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Sym {
    st_name: u32,
    st_info: u8,
    st_other: u8,
    st_shndx: u16,
    st_value: u64,
    st_size: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Elf64Rela {
    r_offset: u64,
    r_info: u64,
    r_addend: i64,
}

fn read_struct<T: Copy>(image: &[u8], offset: usize) -> Result<T, ElfError> {
    let size = core::mem::size_of::<T>();
    if offset.checked_add(size).ok_or(ElfError::InvalidFile)? > image.len() {
        return Err(ElfError::InvalidFile);
    }
    // SAFETY: bounds checked above; every struct here is a `#[repr(C)]`
    // POD with no padding-sensitive invariants, matching raw ELF bytes.
    Ok(unsafe { core::ptr::read_unaligned(image.as_ptr().add(offset) as *const T) })
}

fn cstr_at(strtab: &[u8], offset: usize) -> &[u8] {
    let end = strtab[offset..].iter().position(|&b| b == 0).map(|p| offset + p).unwrap_or(strtab.len());
    &strtab[offset..end]
}

/// Rolling ELF "PJW" hash: 4-bit shift with high-nibble fold.
fn pjw_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in name {
        h = (h << 4).wrapping_add(b as u32);
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
        }
        h &= !g;
    }
    h
}

impl<'a> Module<'a> {
    /// Parses `image`, validating the header and walking program headers
    /// into load instructions and (if present) the `PT_DYNAMIC` tags.
    pub fn parse(image: &'a [u8], load_base: u64) -> Result<Self, ElfError> {
        let ehdr: Elf64Ehdr = read_struct(image, 0)?;
        if ehdr.e_ident[0..4] != ELF_MAGIC {
            return Err(ElfError::InvalidSignature);
        }
        if ehdr.e_ident[4] != ELFCLASS64 || ehdr.e_ident[5] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedFile);
        }
        if ehdr.e_machine != EM_X86_64 {
            return Err(ElfError::UnsupportedFile);
        }
        if ehdr.e_type != ET_EXEC && ehdr.e_type != ET_DYN {
            return Err(ElfError::UnsupportedFile);
        }
        if ehdr.e_flags != 0 {
            return Err(ElfError::UnsupportedFile);
        }
        if ehdr.e_phnum == 0 {
            return Err(ElfError::InvalidFile);
        }

        let mut segments: [Option<LoadInstruction>; BFELF_MAX_SEGMENTS] = [None; BFELF_MAX_SEGMENTS];
        let mut segment_count = 0usize;
        let mut dynamic_off = None;
        let mut dynamic_size = 0u64;

        // `start_addr` is the first loadable segment's `p_paddr`; every
        // segment's `mem_offset` is relative to it, matching the original's
        // `private_process_segments` (`ef->start_addr =
        // loadable_segments[0]->p_paddr`, `mem_offset = p_paddr -
        // start_addr`) rather than `p_vaddr`, which may not even be
        // monotonic with `p_paddr` for a statically-relocated image.
        let mut start_addr: Option<u64> = None;
        let mut memsz_high_water = 0u64;

        for i in 0..ehdr.e_phnum as usize {
            let off = ehdr.e_phoff as usize + i * ehdr.e_phentsize as usize;
            let ph: Elf64Phdr = read_struct(image, off)?;
            match ph.p_type {
                PT_LOAD => {
                    if segment_count >= BFELF_MAX_SEGMENTS {
                        return Err(ElfError::LoaderFull);
                    }
                    let start = *start_addr.get_or_insert(ph.p_paddr);
                    memsz_high_water = ph.p_paddr + ph.p_memsz;
                    let mem_offset = ph.p_paddr - start;
                    segments[segment_count] = Some(LoadInstruction {
                        perm: SegmentPerm { read: ph.p_flags & PF_R != 0, write: ph.p_flags & PF_W != 0, exec: ph.p_flags & PF_X != 0 },
                        mem_offset,
                        file_offset: ph.p_offset,
                        memsz: ph.p_memsz,
                        filesz: ph.p_filesz,
                        phys_addr: load_base + mem_offset,
                    });
                    segment_count += 1;
                }
                PT_DYNAMIC => {
                    dynamic_off = Some(ph.p_offset);
                    dynamic_size = ph.p_filesz;
                }
                _ => {}
            }
        }

        let total_memsz = start_addr.map_or(0, |start| memsz_high_water - start);

        let mut needed: [Option<u64>; BFELF_MAX_NEEDED] = [None; BFELF_MAX_NEEDED];
        let mut needed_count = 0usize;
        let mut dynamic = None;

        if let Some(off) = dynamic_off {
            let mut info = DynamicInfo::default();
            let n = (dynamic_size as usize) / core::mem::size_of::<Elf64Dyn>();
            for i in 0..n {
                let d: Elf64Dyn = read_struct(image, off as usize + i * core::mem::size_of::<Elf64Dyn>())?;
                match d.d_tag {
                    DT_NULL => break,
                    DT_NEEDED => {
                        if needed_count >= BFELF_MAX_NEEDED {
                            return Err(ElfError::LoaderFull);
                        }
                        needed[needed_count] = Some(d.d_val);
                        needed_count += 1;
                    }
                    DT_HASH => info.hash = d.d_val,
                    DT_STRTAB => info.strtab = d.d_val,
                    DT_SYMTAB => info.symtab = d.d_val,
                    DT_RELA => info.rela = d.d_val,
                    DT_INIT => info.init = Some(d.d_val),
                    DT_FINI => info.fini = Some(d.d_val),
                    DT_INIT_ARRAY => info.init_array = Some((d.d_val, info.init_array.map(|(_, s)| s).unwrap_or(0))),
                    DT_FINI_ARRAY => info.fini_array = Some((d.d_val, info.fini_array.map(|(_, s)| s).unwrap_or(0))),
                    _ => {}
                }
            }
            dynamic = Some(info);
        }

        Ok(Module { image, segments, segment_count, needed, needed_count, dynamic, entry: ehdr.e_entry, load_base, total_memsz })
    }

    pub fn entry(&self) -> u64 {
        self.load_base + self.entry
    }

    pub fn segments(&self) -> impl Iterator<Item = &LoadInstruction> {
        self.segments[..self.segment_count].iter().filter_map(|s| s.as_ref())
    }

    /// Total memory footprint spanned by this module's loadable segments
    /// (spec.md §4.2); the caller allocates this much before copying
    /// segments in at `load_base + mem_offset`.
    pub fn total_memsz(&self) -> u64 {
        self.total_memsz
    }

    pub fn needed(&self) -> impl Iterator<Item = u64> + '_ {
        self.needed[..self.needed_count].iter().filter_map(|n| *n)
    }

    /// Scans the section header table by name for the sections the
    /// dynamic-tag walk can't find on its own (legacy `.ctors`/`.dtors`,
    /// and `.eh_frame` which may be tagged `PROGBITS` or `X86_64_UNWIND`).
    pub fn section_refs(&self) -> Result<SectionRefs, ElfError> {
        let ehdr: Elf64Ehdr = read_struct(self.image, 0)?;
        if ehdr.e_shoff == 0 || ehdr.e_shstrndx == 0 {
            return Ok(SectionRefs::default());
        }
        let shstrtab_hdr: Elf64Shdr = read_struct(self.image, ehdr.e_shoff as usize + ehdr.e_shstrndx as usize * ehdr.e_shentsize as usize)?;
        let shstrtab = &self.image[shstrtab_hdr.sh_offset as usize..(shstrtab_hdr.sh_offset + shstrtab_hdr.sh_size) as usize];

        let mut refs = SectionRefs::default();
        for i in 0..ehdr.e_shnum as usize {
            let sh: Elf64Shdr = read_struct(self.image, ehdr.e_shoff as usize + i * ehdr.e_shentsize as usize)?;
            let name = cstr_at(shstrtab, sh.sh_name as usize);
            let span = (sh.sh_addr, sh.sh_size);
            match name {
                b".eh_frame" => refs.eh_frame = Some(span),
                b".ctors" => refs.ctors = Some(span),
                b".dtors" => refs.dtors = Some(span),
                b".notes" => refs.notes = Some(span),
                _ => {}
            }
        }
        Ok(refs)
    }

    fn strtab(&self) -> Result<&[u8], ElfError> {
        let d = self.dynamic.ok_or(ElfError::InvalidFile)?;
        Ok(&self.image[d.strtab as usize..])
    }

    fn sym_name(&self, sym: &Elf64Sym) -> Result<&[u8], ElfError> {
        Ok(cstr_at(self.strtab()?, sym.st_name as usize))
    }

    fn read_sym(&self, index: u32) -> Result<Elf64Sym, ElfError> {
        let d = self.dynamic.ok_or(ElfError::InvalidFile)?;
        read_struct(self.image, d.symtab as usize + index as usize * core::mem::size_of::<Elf64Sym>())
    }

    /// Hash-table probe if `DT_HASH` is present, else a linear scan.
    /// Returns `None` rather than `STN_UNDEF` when nothing matches.
    pub fn lookup_symbol(&self, name: &[u8]) -> Result<Option<(Elf64SymInfo, bool)>, ElfError> {
        let d = self.dynamic.ok_or(ElfError::InvalidFile)?;
        if d.hash != 0 {
            let nbucket = u32::from_le_bytes(self.image[d.hash as usize..d.hash as usize + 4].try_into().unwrap());
            let nchain = u32::from_le_bytes(self.image[d.hash as usize + 4..d.hash as usize + 8].try_into().unwrap());
            let bucket_off = d.hash as usize + 8;
            let chain_off = bucket_off + nbucket as usize * 4;
            let h = pjw_hash(name);
            let mut i = u32::from_le_bytes(self.image[bucket_off + (h % nbucket) as usize * 4..][..4].try_into().unwrap());
            while i != STN_UNDEF && (i as u32) < nchain {
                let sym = self.read_sym(i)?;
                if self.sym_name(&sym)? == name {
                    let weak = (sym.st_info & 0xf) == STB_WEAK;
                    return Ok(Some((Elf64SymInfo { value: self.load_base + sym.st_value, defined: sym.st_shndx != 0 }, weak)));
                }
                i = u32::from_le_bytes(self.image[chain_off + i as usize * 4..][..4].try_into().unwrap());
            }
            return Ok(None);
        }

        // Linear fallback: walk the symbol table until the string table.
        let max = ((d.strtab - d.symtab) / core::mem::size_of::<Elf64Sym>() as u64).max(1);
        for idx in 0..max as u32 {
            let sym = self.read_sym(idx)?;
            if self.sym_name(&sym)? == name {
                let weak = (sym.st_info & 0xf) == STB_WEAK;
                return Ok(Some((Elf64SymInfo { value: self.load_base + sym.st_value, defined: sym.st_shndx != 0 }, weak)));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64SymInfo {
    pub value: u64,
    pub defined: bool,
}

/// Global symbol resolution across loaded modules (spec.md §4.2): scans
/// every module except `skip`, preferring the first non-weak definition and
/// falling back to a weak match if that's all there is.
pub fn resolve_global(modules: &[Module], skip: usize, name: &[u8]) -> Result<u64, ElfError> {
    let mut weak_hit = None;
    for (i, m) in modules.iter().enumerate() {
        if i == skip {
            continue;
        }
        if let Some((info, weak)) = m.lookup_symbol(name)? {
            if !info.defined {
                continue;
            }
            if !weak {
                return Ok(info.value);
            }
            if weak_hit.is_none() {
                weak_hit = Some(info.value);
            }
        }
    }
    weak_hit.ok_or(ElfError::NoSuchSymbol)
}

/// x86_64 relocator: `RELATIVE` is base-relative, `GLOB_DAT`/`JUMP_SLOT`
/// resolve through `resolve_global`. Anything else is unsupported.
pub fn relocate_x86_64(modules: &[Module], this: usize, write_u64: &mut dyn FnMut(u64, u64)) -> Result<(), ElfError> {
    let m = &modules[this];
    let d = m.dynamic.ok_or(ElfError::InvalidFile)?;
    if d.rela == 0 {
        return Ok(());
    }
    let mut off = d.rela as usize;
    loop {
        let rela: Elf64Rela = match read_struct(m.image, off) {
            Ok(r) => r,
            Err(_) => break,
        };
        if rela.r_offset == 0 && rela.r_info == 0 {
            break;
        }
        let r_type = (rela.r_info & 0xffff_ffff) as u32;
        let target = m.load_base + rela.r_offset;
        match r_type {
            R_X86_64_RELATIVE => write_u64(target, (m.load_base as i64 + rela.r_addend) as u64),
            R_X86_64_GLOB_DAT | R_X86_64_JUMP_SLOT => {
                let sym_index = (rela.r_info >> 32) as u32;
                let sym = m.read_sym(sym_index)?;
                let name = m.sym_name(&sym)?;
                let value = resolve_global(modules, this, name)?;
                write_u64(target, value);
            }
            _ => return Err(ElfError::UnsupportedRelocation),
        }
        off += core::mem::size_of::<Elf64Rela>();
    }
    Ok(())
}

/// aarch64 is not a target this workspace builds for; any relocation
/// request against that architecture is unsupported by construction.
pub fn relocate_aarch64(_modules: &[Module], _this: usize, _write_u64: &mut dyn FnMut(u64, u64)) -> Result<(), ElfError> {
    Err(ElfError::UnsupportedRelocation)
}

const _MAX_MODULES_BOUND: usize = MAX_NUM_MODULES;

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_exec(entry: u64, vaddr: u64, memsz: u64) -> alloc::vec::Vec<u8> {
        use alloc::vec;
        let mut image = vec![0u8; core::mem::size_of::<Elf64Ehdr>() + core::mem::size_of::<Elf64Phdr>()];
        let ehdr = Elf64Ehdr {
            e_ident: {
                let mut id = [0u8; 16];
                id[0..4].copy_from_slice(&ELF_MAGIC);
                id[4] = ELFCLASS64;
                id[5] = ELFDATA2LSB;
                id
            },
            e_type: ET_EXEC,
            e_machine: EM_X86_64,
            e_version: 1,
            e_entry: entry,
            e_phoff: core::mem::size_of::<Elf64Ehdr>() as u64,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: core::mem::size_of::<Elf64Ehdr>() as u16,
            e_phentsize: core::mem::size_of::<Elf64Phdr>() as u16,
            e_phnum: 1,
            e_shentsize: 0,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        let phdr = Elf64Phdr {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_X,
            p_offset: 0,
            p_vaddr: vaddr,
            p_paddr: vaddr,
            p_filesz: memsz,
            p_memsz: memsz,
            p_align: 0x1000,
        };
        unsafe {
            core::ptr::copy_nonoverlapping(&ehdr as *const _ as *const u8, image.as_mut_ptr(), core::mem::size_of::<Elf64Ehdr>());
            core::ptr::copy_nonoverlapping(
                &phdr as *const _ as *const u8,
                image.as_mut_ptr().add(core::mem::size_of::<Elf64Ehdr>()),
                core::mem::size_of::<Elf64Phdr>(),
            );
        }
        image
    }

    #[test]
    fn parse_rejects_bad_magic() {
        let image = [0u8; 64];
        assert_eq!(Module::parse(&image, 0), Err(ElfError::InvalidSignature));
    }

    #[test]
    fn parse_reports_one_load_segment() {
        let image = build_minimal_exec(0x1000, 0x1000, 0x2000);
        let module = Module::parse(&image, 0).unwrap();
        let segs: alloc::vec::Vec<_> = module.segments().collect();
        assert_eq!(segs.len(), 1);
        // A single segment is its own `start_addr`, so its offset is 0
        // regardless of where `p_vaddr`/`p_paddr` actually sit.
        assert_eq!(segs[0].mem_offset, 0);
        assert_eq!(segs[0].memsz, 0x2000);
        assert!(segs[0].perm.read && segs[0].perm.exec && !segs[0].perm.write);
        assert_eq!(module.total_memsz(), 0x2000);
    }

    /// Builds an image with two `PT_LOAD` segments whose `p_paddr` diverges
    /// from `p_vaddr` — the case the original's `start_addr` subtraction
    /// exists for (e.g. a position-independent image linked at one virtual
    /// address but intended to load at a fixed physical one).
    fn build_two_segment_exec(vaddr0: u64, paddr0: u64, memsz0: u64, vaddr1: u64, paddr1: u64, memsz1: u64) -> alloc::vec::Vec<u8> {
        use alloc::vec;
        let phdr_size = core::mem::size_of::<Elf64Phdr>();
        let mut image = vec![0u8; core::mem::size_of::<Elf64Ehdr>() + 2 * phdr_size];
        let ehdr = Elf64Ehdr {
            e_ident: {
                let mut id = [0u8; 16];
                id[0..4].copy_from_slice(&ELF_MAGIC);
                id[4] = ELFCLASS64;
                id[5] = ELFDATA2LSB;
                id
            },
            e_type: ET_EXEC,
            e_machine: EM_X86_64,
            e_version: 1,
            e_entry: vaddr0,
            e_phoff: core::mem::size_of::<Elf64Ehdr>() as u64,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: core::mem::size_of::<Elf64Ehdr>() as u16,
            e_phentsize: phdr_size as u16,
            e_phnum: 2,
            e_shentsize: 0,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        let mk_phdr = |vaddr: u64, paddr: u64, memsz: u64| Elf64Phdr {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_W,
            p_offset: 0,
            p_vaddr: vaddr,
            p_paddr: paddr,
            p_filesz: memsz,
            p_memsz: memsz,
            p_align: 0x1000,
        };
        let phdr0 = mk_phdr(vaddr0, paddr0, memsz0);
        let phdr1 = mk_phdr(vaddr1, paddr1, memsz1);
        unsafe {
            core::ptr::copy_nonoverlapping(&ehdr as *const _ as *const u8, image.as_mut_ptr(), core::mem::size_of::<Elf64Ehdr>());
            let phdr_base = image.as_mut_ptr().add(core::mem::size_of::<Elf64Ehdr>());
            core::ptr::copy_nonoverlapping(&phdr0 as *const _ as *const u8, phdr_base, phdr_size);
            core::ptr::copy_nonoverlapping(&phdr1 as *const _ as *const u8, phdr_base.add(phdr_size), phdr_size);
        }
        image
    }

    #[test]
    fn mem_offset_is_relative_to_first_segments_p_paddr_not_p_vaddr() {
        // p_vaddr is identical for both segments (as a PIE image linked at a
        // single base would have); only p_paddr diverges, by 0x3000.
        let image = build_two_segment_exec(0x1000, 0x2000, 0x1000, 0x1000, 0x5000, 0x1000);
        let module = Module::parse(&image, 0).unwrap();
        let segs: alloc::vec::Vec<_> = module.segments().collect();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].mem_offset, 0);
        assert_eq!(segs[1].mem_offset, 0x3000);
    }

    #[test]
    fn phys_addr_is_load_base_plus_mem_offset() {
        let image = build_two_segment_exec(0x1000, 0x2000, 0x1000, 0x1000, 0x5000, 0x1000);
        let module = Module::parse(&image, 0x9000_0000).unwrap();
        let segs: alloc::vec::Vec<_> = module.segments().collect();
        assert_eq!(segs[0].phys_addr, 0x9000_0000);
        assert_eq!(segs[1].phys_addr, 0x9000_0000 + 0x3000);
    }

    #[test]
    fn total_memsz_spans_first_to_last_segment() {
        let image = build_two_segment_exec(0x1000, 0x2000, 0x1000, 0x1000, 0x5000, 0x1000);
        let module = Module::parse(&image, 0).unwrap();
        // last segment's (p_paddr + p_memsz) - first segment's p_paddr
        assert_eq!(module.total_memsz(), (0x5000 + 0x1000) - 0x2000);
    }

    #[test]
    fn entry_is_relocated_by_load_base() {
        let image = build_minimal_exec(0x1000, 0x1000, 0x2000);
        let module = Module::parse(&image, 0x8000_0000).unwrap();
        assert_eq!(module.entry(), 0x8000_1000);
    }

    #[test]
    fn round_trip_parse_is_byte_identical() {
        let image = build_minimal_exec(0x2000, 0x1000, 0x1000);
        let a = Module::parse(&image, 0).unwrap();
        let b = Module::parse(&image, 0).unwrap();
        let sa: alloc::vec::Vec<_> = a.segments().collect();
        let sb: alloc::vec::Vec<_> = b.segments().collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn pjw_hash_is_deterministic() {
        assert_eq!(pjw_hash(b"hvmk_init"), pjw_hash(b"hvmk_init"));
        assert_ne!(pjw_hash(b"hvmk_init"), pjw_hash(b"hvmk_fini"));
    }
}
