//! Well-known layout constants and capability-table capacities. Every fixed
//! array in this crate is sized from here; nothing else redefines these
//! values.
//!
//! Ground: `zerovisor-hal` arch modules hard-coding page sizes and table
//! capacities, generalised into one place the way a systems crate collects
//! its tunables.

use static_assertions::const_assert;

pub const PAGE_SIZE: usize = 4096;

/// High virtual range the ELF loader places the extension's code/data image
/// in.
pub const EXT_CODE_ADDR: u64 = 0xFFFF_8000_0000_0000;
pub const EXT_CODE_SIZE: u64 = 0x0000_0010_0000_0000; // 64 GiB

/// Per-PP direct-map window: `phys = virt - EXT_DIRECT_MAP_ADDR`.
pub const EXT_DIRECT_MAP_ADDR: u64 = 0xFFFF_9000_0000_0000;
pub const EXT_DIRECT_MAP_SIZE: u64 = 0x0000_0100_0000_0000; // 1 TiB

pub const MAX_PPS: usize = 64;
pub const MAX_VMS: usize = 64;
pub const MAX_VPS: usize = 128;
pub const MAX_VSS: usize = 128;
pub const MAX_EXTENSIONS: usize = 2;

/// ELF loader capacities.
pub const MAX_NUM_MODULES: usize = 4;
pub const BFELF_MAX_NEEDED: usize = 4;
pub const BFELF_MAX_SEGMENTS: usize = 4;

const_assert!(MAX_VPS >= MAX_VMS);
const_assert!(MAX_VSS >= MAX_PPS);
const_assert!(EXT_CODE_ADDR < EXT_DIRECT_MAP_ADDR);
const_assert!(PAGE_SIZE.is_power_of_two());

/// Rough static-memory budget check: table bodies must not blow past a few
/// megabytes of `.bss` even at `MAX_*` capacity. Adjust the constant bound
/// if a genuinely larger body type is introduced.
const_assert!((MAX_VSS + MAX_VPS + MAX_VMS + MAX_EXTENSIONS) * 4096 < 64 * 1024 * 1024);
