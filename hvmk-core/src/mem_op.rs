//! `mem_op` syscall family (spec.md §4.4/§4.5/§6): page/huge/heap allocation
//! exposed to the extension through the per-PP direct-map window. The
//! translation is pure arithmetic, never a page-table walk:
//! `virt = phys + EXT_DIRECT_MAP_ADDR`, `phys = virt - EXT_DIRECT_MAP_ADDR`.
//!
//! Ground: `hvmk_hal::memory::{PagePool, HugePool, HeapPool}` contracts,
//! which this module is the sole caller of within the core.

use crate::arch_ctx;
use crate::config::{EXT_DIRECT_MAP_ADDR, EXT_DIRECT_MAP_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOpError {
    OutOfMemory,
    InvalidAddress,
}

impl From<hvmk_hal::MemoryError> for MemOpError {
    fn from(e: hvmk_hal::MemoryError) -> Self {
        match e {
            hvmk_hal::MemoryError::OutOfMemory => MemOpError::OutOfMemory,
            hvmk_hal::MemoryError::Unaligned | hvmk_hal::MemoryError::InvalidAddress => MemOpError::InvalidAddress,
        }
    }
}

pub fn phys_to_virt(phys: u64) -> Result<u64, MemOpError> {
    if phys >= EXT_DIRECT_MAP_SIZE {
        return Err(MemOpError::InvalidAddress);
    }
    Ok(EXT_DIRECT_MAP_ADDR + phys)
}

pub fn virt_to_phys(virt: u64) -> Result<u64, MemOpError> {
    virt.checked_sub(EXT_DIRECT_MAP_ADDR)
        .filter(|&phys| phys < EXT_DIRECT_MAP_SIZE)
        .ok_or(MemOpError::InvalidAddress)
}

/// Returns the direct-mapped virtual address of a freshly allocated page.
pub fn alloc_page() -> Result<u64, MemOpError> {
    let phys = arch_ctx::page_pool().alloc_page()?;
    phys_to_virt(phys)
}

pub fn free_page(virt: u64) -> Result<(), MemOpError> {
    let phys = virt_to_phys(virt)?;
    Ok(arch_ctx::page_pool().free_page(phys)?)
}

pub fn alloc_huge() -> Result<u64, MemOpError> {
    let phys = arch_ctx::huge_pool().alloc_huge()?;
    phys_to_virt(phys)
}

pub fn free_huge(virt: u64) -> Result<(), MemOpError> {
    let phys = virt_to_phys(virt)?;
    Ok(arch_ctx::huge_pool().free_huge(phys)?)
}

pub fn alloc_heap(size: usize, align: usize) -> Result<u64, MemOpError> {
    let phys = arch_ctx::heap_pool().alloc_heap(size, align)?;
    phys_to_virt(phys)
}

pub fn dump_page_pool() {
    let s = arch_ctx::page_pool().stats();
    crate::log::dump_row("page_pool", &[("capacity", s.capacity as u64), ("allocated", s.allocated as u64)]);
}

pub fn dump_huge_pool() {
    let s = arch_ctx::huge_pool().stats();
    crate::log::dump_row("huge_pool", &[("capacity", s.capacity as u64), ("allocated", s.allocated as u64)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_map_round_trips() {
        assert_eq!(virt_to_phys(phys_to_virt(0x4000).unwrap()).unwrap(), 0x4000);
    }

    #[test]
    fn virt_below_window_is_rejected() {
        assert_eq!(virt_to_phys(0x10), Err(MemOpError::InvalidAddress));
    }

    #[test]
    fn phys_past_window_is_rejected() {
        assert_eq!(phys_to_virt(EXT_DIRECT_MAP_SIZE), Err(MemOpError::InvalidAddress));
    }

    #[test]
    fn alloc_then_free_page_round_trips() {
        arch_ctx::init_sim();
        let virt = alloc_page().unwrap();
        assert_eq!(virt_to_phys(virt).unwrap() + EXT_DIRECT_MAP_ADDR, virt);
        free_page(virt).unwrap();
    }
}
