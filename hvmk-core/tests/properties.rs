//! Property-based coverage of the invariants that hold over arbitrary
//! inputs rather than one fixed case: direct-map translation is a true
//! bijection inside its window, VM ids stay unique among the currently
//! allocated set, and an extension handle's cookie never repeats across a
//! close/reopen cycle.
//!
//! `capability_table`'s own unit tests already cover the `OutOfIds`
//! boundary against small local tables, so nothing here tries to exhaust
//! the shared global tables — doing that from a property test would just
//! make the suite flaky under the default parallel test runner.

use proptest::prelude::*;

use hvmk_core::config::EXT_CODE_ADDR;
use hvmk_core::ext;
use hvmk_core::mem_op;
use hvmk_core::vm;

/// `ext::create`/`vm::create` share process-wide tables; every property
/// here that touches one is serialised against the others in this file.
static LOCK: spin::Mutex<()> = spin::Mutex::new(());

proptest! {
    #[test]
    fn direct_map_round_trips_anywhere_in_the_window(phys in 0u64..hvmk_core::config::EXT_DIRECT_MAP_SIZE) {
        let virt = mem_op::phys_to_virt(phys).unwrap();
        prop_assert_eq!(mem_op::virt_to_phys(virt).unwrap(), phys);
    }

    #[test]
    fn phys_outside_the_window_is_always_rejected(excess in 0u64..0x1000_0000) {
        let phys = hvmk_core::config::EXT_DIRECT_MAP_SIZE + excess;
        prop_assert_eq!(mem_op::phys_to_virt(phys), Err(mem_op::MemOpError::InvalidAddress));
    }

    #[test]
    fn vm_ids_are_unique_among_the_currently_allocated(count in 1usize..8) {
        let _guard = LOCK.lock();
        let mut ids = std::vec::Vec::new();
        for _ in 0..count {
            ids.push(vm::create().unwrap());
        }
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                prop_assert_ne!(ids[i], ids[j]);
            }
        }
        for id in ids {
            vm::destroy(id).unwrap();
        }
    }

    #[test]
    fn ext_cookie_never_repeats_across_reopen_cycles(cycles in 1usize..8) {
        let _guard = LOCK.lock();
        let id = ext::create(EXT_CODE_ADDR, 0x1000).unwrap();
        let mut seen = std::vec::Vec::new();
        for _ in 0..cycles {
            let cookie = ext::open_handle(id).unwrap();
            prop_assert!(!seen.contains(&cookie));
            seen.push(cookie);
            ext::close_handle(id, cookie).unwrap();
        }
        // A cookie from any earlier cycle must never authorise again.
        for stale in &seen[..seen.len() - 1] {
            prop_assert_eq!(ext::authorize(id, *stale), Err(ext::ExtError::HandleMismatch));
        }
        ext::destroy(id).unwrap();
    }
}
