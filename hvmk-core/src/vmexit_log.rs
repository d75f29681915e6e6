//! Per-PP ring of recent VM-exit records, backing `debug_op`'s
//! `dump_vmexit_log` (spec.md §6, "dump primitives produce tabular textual
//! output of the named object"). `vs_engine::run` appends one record per
//! completed hardware entry (spec.md §4.3 step 6); nothing else writes here.
//!
//! Ground: the original's `vmexit_log_t`, a fixed-depth per-PP history kept
//! purely for `bf_debug_op_dump_vmexit_log` — this crate keeps the same
//! shape (bounded ring, oldest overwritten first) rather than growing
//! unbounded state off a path that runs on every VM-exit.

use spin::Mutex;

use hvmk_hal::{PpId, VmId, VpId, VsId};

use crate::config::MAX_PPS;

const LOG_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct VmexitRecord {
    pub vm: VmId,
    pub vp: VpId,
    pub vs: VsId,
    pub reason: u64,
}

struct Ring {
    entries: [Option<VmexitRecord>; LOG_DEPTH],
    /// Index the next record will be written to; also the oldest live entry
    /// once the ring has wrapped at least once.
    next: usize,
}

impl Ring {
    const fn new() -> Self {
        Self { entries: [None; LOG_DEPTH], next: 0 }
    }
}

static LOG: [Mutex<Ring>; MAX_PPS] = [const { Mutex::new(Ring::new()) }; MAX_PPS];

/// Appends one VM-exit record for `pp`, overwriting the oldest entry once
/// the per-PP ring is full.
pub fn record(pp: PpId, vm: VmId, vp: VpId, vs: VsId, reason: u64) {
    let Some(slot) = LOG.get(pp.as_usize()) else { return };
    let mut ring = slot.lock();
    let idx = ring.next;
    ring.entries[idx] = Some(VmexitRecord { vm, vp, vs, reason });
    ring.next = (idx + 1) % LOG_DEPTH;
}

/// Writes every live record for `pp` to the log ring buffer, oldest first.
/// Returns `Err(())` if `pp` is out of range.
pub fn dump(pp: PpId) -> Result<(), ()> {
    let Some(slot) = LOG.get(pp.as_usize()) else { return Err(()) };
    let ring = slot.lock();
    for i in 0..LOG_DEPTH {
        let idx = (ring.next + i) % LOG_DEPTH;
        if let Some(rec) = ring.entries[idx] {
            crate::log::dump_row(
                "vmexit",
                &[("pp", pp.get() as u64), ("vm", rec.vm.get() as u64), ("vp", rec.vp.get() as u64), ("vs", rec.vs.get() as u64), ("reason", rec.reason)],
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_wrap_after_log_depth() {
        let pp = PpId::new(0);
        for i in 0..(LOG_DEPTH as u64 + 3) {
            record(pp, VmId::new(0), VpId::new(0), VsId::new(0), i);
        }
        let ring = LOG[pp.as_usize()].lock();
        let live = ring.entries.iter().filter(|e| e.is_some()).count();
        assert_eq!(live, LOG_DEPTH);
    }

    #[test]
    fn dump_rejects_out_of_range_pp() {
        assert_eq!(dump(PpId::new(MAX_PPS as u16)), Err(()));
    }
}
