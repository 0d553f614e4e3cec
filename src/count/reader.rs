//! Direct counter reads with `rdpmc` and `rdtsc`.
//!
//! User space `rdpmc` needs `CR4.PCE`, which Linux sets when
//! `/sys/bus/event_source/devices/cpu/rdpmc` is `2`. Otherwise the
//! instruction faults.

use std::arch::asm;
use std::arch::x86_64::_rdtsc;

/// `rdpmc` index bit selecting the fixed-function counters.
const FIXED_SELECT: u32 = 1 << 30;

/// Waits for all prior instructions to complete locally, so work still in
/// flight is not attributed to the next read.
#[inline(always)]
pub fn fence() {
    unsafe { asm!("lfence", options(nostack, preserves_flags)) };
}

/// Reads the counter selected by `index` without fencing.
///
/// `eax` holds the low 32 bits and `edx` the rest, up to the counter width.
/// An invalid index faults or returns garbage.
#[inline(always)]
pub fn rdpmc(index: u32) -> u64 {
    let (lo, hi): (u32, u32);
    unsafe {
        asm!(
            "rdpmc",
            in("ecx") index,
            lateout("eax") lo,
            lateout("edx") hi,
            options(nostack, preserves_flags),
        );
    }
    (hi as u64) << 32 | lo as u64
}

#[inline(always)]
pub fn read_programmable(index: u32) -> u64 {
    fence();
    rdpmc(index)
}

#[inline(always)]
pub fn read_fixed(index: u32) -> u64 {
    fence();
    rdpmc(FIXED_SELECT | index)
}

/// Fenced time-stamp counter read.
#[inline(always)]
pub fn read_tsc() -> u64 {
    fence();
    unsafe { _rdtsc() }
}
