use std::fmt;

use crate::event::fixed::FIXED_COUNTERS;
use crate::event::MAX_PROGRAMMABLE;

/// Counter class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    Fixed,
    Programmable,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Fixed => f.write_str("fixed"),
            Kind::Programmable => f.write_str("programmable"),
        }
    }
}

const FIXED_SHIFT: u32 = 32;

/// `IA32_PERF_GLOBAL_STATUS` contents.
///
/// Bit `i` flags programmable counter `i`, bit `32 + i` fixed counter `i`.
/// A flag stays set until the status is cleared by the next reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverflowStatus(pub u64);

impl OverflowStatus {
    pub const fn fixed(self, index: usize) -> bool {
        index < FIXED_COUNTERS && self.0 & (1 << (FIXED_SHIFT + index as u32)) != 0
    }

    pub const fn programmable(self, index: usize) -> bool {
        index < MAX_PROGRAMMABLE && self.0 & (1 << index) != 0
    }

    pub const fn overflowed(self, kind: Kind, index: usize) -> bool {
        match kind {
            Kind::Fixed => self.fixed(index),
            Kind::Programmable => self.programmable(index),
        }
    }

    /// Whether any counter flag is set.
    pub const fn any(self) -> bool {
        let fixed = ((1u64 << FIXED_COUNTERS) - 1) << FIXED_SHIFT;
        let programmable = (1u64 << MAX_PROGRAMMABLE) - 1;
        self.0 & (fixed | programmable) != 0
    }
}

/// Every flag [`OverflowStatus`] decodes, written to
/// `IA32_PERF_GLOBAL_OVF_CTRL` to clear them all.
pub(crate) const OVF_CLEAR: u64 = global_mask(MAX_PROGRAMMABLE);

/// Bits of `IA32_PERF_GLOBAL_CTRL` covering
/// every fixed counter and the first `programmable` programmable counters.
pub(crate) const fn global_mask(programmable: usize) -> u64 {
    let fixed = ((1u64 << FIXED_COUNTERS) - 1) << FIXED_SHIFT;
    fixed | ((1u64 << programmable) - 1)
}
