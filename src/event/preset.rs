use std::fmt;
use std::str::FromStr;

use super::{Arch, CounterSet, Event, MAX_PROGRAMMABLE};
use crate::error::{ConfigError, Error};

/// Named programmable counter sets.
///
/// Every preset fits in the 4 counters available with hyperthreading on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Core cycles, instructions, LLC references and LLC misses.
    Default,
    /// Retired branches and retired mispredicted branches.
    Branches,
    /// Retired loads by the cache level that served them (Skylake and later).
    Cache,
}

const DEFAULT: [Event; 4] = [
    Event::from_static(0x41003c, "CPU_CLK_UNHALTED.THREAD_P", "unhalted core cycles"),
    Event::from_static(0x4100c0, "INST_RETIRED.ANY_P", "instructions retired"),
    Event::from_static(0x414f2e, "LONGEST_LAT_CACHE.REFERENCE", "LLC references"),
    Event::from_static(0x41412e, "LONGEST_LAT_CACHE.MISS", "LLC misses"),
];

const CACHE: [Event; 4] = [
    Event::from_static(0x4101d1, "MEM_LOAD_RETIRED.L1_HIT", "retired loads hitting L1"),
    Event::from_static(0x4108d1, "MEM_LOAD_RETIRED.L1_MISS", "retired loads missing L1"),
    Event::from_static(0x4110d1, "MEM_LOAD_RETIRED.L2_MISS", "retired loads missing L2"),
    Event::from_static(0x4120d1, "MEM_LOAD_RETIRED.L3_MISS", "retired loads missing L3"),
];

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Default, Preset::Branches, Preset::Cache];

    pub const fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Branches => "branches",
            Preset::Cache => "cache",
        }
    }

    pub fn events(self) -> Vec<Event> {
        match self {
            Preset::Default => DEFAULT.to_vec(),
            Preset::Branches => vec![Arch::BranchInstr.into(), Arch::BranchMiss.into()],
            Preset::Cache => CACHE.to_vec(),
        }
    }
}

impl From<Preset> for CounterSet {
    fn from(value: Preset) -> Self {
        CounterSet(value.events().into_iter().take(MAX_PROGRAMMABLE).collect())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_owned()).into())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
