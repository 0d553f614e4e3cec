pub mod fixed;
pub mod preset;
pub mod select;


use std::borrow::Cow;
use std::ops::Deref;

use arrayvec::ArrayVec;

use crate::error::{ConfigError, Error};
use select::{EventSelect, Field};

/// Maximum programmable counters per core with hyperthreading disabled.
pub const MAX_PROGRAMMABLE: usize = 8;

/// Maximum programmable counters per hardware thread with hyperthreading enabled.
pub const MAX_PROGRAMMABLE_SMT: usize = 4;

/// A programmable counter event: the select word plus how to label it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub select: EventSelect,
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

impl Event {
    pub fn new(
        select: EventSelect,
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            select,
            name: name.into(),
            description: description.into(),
        }
    }

    /// Unnamed event, labelled with its raw select word.
    pub fn raw(select: EventSelect) -> Self {
        let name = format!("RAW_{:#x}", select.raw());
        Self::new(select, name, "raw event select")
    }

    pub(crate) const fn from_static(
        raw: u32,
        name: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            select: EventSelect::from_raw(raw),
            name: Cow::Borrowed(name),
            description: Cow::Borrowed(description),
        }
    }
}

/// Architectural performance events, available on every Intel core since
/// architectural performance monitoring version 1.
///
/// Converted events count in user mode only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    CoreCycle,
    Instr,
    RefCycle,
    LlcAccess,
    LlcMiss,
    BranchInstr,
    BranchMiss,
}

impl Arch {
    pub const ALL: [Arch; 7] = [
        Arch::CoreCycle,
        Arch::Instr,
        Arch::RefCycle,
        Arch::LlcAccess,
        Arch::LlcMiss,
        Arch::BranchInstr,
        Arch::BranchMiss,
    ];

    /// `(event, umask)` pair from the SDM architectural event table.
    pub const fn code(self) -> (u8, u8) {
        match self {
            Arch::CoreCycle => (0x3c, 0x00),
            Arch::Instr => (0xc0, 0x00),
            Arch::RefCycle => (0x3c, 0x01),
            Arch::LlcAccess => (0x2e, 0x4f),
            Arch::LlcMiss => (0x2e, 0x41),
            Arch::BranchInstr => (0xc4, 0x00),
            Arch::BranchMiss => (0xc5, 0x00),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Arch::CoreCycle => "CPU_CLK_UNHALTED.THREAD_P",
            Arch::Instr => "INST_RETIRED.ANY_P",
            Arch::RefCycle => "CPU_CLK_UNHALTED.REF_XCLK",
            Arch::LlcAccess => "LONGEST_LAT_CACHE.REFERENCE",
            Arch::LlcMiss => "LONGEST_LAT_CACHE.MISS",
            Arch::BranchInstr => "BR_INST_RETIRED.ALL_BRANCHES",
            Arch::BranchMiss => "BR_MISP_RETIRED.ALL_BRANCHES",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Arch::CoreCycle => "unhalted core cycles",
            Arch::Instr => "instructions retired",
            Arch::RefCycle => "unhalted reference cycles",
            Arch::LlcAccess => "LLC references",
            Arch::LlcMiss => "LLC misses",
            Arch::BranchInstr => "branch instructions retired",
            Arch::BranchMiss => "branch mispredicts retired",
        }
    }

    pub const fn select(self) -> EventSelect {
        let (event, umask) = self.code();
        let raw = event as u32
            | (umask as u32) << Field::Umask.offset()
            | 1 << Field::Usr.offset()
            | 1 << Field::Enable.offset();
        EventSelect::from_raw(raw)
    }
}

impl From<Arch> for Event {
    fn from(value: Arch) -> Self {
        Event::from_static(value.select().raw(), value.name(), value.description())
    }
}

/// Ordered programmable counter events; counter `i` is programmed with the
/// `i`-th event.
///
/// Holds at most [`MAX_PROGRAMMABLE`] events. Zero and duplicate words, an
/// empty set, and the hyperthreading limit are checked when a session is
/// built from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSet(ArrayVec<Event, MAX_PROGRAMMABLE>);

impl CounterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<Event>) -> Result<(), ConfigError> {
        self.0
            .try_push(event.into())
            .map_err(|_| ConfigError::TooManyCounters {
                count: MAX_PROGRAMMABLE + 1,
                max: MAX_PROGRAMMABLE,
            })
    }

    pub(crate) fn validate(&self, max: usize) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::NoCounters);
        }
        if self.0.len() > max {
            return Err(ConfigError::TooManyCounters {
                count: self.0.len(),
                max,
            });
        }
        for (index, event) in self.0.iter().enumerate() {
            let word = event.select.raw();
            if word == 0 {
                return Err(ConfigError::ZeroCounter { index });
            }
            if let Some(first) = self.0[..index].iter().position(|e| e.select.raw() == word) {
                return Err(ConfigError::DuplicateCounter {
                    first,
                    second: index,
                    word,
                });
            }
        }
        Ok(())
    }
}

impl Deref for CounterSet {
    type Target = [Event];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Vec<Event>> for CounterSet {
    type Error = Error;

    fn try_from(value: Vec<Event>) -> Result<Self, Self::Error> {
        if value.len() > MAX_PROGRAMMABLE {
            return Err(ConfigError::TooManyCounters {
                count: value.len(),
                max: MAX_PROGRAMMABLE,
            }
            .into());
        }
        Ok(Self(value.into_iter().collect()))
    }
}

impl TryFrom<&[Event]> for CounterSet {
    type Error = Error;

    fn try_from(value: &[Event]) -> Result<Self, Self::Error> {
        value.to_vec().try_into()
    }
}

impl TryFrom<&[u64]> for CounterSet {
    type Error = Error;

    fn try_from(value: &[u64]) -> Result<Self, Self::Error> {
        let events = value
            .iter()
            .map(|&word| EventSelect::try_from(word).map(Event::raw))
            .collect::<Result<Vec<_>, _>>()?;
        events.try_into()
    }
}

impl TryFrom<&[Arch]> for CounterSet {
    type Error = Error;

    fn try_from(value: &[Arch]) -> Result<Self, Self::Error> {
        value.iter().copied().map(Event::from).collect::<Vec<_>>().try_into()
    }
}

impl From<Event> for CounterSet {
    fn from(value: Event) -> Self {
        let mut events = ArrayVec::new();
        events.push(value);
        Self(events)
    }
}

impl From<Arch> for CounterSet {
    fn from(value: Arch) -> Self {
        Event::from(value).into()
    }
}

impl From<EventSelect> for CounterSet {
    fn from(value: EventSelect) -> Self {
        Event::raw(value).into()
    }
}
