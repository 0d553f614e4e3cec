use std::fs;
use std::path::PathBuf;

use crate::event::fixed::FixedCtrl;
use crate::event::{MAX_PROGRAMMABLE, MAX_PROGRAMMABLE_SMT};

const SMT_ACTIVE_PATH: &str = "/sys/devices/system/cpu/smt/active";

/// Session options.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Pin the calling thread to the core it is running on when the session
    /// is created.
    ///
    /// Counters are per-core hardware state: if the thread migrates, every
    /// later delta is meaningless. Leave this off only if the caller has
    /// already pinned the thread.
    pub pin: bool,

    /// Fixed counter control word, written by [`Pmu::start`][crate::count::Pmu::start].
    pub fixed: FixedCtrl,

    /// Hyperthreading state, which bounds the programmable counter count.
    pub smt: Smt,

    /// Directory holding the per-core `<N>/msr` register devices.
    pub device_dir: PathBuf,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            pin: true,
            fixed: FixedCtrl::default(),
            smt: Smt::Detect,
            device_dir: PathBuf::from("/dev/cpu"),
        }
    }
}

/// Simultaneous multithreading (hyperthreading) state.
///
/// With SMT active, the 8 programmable counters of a core are split between
/// its two hardware threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Smt {
    /// Read `/sys/devices/system/cpu/smt/active`; assume on if unreadable.
    #[default]
    Detect,
    On,
    Off,
}

impl Smt {
    pub fn active(self) -> bool {
        match self {
            Smt::On => true,
            Smt::Off => false,
            Smt::Detect => fs::read_to_string(SMT_ACTIVE_PATH)
                .map(|s| s.trim() != "0")
                .unwrap_or(true),
        }
    }

    /// Programmable counters available to one hardware thread.
    pub fn max_programmable(self) -> usize {
        if self.active() {
            MAX_PROGRAMMABLE_SMT
        } else {
            MAX_PROGRAMMABLE
        }
    }
}
