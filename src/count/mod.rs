use std::borrow::Borrow;
use std::marker::PhantomData;
use std::path::PathBuf;

use arrayvec::ArrayVec;

use crate::config::Opts;
use crate::error::{Error, RegisterOp, Result, Usage};
use crate::event::fixed::{FixedCtrl, FIXED_COUNTERS, FIXED_LABELS};
use crate::event::{CounterSet, Event};
use crate::ffi::syscall::{sched_getcpu, sched_setaffinity};
use crate::stat::{Channel, Reading, Source};

pub mod msr;
mod overflow;
pub mod reader;
mod snapshot;

#[cfg(test)]
mod test;

use msr::*;
pub use overflow::*;
pub use snapshot::*;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Constructed, or the last reset failed. Hardware state is unknown.
    Idle,
    /// Counters zeroed and globally enabled, event selects cleared.
    Stopped,
    /// Event selects written, counters counting.
    Running,
}

/// A PMU session for the logical core the creating thread runs on.
///
/// The session programs the fixed counters and up to 8 programmable counters
/// through model specific registers, and reads them back with `rdpmc`.
///
/// Counters are per-core hardware: the owning thread must stay on
/// [`core`][Self::core] for the whole life of the session, which is why
/// [`Opts::pin`] is on by default. A session is neither `Send` nor `Sync`.
///
/// Dropping the session closes the register device and leaves the counters
/// as they are.
///
/// # Examples
///
/// ```no_run
/// use intel_pmu::config::Opts;
/// use intel_pmu::count::Pmu;
/// use intel_pmu::event::preset::Preset;
///
/// let mut pmu = Pmu::new(Preset::Default, Opts::default())?;
/// pmu.reset()?;
/// pmu.start()?;
///
/// let before = pmu.sample_programmable(1)?;
/// std::hint::black_box((0..1000).sum::<u64>());
/// let instrs = pmu.sample_programmable(1)? - before;
///
/// println!("{} instructions retired", instrs);
/// # Ok::<(), intel_pmu::error::Error>(())
/// ```
pub struct Pmu<M: Msr = MsrDevice> {
    core: u32,
    device_dir: PathBuf,
    counters: CounterSet,
    max_programmable: usize,
    fixed: FixedCtrl,
    msr: Option<M>,
    state: State,
    _thread_bound: PhantomData<*const ()>,
}

impl Pmu {
    /// Creates a session over the `/dev/cpu/<N>/msr` devices.
    ///
    /// `counters` is anything convertible into a [`CounterSet`], such as a
    /// [`Preset`][crate::event::preset::Preset], an [`Arch`][crate::event::Arch]
    /// event or a `Vec<Event>`. Nothing is written to hardware until
    /// [`reset`][Self::reset].
    pub fn new<C>(counters: C, opts: impl Borrow<Opts>) -> Result<Self>
    where
        C: TryInto<CounterSet>,
        Error: From<C::Error>,
    {
        Self::with_msr(counters, opts)
    }
}

impl<M: Msr> Pmu<M> {
    /// Creates a session over an alternative register backend.
    pub fn with_msr<C>(counters: C, opts: impl Borrow<Opts>) -> Result<Self>
    where
        C: TryInto<CounterSet>,
        Error: From<C::Error>,
    {
        let opts = opts.borrow();
        let counters = counters.try_into()?;
        let max_programmable = opts.smt.max_programmable();
        counters.validate(max_programmable)?;

        let core = sched_getcpu().map_err(|source| Error::Affinity { cpu: 0, source })?;
        if opts.pin {
            sched_setaffinity(core).map_err(|source| Error::Affinity { cpu: core, source })?;
            tracing::debug!(core, "pinned thread");
        }

        Ok(Self {
            core,
            device_dir: opts.device_dir.clone(),
            counters,
            max_programmable,
            fixed: opts.fixed,
            msr: None,
            state: State::Idle,
            _thread_bound: PhantomData,
        })
    }

    /// Logical core this session measures.
    pub fn core(&self) -> u32 {
        self.core
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn counters(&self) -> &[Event] {
        &self.counters
    }

    pub fn fixed_supported(&self) -> usize {
        FIXED_COUNTERS
    }

    /// Programmable counters available to this hardware thread.
    pub fn programmable_supported(&self) -> usize {
        self.max_programmable
    }

    pub fn programmable_defined(&self) -> usize {
        self.counters.len()
    }

    pub fn fixed_config(&self) -> FixedCtrl {
        self.fixed
    }

    /// Replaces the fixed counter control word used by the next
    /// [`start`][Self::start].
    pub fn set_fixed_config(&mut self, fixed: FixedCtrl) {
        self.fixed = fixed;
    }

    /// Stops, clears and zeroes every counter of the session, then re-enables
    /// them globally. Counting resumes only after [`start`][Self::start].
    ///
    /// The register device is opened on the first call.
    pub fn reset(&mut self) -> Result<()> {
        self.state = State::Idle;
        let msr = match self.msr {
            Some(ref msr) => msr,
            None => &*self.msr.insert(M::open(self.core, &self.device_dir)?),
        };
        let programmable = self.counters.len() as u32;

        // Global disable, then the per-counter controls.
        write(msr, IA32_PERF_GLOBAL_CTRL, 0)?;
        for i in 0..programmable {
            write(msr, IA32_PERFEVTSEL0 + i, 0)?;
        }
        write(msr, IA32_FIXED_CTR_CTRL, 0)?;

        for i in 0..programmable {
            write(msr, IA32_PMC0 + i, 0)?;
        }
        for i in 0..FIXED_COUNTERS as u32 {
            write(msr, IA32_FIXED_CTR0 + i, 0)?;
        }

        // Bits written as 1 clear the matching status flags, including those
        // of counters this session does not use.
        write(msr, IA32_PERF_GLOBAL_OVF_CTRL, OVF_CLEAR)?;
        write(msr, IA32_PERF_GLOBAL_CTRL, global_mask(self.counters.len()))?;

        self.state = State::Stopped;
        tracing::debug!(core = self.core, programmable, "counters reset");
        Ok(())
    }

    /// Writes the fixed counter control and every event select word, which
    /// starts counting.
    pub fn start(&mut self) -> Result<()> {
        if self.state == State::Idle {
            return Err(Usage::NotReset("start").into());
        }
        let msr = self.device("start")?;

        write(msr, IA32_FIXED_CTR_CTRL, self.fixed.0)?;
        for (i, event) in self.counters.iter().enumerate() {
            write(msr, IA32_PERFEVTSEL0 + i as u32, event.select.raw() as _)?;
        }

        self.state = State::Running;
        tracing::debug!(core = self.core, fixed = %format_args!("{:#x}", self.fixed.0), "counters started");
        Ok(())
    }

    /// Current value of fixed counter `index`.
    #[inline]
    pub fn sample_fixed(&self, index: usize) -> Result<u64> {
        self.check(Kind::Fixed, index)?;
        Ok(reader::read_fixed(index as _))
    }

    /// Current value of programmable counter `index`.
    #[inline]
    pub fn sample_programmable(&self, index: usize) -> Result<u64> {
        self.check(Kind::Programmable, index)?;
        Ok(reader::read_programmable(index as _))
    }

    /// Fenced time-stamp counter.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        reader::read_tsc()
    }

    /// Raw `IA32_PERF_GLOBAL_STATUS`, see [`OverflowStatus`].
    pub fn overflow_status(&self) -> Result<u64> {
        let msr = self.device("overflow_status")?;
        msr.read(IA32_PERF_GLOBAL_STATUS).map_err(|source| {
            tracing::warn!(reg = %format_args!("{IA32_PERF_GLOBAL_STATUS:#x}"), %source, "register read failed");
            Error::Register {
                op: RegisterOp::Read,
                reg: IA32_PERF_GLOBAL_STATUS,
                source,
            }
        })
    }

    /// Whether counter `index` of `kind` overflowed since the last reset.
    pub fn counter_overflowed(&self, kind: Kind, index: usize) -> Result<bool> {
        let status = OverflowStatus(self.overflow_status()?);
        Ok(status.overflowed(kind, index))
    }

    /// Reads every counter and the overflow flags.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let reading = self.read()?;
        let overflow = OverflowStatus(self.overflow_status()?);
        Ok(Snapshot {
            core: self.core,
            channels: self.channels(),
            reading,
            overflow,
        })
    }

    fn device(&self, op: &'static str) -> Result<&M> {
        match (&self.msr, self.state) {
            (Some(msr), State::Stopped | State::Running) => Ok(msr),
            _ => Err(Usage::NotReset(op).into()),
        }
    }

    #[inline]
    fn check(&self, kind: Kind, index: usize) -> Result<()> {
        if self.state == State::Idle {
            return Err(Usage::NotReset("sampling").into());
        }
        let limit = match kind {
            Kind::Fixed => FIXED_COUNTERS,
            Kind::Programmable => self.counters.len(),
        };
        if index >= limit {
            return Err(Usage::CounterIndex { kind, index, limit }.into());
        }
        Ok(())
    }
}

fn write<M: Msr>(msr: &M, reg: u32, value: u64) -> Result<()> {
    tracing::trace!(reg = %format_args!("{reg:#x}"), value = %format_args!("{value:#x}"), "wrmsr");
    msr.write(reg, value).map_err(|source| {
        tracing::warn!(reg = %format_args!("{reg:#x}"), %source, "register write failed");
        Error::Register {
            op: RegisterOp::Write,
            reg,
            source,
        }
    })
}

impl<M: Msr> Source for Pmu<M> {
    fn channels(&self) -> Vec<Channel> {
        let fixed = FIXED_LABELS
            .iter()
            .map(|&(mnemonic, description)| Channel::new(mnemonic, description));
        let programmable = self
            .counters
            .iter()
            .enumerate()
            .map(|(i, e)| Channel::new(format!("P{i}"), e.description.clone()));

        std::iter::once(Channel::new("R0", "rdtsc cycles"))
            .chain(fixed)
            .chain(programmable)
            .collect()
    }

    fn read(&self) -> Result<Reading> {
        if self.state == State::Idle {
            return Err(Usage::NotReset("sampling").into());
        }
        let tsc = reader::read_tsc();
        let fixed: ArrayVec<u64, FIXED_COUNTERS> =
            (0..FIXED_COUNTERS as u32).map(reader::read_fixed).collect();
        let programmable = (0..self.counters.len() as u32)
            .map(reader::read_programmable)
            .collect();
        Ok(Reading {
            tsc,
            fixed,
            programmable,
        })
    }
}
