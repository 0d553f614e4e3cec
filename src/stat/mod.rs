//! Min/max/avg statistics over repeated counter measurements.
//!
//! ```no_run
//! use std::time::Instant;
//!
//! use intel_pmu::config::Opts;
//! use intel_pmu::count::Pmu;
//! use intel_pmu::event::preset::Preset;
//! use intel_pmu::stat::Stats;
//!
//! let mut pmu = Pmu::new(Preset::Branches, Opts::default())?;
//! pmu.reset()?;
//! pmu.start()?;
//!
//! let mut stats = Stats::new(&pmu)?;
//! for n in [1_000u64, 10_000, 100_000] {
//!     let start = Instant::now();
//!     std::hint::black_box((0..n).sum::<u64>());
//!     let end = Instant::now();
//!     stats.record(&pmu, format!("sum {n}"), n, start, end)?;
//! }
//!
//! print!("{}", stats.legend());
//! print!("{}", stats.summary("sum loop")?);
//! # Ok::<(), intel_pmu::error::Error>(())
//! ```

mod report;
mod summary;


use std::borrow::Cow;
use std::time::Instant;

use arrayvec::ArrayVec;

use crate::error::{Result, Usage};
use crate::event::fixed::FIXED_COUNTERS;
use crate::event::MAX_PROGRAMMABLE;

pub use report::*;
pub use summary::*;

/// A labelled measurement channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    /// Short column name, such as `F0` or `P2`.
    pub mnemonic: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

impl Channel {
    pub fn new(
        mnemonic: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            description: description.into(),
        }
    }
}

/// Absolute counter values read at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub tsc: u64,
    pub fixed: ArrayVec<u64, FIXED_COUNTERS>,
    pub programmable: ArrayVec<u64, MAX_PROGRAMMABLE>,
}

impl Reading {
    fn width(&self) -> usize {
        1 + self.fixed.len() + self.programmable.len()
    }
}

/// Something that yields absolute counter readings, such as a started
/// [`Pmu`][crate::count::Pmu].
pub trait Source {
    /// Labels of the reading values: the time-stamp counter, then the fixed
    /// counters, then the programmable counters.
    fn channels(&self) -> Vec<Channel>;

    fn read(&self) -> Result<Reading>;
}

/// One recorded measurement: counter deltas since the previous record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleSet {
    pub description: String,
    pub iterations: u64,
    pub elapsed_ns: u64,
    pub tsc: u64,
    pub fixed: ArrayVec<u64, FIXED_COUNTERS>,
    pub programmable: ArrayVec<u64, MAX_PROGRAMMABLE>,
}

impl SampleSet {
    /// Raw values in channel order, elapsed nanoseconds last.
    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        std::iter::once(self.tsc)
            .chain(self.fixed.iter().copied())
            .chain(self.programmable.iter().copied())
            .chain(std::iter::once(self.elapsed_ns))
    }

    pub fn value(&self, channel: usize) -> Option<u64> {
        self.values().nth(channel)
    }
}

/// Collects [`SampleSet`]s and summarizes them per channel.
///
/// Deltas are plain wrapping differences: a counter that wraps during a
/// measurement is not corrected.
#[derive(Clone, Debug)]
pub struct Stats {
    channels: Vec<Channel>,
    last: Reading,
    samples: Vec<SampleSet>,
}

impl Stats {
    /// Starts collecting from `source`, taking its current values as baseline.
    pub fn new(source: &impl Source) -> Result<Self> {
        let last = source.read()?;
        let mut channels = source.channels();
        if channels.len() != last.width() {
            return Err(Usage::ChannelMismatch {
                expected: last.width(),
                got: channels.len(),
            }
            .into());
        }
        channels.push(Channel::new("NS", "elapsed wall-clock ns"));

        Ok(Self {
            channels,
            last,
            samples: vec![],
        })
    }

    /// Drops every sample and takes a new baseline.
    pub fn reset(&mut self, source: &impl Source) -> Result<()> {
        *self = Self::new(source)?;
        Ok(())
    }

    /// Reads `source` and records the deltas since the previous record as one
    /// sample covering `iterations` runs of the measured code between `start`
    /// and `end`.
    pub fn record(
        &mut self,
        source: &impl Source,
        description: impl Into<String>,
        iterations: u64,
        start: Instant,
        end: Instant,
    ) -> Result<()> {
        if iterations == 0 {
            return Err(Usage::ZeroIterations.into());
        }

        let now = source.read()?;
        if now.fixed.len() != self.last.fixed.len()
            || now.programmable.len() != self.last.programmable.len()
        {
            return Err(Usage::ChannelMismatch {
                expected: self.last.width(),
                got: now.width(),
            }
            .into());
        }

        let sample = SampleSet {
            description: description.into(),
            iterations,
            elapsed_ns: end.saturating_duration_since(start).as_nanos() as _,
            tsc: now.tsc.wrapping_sub(self.last.tsc),
            fixed: delta(&now.fixed, &self.last.fixed),
            programmable: delta(&now.programmable, &self.last.programmable),
        };
        tracing::trace!(
            description = %sample.description,
            iterations,
            tsc = sample.tsc,
            "recorded sample"
        );

        self.last = now;
        self.samples.push(sample);
        Ok(())
    }

    /// Channel labels, including the trailing elapsed time channel.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn samples(&self) -> &[SampleSet] {
        &self.samples
    }

    /// Per channel min/max/avg normalized by iteration count, see [`Summary`].
    pub fn summary(&self, label: impl Into<String>) -> Result<Summary> {
        if self.samples.is_empty() {
            return Err(Usage::NoSamples.into());
        }
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, channel)| {
                let stat = RunningStat::collect(
                    self.samples
                        .iter()
                        .map(|s| (s.value(i).unwrap_or(0), s.iterations)),
                );
                ChannelSummary::new(channel.clone(), &stat)
            })
            .collect();

        Ok(Summary {
            label: label.into(),
            samples: self.samples.len(),
            iterations: self.samples.iter().map(|s| s.iterations as u128).sum(),
            channels,
        })
    }
}

fn delta<const N: usize>(now: &[u64], last: &[u64]) -> ArrayVec<u64, N> {
    now.iter()
        .zip(last)
        .map(|(n, l)| n.wrapping_sub(*l))
        .collect()
}
