use std::fmt;

use super::Channel;

/// Extremes and totals of one channel over a sample history.
///
/// `min` and `max` keep the `(raw, iterations)` pair of the sample with the
/// smallest and largest raw value; the first sample wins ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunningStat {
    pub min: (u64, u64),
    pub max: (u64, u64),
    pub total: u128,
    pub iterations: u128,
    pub count: usize,
}

impl RunningStat {
    /// Folds `(raw, iterations)` pairs. Returns an empty stat for no input.
    pub fn collect(samples: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let mut samples = samples.into_iter();
        let Some(first) = samples.next() else {
            return Self {
                min: (0, 0),
                max: (0, 0),
                total: 0,
                iterations: 0,
                count: 0,
            };
        };

        let mut stat = Self {
            min: first,
            max: first,
            total: first.0 as _,
            iterations: first.1 as _,
            count: 1,
        };
        for (raw, iterations) in samples {
            if raw < stat.min.0 {
                stat.min = (raw, iterations);
            }
            if raw > stat.max.0 {
                stat.max = (raw, iterations);
            }
            stat.total += raw as u128;
            stat.iterations += iterations as u128;
            stat.count += 1;
        }
        stat
    }
}

fn per_iteration((raw, iterations): (u64, u64)) -> f64 {
    raw as f64 / iterations as f64
}

/// Normalized figures of one channel.
///
/// `min` is the raw-smallest sample divided by its own iteration count, and
/// `max` likewise for the raw-largest sample. Selection happens before
/// normalizing, so `min` can exceed `max` when iteration counts differ.
/// `avg` is the iteration weighted mean: total raw over total iterations.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelSummary {
    pub channel: Channel,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl ChannelSummary {
    pub fn new(channel: Channel, stat: &RunningStat) -> Self {
        if stat.count == 0 {
            return Self {
                channel,
                min: 0.0,
                max: 0.0,
                avg: 0.0,
            };
        }
        Self {
            channel,
            min: per_iteration(stat.min),
            max: per_iteration(stat.max),
            avg: stat.total as f64 / stat.iterations as f64,
        }
    }
}

/// Result of [`Stats::summary`][super::Stats::summary].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    pub label: String,
    pub samples: usize,
    pub iterations: u128,
    pub channels: Vec<ChannelSummary>,
}

impl Summary {
    pub fn channel(&self, mnemonic: &str) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.channel.mnemonic == mnemonic)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: Intel PMU summary on {} samples, {} iterations:",
            self.label, self.samples, self.iterations
        )?;
        for c in &self.channels {
            writeln!(
                f,
                "{:<3} [{:<48}]: min: {:>16.6}, max: {:>16.6}, avg: {:>16.6}",
                c.channel.mnemonic, c.channel.description, c.min, c.max, c.avg
            )?;
        }
        Ok(())
    }
}
