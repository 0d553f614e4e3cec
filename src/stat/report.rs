use std::fmt;

use super::{Channel, SampleSet, Stats};

impl Stats {
    /// Mnemonic to description table of every channel.
    pub fn legend(&self) -> Legend<'_> {
        Legend(&self.channels)
    }

    /// One row of raw deltas per sample.
    pub fn dump(&self) -> Dump<'_> {
        Dump {
            stats: self,
            scaled: false,
        }
    }

    /// One row per sample, each delta divided by the sample's iterations.
    pub fn dump_scaled(&self) -> Dump<'_> {
        Dump {
            stats: self,
            scaled: true,
        }
    }
}

pub struct Legend<'a>(&'a [Channel]);

impl fmt::Display for Legend<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            writeln!(f, "{:<3} {}", c.mnemonic, c.description)?;
        }
        Ok(())
    }
}

pub struct Dump<'a> {
    stats: &'a Stats,
    scaled: bool,
}

impl Dump<'_> {
    fn row(&self, f: &mut fmt::Formatter<'_>, index: usize, sample: &SampleSet) -> fmt::Result {
        write!(
            f,
            "{:>4} {:<32} {:>12}",
            index, sample.description, sample.iterations
        )?;
        for value in sample.values() {
            if self.scaled {
                write!(f, " {:>16.3}", value as f64 / sample.iterations as f64)?;
            } else {
                write!(f, " {:>16}", value)?;
            }
        }
        writeln!(f)
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} {:<32} {:>12}", "#", "description", "iterations")?;
        for c in self.stats.channels() {
            write!(f, " {:>16}", c.mnemonic)?;
        }
        writeln!(f)?;

        for (i, sample) in self.stats.samples().iter().enumerate() {
            self.row(f, i, sample)?;
        }
        Ok(())
    }
}
