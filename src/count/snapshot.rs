use std::fmt;

use super::{Kind, OverflowStatus};
use crate::stat::{Channel, Reading};

/// Absolute counter values and overflow flags at one point in time.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub core: u32,
    /// `R0`, the fixed counters and the programmable counters, in order.
    pub channels: Vec<Channel>,
    pub reading: Reading,
    pub overflow: OverflowStatus,
}

impl Snapshot {
    /// Formats the snapshot under a heading.
    pub fn labelled<'a>(&'a self, label: &'a str) -> impl fmt::Display + 'a {
        Labelled { label, snapshot: self }
    }
}

struct Labelled<'a> {
    label: &'a str,
    snapshot: &'a Snapshot,
}

impl fmt::Display for Labelled<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.label)?;
        fmt::Display::fmt(self.snapshot, f)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Intel PMU snapshot on HW core {}:", self.core)?;

        let r = &self.reading;
        let counters = r
            .fixed
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, self.overflow.overflowed(Kind::Fixed, i)))
            .chain(
                r.programmable
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (v, self.overflow.overflowed(Kind::Programmable, i))),
            );

        let mut channels = self.channels.iter();
        if let Some(c) = channels.next() {
            writeln!(f, "{:<3} [{:<48}]: value: {:012}", c.mnemonic, c.description, r.tsc)?;
        }
        for (c, (value, overflowed)) in channels.zip(counters) {
            writeln!(
                f,
                "{:<3} [{:<48}]: value: {:012}, overflowed: {}",
                c.mnemonic, c.description, value, overflowed
            )?;
        }
        Ok(())
    }
}
