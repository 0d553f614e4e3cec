use std::convert::Infallible;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::event::select::Field;

pub type Result<T> = std::result::Result<T, Error>;

/// Error class, see [`Error::kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid counter configuration, detected before touching hardware.
    Configuration,
    /// The register access device is missing, unopenable, or the thread
    /// could not be pinned.
    Device,
    /// A single register read or write failed after the device was opened.
    Io,
    /// The API was called out of sequence or with invalid arguments.
    Usage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open register device `{}`: {source}", path.display())]
    Device {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot pin thread to core {cpu}: {source}")]
    Affinity {
        cpu: u32,
        #[source]
        source: io::Error,
    },

    #[error("{op} of register {reg:#x} failed: {source}")]
    Register {
        op: RegisterOp,
        reg: u32,
        #[source]
        source: io::Error,
    },

    #[error("usage error: {0}")]
    Usage(#[from] Usage),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Device { .. } | Self::Affinity { .. } => ErrorKind::Device,
            Self::Register { .. } => ErrorKind::Io,
            Self::Usage(_) => ErrorKind::Usage,
        }
    }
}

impl From<Infallible> for Error {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("value {value:#x} does not fit the {width}-bit `{field}` field")]
    FieldWidth {
        field: Field,
        value: u64,
        width: u32,
    },

    #[error("event select word {0:#x} is wider than 32 bits")]
    WordWidth(u64),

    #[error("no programmable counters configured")]
    NoCounters,

    #[error("{count} programmable counters requested, at most {max} supported")]
    TooManyCounters { count: usize, max: usize },

    #[error("programmable counter {index} has a zero event select word")]
    ZeroCounter { index: usize },

    #[error("programmable counters {first} and {second} share event select word {word:#x}")]
    DuplicateCounter {
        first: usize,
        second: usize,
        word: u32,
    },

    #[error("unknown preset `{0}`")]
    UnknownPreset(String),

    #[error("malformed event select `{0}`")]
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Usage {
    #[error("`reset` must succeed before `{0}`")]
    NotReset(&'static str),

    #[error("{kind} counter {index} is outside the {limit} available")]
    CounterIndex {
        kind: crate::count::Kind,
        index: usize,
        limit: usize,
    },

    #[error("iteration count must be positive")]
    ZeroIterations,

    #[error("no samples recorded")]
    NoSamples,

    #[error("source reports {got} channels, expected {expected}")]
    ChannelMismatch { expected: usize, got: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOp {
    Read,
    Write,
}

impl std::fmt::Display for RegisterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}
