//! Direct Intel PMU counter programming through model specific registers.
//!
//! ## Example
//!
//! Count retired branches of a loop on the current core, then summarize a few
//! runs per iteration.
//!
//! ```rust,no_run
//! use std::time::Instant;
//!
//! use intel_pmu::config::Opts;
//! use intel_pmu::count::Pmu;
//! use intel_pmu::event::preset::Preset;
//! use intel_pmu::stat::Stats;
//!
//! // Pins the thread to its current core; needs root and the `msr` module.
//! let mut pmu = Pmu::new(Preset::Branches, Opts::default()).unwrap();
//! pmu.reset().unwrap(); // Zero every counter.
//! pmu.start().unwrap(); // Program the event selects.
//!
//! let mut stats = Stats::new(&pmu).unwrap();
//! for n in [10_000u64, 100_000] {
//!     let start = Instant::now();
//!     for i in 0..n {
//!         std::hint::black_box(i);
//!     }
//!     let end = Instant::now();
//!     stats.record(&pmu, format!("loop {n}"), n, start, end).unwrap();
//! }
//!
//! print!("{}", stats.legend());
//! print!("{}", stats.dump_scaled());
//! print!("{}", stats.summary("loop").unwrap());
//! ```
//!
//! ## Requirements
//!
//! Only x86-64 Linux is supported. Programming the counters goes through
//! `/dev/cpu/<N>/msr`, which needs the `msr` kernel module and `CAP_SYS_RAWIO`.
//! Reading them uses `rdpmc`, which user space may execute only while
//! `/sys/bus/event_source/devices/cpu/rdpmc` allows it.
//!
//! Nothing arbitrates with other PMU users such as `perf` or the NMI
//! watchdog: a session overwrites whatever they programmed.

#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
compile_error!("intel-pmu supports x86_64 Linux only");

pub mod config;
pub mod count;
pub mod error;
pub mod event;
mod ffi;
pub mod stat;
