use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use super::msr::*;
use super::{global_mask, Kind, OverflowStatus, Pmu, Snapshot, State};
use crate::config::{Opts, Smt};
use crate::error::{ConfigError, Error, ErrorKind, RegisterOp, Result, Usage};
use crate::event::fixed::FixedCtrl;
use crate::event::preset::Preset;
use crate::event::{Arch, CounterSet, Event};
use crate::stat::{Reading, Source};

thread_local! {
    static WRITES: RefCell<Vec<(u32, u64)>> = const { RefCell::new(Vec::new()) };
    static REGS: RefCell<HashMap<u32, u64>> = RefCell::new(HashMap::new());
    static OPENS: Cell<usize> = const { Cell::new(0) };
    static FAIL_OPEN: Cell<bool> = const { Cell::new(false) };
    static FAIL_REG: Cell<Option<u32>> = const { Cell::new(None) };
}

// Register backend recording every access of the current test thread.
struct FakeMsr;

impl Msr for FakeMsr {
    fn open(cpu: u32, dir: &Path) -> Result<Self> {
        if FAIL_OPEN.get() {
            return Err(Error::Device {
                path: dir.join(cpu.to_string()).join("msr"),
                source: io::ErrorKind::PermissionDenied.into(),
            });
        }
        OPENS.set(OPENS.get() + 1);
        Ok(FakeMsr)
    }

    fn read(&self, reg: u32) -> io::Result<u64> {
        Ok(REGS.with_borrow(|r| r.get(&reg).copied().unwrap_or(0)))
    }

    fn write(&self, reg: u32, value: u64) -> io::Result<()> {
        if FAIL_REG.get() == Some(reg) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        WRITES.with_borrow_mut(|w| w.push((reg, value)));
        REGS.with_borrow_mut(|r| {
            r.insert(reg, value);
            // Write-1-to-clear, as on hardware.
            if reg == IA32_PERF_GLOBAL_OVF_CTRL {
                if let Some(status) = r.get_mut(&IA32_PERF_GLOBAL_STATUS) {
                    *status &= !value;
                }
            }
        });
        Ok(())
    }
}

fn opts(smt: Smt) -> Opts {
    Opts {
        pin: false,
        smt,
        ..Default::default()
    }
}

fn session(counters: impl Into<CounterSet>) -> Pmu<FakeMsr> {
    Pmu::with_msr(counters.into(), opts(Smt::On)).unwrap()
}

fn take_writes() -> Vec<(u32, u64)> {
    WRITES.with_borrow_mut(std::mem::take)
}

#[test]
fn test_reset_sequence() {
    let mut pmu = session(Preset::Branches);
    pmu.reset().unwrap();

    let expected = vec![
        (IA32_PERF_GLOBAL_CTRL, 0),
        (IA32_PERFEVTSEL0, 0),
        (IA32_PERFEVTSEL0 + 1, 0),
        (IA32_FIXED_CTR_CTRL, 0),
        (IA32_PMC0, 0),
        (IA32_PMC0 + 1, 0),
        (IA32_FIXED_CTR0, 0),
        (IA32_FIXED_CTR0 + 1, 0),
        (IA32_FIXED_CTR0 + 2, 0),
        (IA32_PERF_GLOBAL_OVF_CTRL, 0x7_0000_00ff),
        (IA32_PERF_GLOBAL_CTRL, 0x7_0000_0003),
    ];
    assert_eq!(take_writes(), expected);
    assert_eq!(pmu.state(), State::Stopped);
}

#[test]
fn test_start_writes_selects() {
    let mut pmu = session(Preset::Default);
    pmu.reset().unwrap();
    take_writes();

    pmu.start().unwrap();
    assert_eq!(
        take_writes(),
        [
            (IA32_FIXED_CTR_CTRL, 0x222),
            (IA32_PERFEVTSEL0, 0x41003c),
            (IA32_PERFEVTSEL0 + 1, 0x4100c0),
            (IA32_PERFEVTSEL0 + 2, 0x414f2e),
            (IA32_PERFEVTSEL0 + 3, 0x41412e),
        ]
    );
    assert_eq!(pmu.state(), State::Running);

    // A second reset stops counting again.
    pmu.reset().unwrap();
    assert_eq!(pmu.state(), State::Stopped);
    assert_eq!(take_writes().first(), Some(&(IA32_PERF_GLOBAL_CTRL, 0)));
}

#[test]
fn test_fixed_config_applies_on_start() {
    let mut pmu = session(Arch::Instr);
    pmu.set_fixed_config(FixedCtrl::ring(true, true));
    pmu.reset().unwrap();
    pmu.start().unwrap();
    assert!(take_writes().contains(&(IA32_FIXED_CTR_CTRL, 0x333)));
    assert_eq!(pmu.fixed_config(), FixedCtrl(0x333));
}

#[test]
fn test_device_opened_once() {
    OPENS.set(0);
    let mut pmu = session(Arch::Instr);
    assert_eq!(OPENS.get(), 0);
    pmu.reset().unwrap();
    pmu.reset().unwrap();
    pmu.start().unwrap();
    assert_eq!(OPENS.get(), 1);
}

#[test]
fn test_start_before_reset() {
    let mut pmu = session(Arch::Instr);
    let err = pmu.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(matches!(err, Error::Usage(Usage::NotReset("start"))));
    assert!(take_writes().is_empty());
}

#[test]
fn test_sampling_before_reset() {
    let pmu = session(Arch::Instr);
    assert!(matches!(
        pmu.sample_fixed(0),
        Err(Error::Usage(Usage::NotReset(_)))
    ));
    assert!(matches!(
        pmu.sample_programmable(0),
        Err(Error::Usage(Usage::NotReset(_)))
    ));
    assert!(matches!(pmu.read(), Err(Error::Usage(_))));
    assert!(matches!(pmu.overflow_status(), Err(Error::Usage(_))));
}

#[test]
fn test_sample_index_out_of_range() {
    let mut pmu = session(Preset::Branches);
    pmu.reset().unwrap();
    assert!(matches!(
        pmu.sample_programmable(2),
        Err(Error::Usage(Usage::CounterIndex {
            kind: Kind::Programmable,
            index: 2,
            limit: 2
        }))
    ));
    assert!(matches!(
        pmu.sample_fixed(3),
        Err(Error::Usage(Usage::CounterIndex {
            kind: Kind::Fixed,
            ..
        }))
    ));
}

#[test]
fn test_open_failure_is_device_error() {
    FAIL_OPEN.set(true);
    let mut pmu = session(Arch::Instr);
    let err = pmu.reset().unwrap_err();
    FAIL_OPEN.set(false);

    assert_eq!(err.kind(), ErrorKind::Device);
    assert_eq!(pmu.state(), State::Idle);
    assert!(matches!(pmu.start(), Err(Error::Usage(_))));
}

#[test]
fn test_register_failure_is_not_retried() {
    let mut pmu = session(Preset::Default);
    FAIL_REG.set(Some(IA32_PMC0 + 2));
    let err = pmu.reset().unwrap_err();
    FAIL_REG.set(None);

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(matches!(
        err,
        Error::Register {
            op: RegisterOp::Write,
            reg,
            ..
        } if reg == IA32_PMC0 + 2
    ));
    // Stops at the failing register.
    let writes = take_writes();
    assert_eq!(writes.last(), Some(&(IA32_PMC0 + 1, 0)));
    assert_eq!(writes.iter().filter(|w| w.0 == IA32_PMC0 + 2).count(), 0);
    assert_eq!(pmu.state(), State::Idle);
}

#[test]
fn test_overflow_status_register() {
    let mut pmu = session(Preset::Branches);
    pmu.reset().unwrap();
    REGS.with_borrow_mut(|r| r.insert(IA32_PERF_GLOBAL_STATUS, 1 << 33 | 1 << 1));

    assert_eq!(pmu.overflow_status().unwrap(), 0x2_0000_0002);
    assert!(pmu.counter_overflowed(Kind::Fixed, 1).unwrap());
    assert!(pmu.counter_overflowed(Kind::Programmable, 1).unwrap());
    assert!(!pmu.counter_overflowed(Kind::Fixed, 0).unwrap());
    assert!(!pmu.counter_overflowed(Kind::Programmable, 0).unwrap());
    REGS.with_borrow_mut(|r| r.remove(&IA32_PERF_GLOBAL_STATUS));
}

#[test]
fn test_reset_clears_flags_of_unused_counters() {
    let mut pmu = session(Preset::Branches);
    REGS.with_borrow_mut(|r| r.insert(IA32_PERF_GLOBAL_STATUS, 1 << 34 | 1 << 7 | 1 << 5 | 1));
    pmu.reset().unwrap();

    assert_eq!(pmu.overflow_status().unwrap(), 0);
    assert!(!pmu.counter_overflowed(Kind::Programmable, 5).unwrap());
    assert!(!pmu.counter_overflowed(Kind::Programmable, 7).unwrap());
    assert!(!pmu.counter_overflowed(Kind::Fixed, 2).unwrap());
    REGS.with_borrow_mut(|r| r.remove(&IA32_PERF_GLOBAL_STATUS));
}

#[test]
fn test_overflow_bit_mapping() {
    let status = OverflowStatus(0x1);
    assert!(status.programmable(0));
    for i in 1..8 {
        assert!(!status.programmable(i));
    }
    for i in 0..3 {
        assert!(!status.fixed(i));
    }
    assert!(status.any());

    let status = OverflowStatus(1 << 32 | 1 << 34);
    assert!(status.overflowed(Kind::Fixed, 0));
    assert!(!status.overflowed(Kind::Fixed, 1));
    assert!(status.overflowed(Kind::Fixed, 2));
    assert!(!status.overflowed(Kind::Programmable, 0));

    assert!(!OverflowStatus(1 << 62).any());
    assert!(!OverflowStatus(u64::MAX).fixed(3));
}

#[test]
fn test_global_mask() {
    assert_eq!(global_mask(1), 0x7_0000_0001);
    assert_eq!(global_mask(4), 0x7_0000_000f);
    assert_eq!(global_mask(8), 0x7_0000_00ff);
}

#[test]
fn test_zero_counters_rejected() {
    let err = Pmu::<FakeMsr>::with_msr(CounterSet::new(), opts(Smt::Off))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, Error::Config(ConfigError::NoCounters)));
}

#[test]
fn test_smt_bounds_counter_count() {
    let words: Vec<u64> = (1..=6).map(|e| 0x410000 | e).collect();
    let counters = CounterSet::try_from(&words[..]).unwrap();

    let err = Pmu::<FakeMsr>::with_msr(counters.clone(), opts(Smt::On))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Config(ConfigError::TooManyCounters { count: 6, max: 4 })
    ));

    let mut pmu = Pmu::<FakeMsr>::with_msr(counters, opts(Smt::Off)).unwrap();
    assert_eq!(pmu.programmable_supported(), 8);
    assert_eq!(pmu.programmable_defined(), 6);
    pmu.reset().unwrap();
    assert_eq!(take_writes().last(), Some(&(IA32_PERF_GLOBAL_CTRL, 0x7_0000_003f)));
}

#[test]
fn test_construct_from_events() {
    let events = vec![
        Event::from(Arch::BranchInstr),
        Event::new("event=0xc5,usr,en".parse().unwrap(), "BR_MISP", "mispredicts"),
    ];
    let pmu = Pmu::<FakeMsr>::with_msr(events, opts(Smt::On)).unwrap();
    assert_eq!(pmu.counters()[1].select.raw(), 0x4100c5);
    assert_eq!(pmu.fixed_supported(), 3);
}

#[test]
fn test_channels() {
    let pmu = session(Preset::Branches);
    let channels = pmu.channels();
    let mnemonics: Vec<&str> = channels.iter().map(|c| c.mnemonic.as_ref()).collect();
    assert_eq!(mnemonics, ["R0", "F0", "F1", "F2", "P0", "P1"]);
    assert_eq!(channels[4].description, "branch instructions retired");
}

#[test]
fn test_msr_device_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut pmu = Pmu::new(Preset::Branches, Opts {
        device_dir: dir.path().to_owned(),
        ..opts(Smt::On)
    })
    .unwrap();

    let err = pmu.reset().unwrap_err();
    assert!(matches!(&err, Error::Device { path, .. } if path.starts_with(dir.path())));

    let core_dir = dir.path().join(pmu.core().to_string());
    fs::create_dir(&core_dir).unwrap();
    File::create(core_dir.join("msr")).unwrap();
    pmu.reset().unwrap();

    let file = File::open(core_dir.join("msr")).unwrap();
    let mut buf = [0; 8];
    file.read_exact_at(&mut buf, IA32_PERF_GLOBAL_CTRL as _).unwrap();
    assert_eq!(u64::from_le_bytes(buf), 0x7_0000_0003);
}

#[test]
fn test_msr_device_short_read() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("0")).unwrap();
    File::create(dir.path().join("0").join("msr")).unwrap();

    let msr = MsrDevice::open(0, dir.path()).unwrap();
    assert_eq!(msr.path(), dir.path().join("0").join("msr"));
    assert_eq!(
        msr.read(IA32_PERF_GLOBAL_STATUS).unwrap_err().kind(),
        io::ErrorKind::UnexpectedEof
    );
    msr.write(0x10, 0xdead_beef).unwrap();
    assert_eq!(msr.read(0x10).unwrap(), 0xdead_beef);
}

#[test]
fn test_snapshot_display() {
    let pmu = session(Preset::Branches);
    let snapshot = Snapshot {
        core: 3,
        channels: pmu.channels(),
        reading: Reading {
            tsc: 99,
            fixed: [1, 2, 3].into_iter().collect(),
            programmable: [40, 50].into_iter().collect(),
        },
        overflow: OverflowStatus(1 << 1),
    };

    let text = snapshot.labelled("end").to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "end: Intel PMU snapshot on HW core 3:");
    assert!(lines[1].starts_with("R0  [rdtsc cycles"));
    assert!(lines[1].ends_with("value: 000000000099"));
    assert!(lines[2].ends_with("value: 000000000001, overflowed: false"));
    assert!(lines[5].ends_with("value: 000000000040, overflowed: false"));
    assert!(lines[6].ends_with("value: 000000000050, overflowed: true"));
}
