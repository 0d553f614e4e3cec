use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ffi::syscall::{pread_u64, pwrite_u64};

// Intel SDM vol. 4, table 2-2 "IA-32 Architectural MSRs".
pub const IA32_PMC0: u32 = 0xc1;
pub const IA32_PERFEVTSEL0: u32 = 0x186;
pub const IA32_FIXED_CTR0: u32 = 0x309;
pub const IA32_FIXED_CTR_CTRL: u32 = 0x38d;
pub const IA32_PERF_GLOBAL_STATUS: u32 = 0x38e;
pub const IA32_PERF_GLOBAL_CTRL: u32 = 0x38f;
pub const IA32_PERF_GLOBAL_OVF_CTRL: u32 = 0x390;

/// Model specific register access for one logical core.
///
/// Every call is a single register access: it either completes or fails,
/// and a failure is not retried.
pub trait Msr: Sized {
    /// Opens the registers of logical core `cpu`, looking up devices under `dir`.
    fn open(cpu: u32, dir: &Path) -> Result<Self>;

    fn read(&self, reg: u32) -> io::Result<u64>;

    fn write(&self, reg: u32, value: u64) -> io::Result<()>;
}

/// The Linux `msr` driver device, `/dev/cpu/<N>/msr`.
///
/// Registers are addressed by file offset. Opening it needs `CAP_SYS_RAWIO`
/// and the `msr` kernel module.
#[derive(Debug)]
pub struct MsrDevice {
    file: File,
    path: PathBuf,
}

impl MsrDevice {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Msr for MsrDevice {
    fn open(cpu: u32, dir: &Path) -> Result<Self> {
        let path = dir.join(cpu.to_string()).join("msr");
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => {
                tracing::debug!(cpu, path = %path.display(), "opened register device");
                Ok(Self { file, path })
            }
            Err(source) => {
                tracing::warn!(cpu, path = %path.display(), %source, "cannot open register device");
                Err(Error::Device { path, source })
            }
        }
    }

    fn read(&self, reg: u32) -> io::Result<u64> {
        pread_u64(&self.file, reg as _)
    }

    fn write(&self, reg: u32, value: u64) -> io::Result<()> {
        pwrite_u64(&self.file, reg as _, value)
    }
}

impl Drop for MsrDevice {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "closing register device");
    }
}
