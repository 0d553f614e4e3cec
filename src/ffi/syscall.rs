use std::fs::File;
use std::io::{Error, ErrorKind, Result};
use std::mem;
use std::os::fd::AsRawFd;

pub fn pread_u64(file: &File, offset: u64) -> Result<u64> {
    let mut value = 0u64;
    let fd = file.as_raw_fd();
    let buf = &mut value as *mut u64 as _;
    let bytes = unsafe { libc::pread(fd, buf, mem::size_of::<u64>(), offset as _) };
    match bytes {
        -1 => Err(Error::last_os_error()),
        8 => Ok(value),
        _ => Err(ErrorKind::UnexpectedEof.into()),
    }
}

pub fn pwrite_u64(file: &File, offset: u64, value: u64) -> Result<()> {
    let fd = file.as_raw_fd();
    let buf = &value as *const u64 as _;
    let bytes = unsafe { libc::pwrite(fd, buf, mem::size_of::<u64>(), offset as _) };
    match bytes {
        -1 => Err(Error::last_os_error()),
        8 => Ok(()),
        _ => Err(ErrorKind::WriteZero.into()),
    }
}

pub fn sched_getcpu() -> Result<u32> {
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu != -1 {
        Ok(cpu as _)
    } else {
        Err(Error::last_os_error())
    }
}

// Pins the calling thread (pid 0) to `cpu` only.
pub fn sched_setaffinity(cpu: u32) -> Result<()> {
    let mut set = unsafe { mem::zeroed::<libc::cpu_set_t>() };
    unsafe { libc::CPU_SET(cpu as _, &mut set) };
    let result = unsafe { libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}
