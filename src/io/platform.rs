use std::os::fd::RawFd;

/// Configure direct I/O on the given file descriptor.
///
/// - Linux: `O_DIRECT`/`O_SYNC`/`O_NOATIME` are all set at open time (see
///   `device.rs`). Nothing left to configure post-open.
/// - macOS (and other non-Linux unix): uses `fcntl(F_NOCACHE)` to disable the
///   buffer cache, since `O_DIRECT` doesn't exist there.
#[cfg(target_os = "macos")]
pub fn configure_direct_io(fd: RawFd) -> std::io::Result<()> {
    // F_NOCACHE = 48 on macOS
    let ret = unsafe { libc::fcntl(fd, libc::F_NOCACHE, 1) };
    if ret == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(target_os = "linux")]
pub fn configure_direct_io(_fd: RawFd) -> std::io::Result<()> {
    Ok(())
}

/// Open flags for read/write direct, synchronous, no-atime access.
#[cfg(target_os = "linux")]
pub fn direct_open_flags() -> libc::c_int {
    libc::O_RDWR | libc::O_DIRECT | libc::O_SYNC | libc::O_NOATIME
}

#[cfg(target_os = "macos")]
pub fn direct_open_flags() -> libc::c_int {
    libc::O_RDWR
}

/// `BLKDISCARD` ioctl request number (from `<linux/fs.h>`; not exposed by the
/// `libc` crate). Takes a `u64[2]` of `{start, length}` in bytes.
#[cfg(target_os = "linux")]
const BLKDISCARD: libc::c_ulong = 0x1277;

/// Issue a discard (TRIM) for `[start, start + length)` on `fd`.
#[cfg(target_os = "linux")]
pub fn discard_range(fd: RawFd, start: u64, length: u64) -> std::io::Result<()> {
    let range: [u64; 2] = [start, length];
    let ret = unsafe { libc::ioctl(fd, BLKDISCARD, range.as_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn discard_range(_fd: RawFd, _start: u64, _length: u64) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

/// Best-effort elevation to realtime FIFO scheduling, as the original tool
/// does before timing I/O. Failure is a warning, never fatal.
#[cfg(target_os = "linux")]
pub fn try_set_realtime_priority() {
    let param = libc::sched_param { sched_priority: 10 };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        eprintln!(
            "warning: sched_setscheduler(SCHED_FIFO) failed: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn try_set_realtime_priority() {}
