//! Device I/O layer: direct, synchronous, no-atime access to a raw block
//! device or image file, plus the page-aligned buffers every timed primitive
//! reads from or writes into.

use std::ffi::CString;
use std::os::fd::RawFd;
use std::time::Instant;

use crate::error::CoreError;
use crate::io::aligned_buf::{alloc_aligned, alloc_aligned_filled, AlignedBuf};
use crate::io::platform::{
    configure_direct_io, direct_open_flags, discard_range, try_set_realtime_priority,
};

/// Largest single transfer this device will time. Buffers are sized to this
/// up front so no allocation happens inside a measurement window.
pub const MAX_BUF: usize = 64 * 1024 * 1024;

/// Which pre-filled write buffer a `time_write` call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBuf {
    Zero,
    One,
    Rand,
}

/// An open target device: a raw fd plus the buffers every primitive reuses.
///
/// `size` is fixed at open time. All positions passed to the timed
/// primitives are taken modulo `size`, so callers (the interpreter's
/// iterators in particular) can overshoot without bounds-checking.
pub struct Device {
    fd: RawFd,
    size: u64,
    read_buf: AlignedBuf,
    write_zero: AlignedBuf,
    write_one: AlignedBuf,
    write_rand: AlignedBuf,
}

impl Device {
    /// Open `path` with direct, synchronous, no-atime semantics, seek to the
    /// end to learn its size, and allocate the four page-aligned buffers.
    ///
    /// Best-effort elevation to realtime FIFO priority is attempted; failure
    /// there is a warning, not fatal (spec §4.1, §7).
    pub fn open(path: &str) -> Result<Self, CoreError> {
        try_set_realtime_priority();

        let c_path = CString::new(path)
            .map_err(|_| CoreError::Io(std::io::Error::from(std::io::ErrorKind::InvalidInput)))?;
        let flags = direct_open_flags();
        let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
        if fd < 0 {
            return Err(CoreError::Io(std::io::Error::last_os_error()));
        }
        if let Err(e) = configure_direct_io(fd) {
            unsafe { libc::close(fd) };
            return Err(CoreError::Io(e));
        }

        let size = unsafe { libc::lseek(fd, 0, libc::SEEK_END) };
        if size < 0 {
            unsafe { libc::close(fd) };
            return Err(CoreError::Io(std::io::Error::last_os_error()));
        }

        Ok(Self {
            fd,
            size: size as u64,
            read_buf: alloc_aligned(MAX_BUF),
            write_zero: alloc_aligned_filled(MAX_BUF, 0x00),
            write_one: alloc_aligned_filled(MAX_BUF, 0xFF),
            write_rand: alloc_aligned_filled(MAX_BUF, 0x5A),
        })
    }

    /// Device/file size in bytes, as recorded at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn wrapped(&self, pos: u64) -> u64 {
        if self.size == 0 {
            0
        } else {
            pos % self.size
        }
    }

    /// Read `size` bytes at `pos % self.size`, timing the wall-clock elapsed.
    ///
    /// Retries on short reads until satisfied or a non-transient error
    /// occurs. `size` must be at most [`MAX_BUF`].
    pub fn time_read(&mut self, pos: u64, size: usize) -> Result<i64, CoreError> {
        if size > MAX_BUF {
            return Err(CoreError::TooBig(size, MAX_BUF));
        }
        let pos = self.wrapped(pos);
        let start = Instant::now();

        let mut done = 0usize;
        while done < size {
            let ret = unsafe {
                libc::pread(
                    self.fd,
                    self.read_buf[done..size].as_mut_ptr() as *mut libc::c_void,
                    size - done,
                    (pos + done as u64) as libc::off_t,
                )
            };
            if ret < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    continue;
                }
                return Err(CoreError::Io(err));
            }
            if ret == 0 {
                break;
            }
            done += ret as usize;
        }

        Ok(start.elapsed().as_nanos() as i64)
    }

    /// Write `size` bytes from buffer `which` at `pos % self.size`, timing
    /// the wall-clock elapsed. The data itself is never validated back — only
    /// its timing is the measurement (spec §1 Non-goals).
    pub fn time_write(&mut self, pos: u64, size: usize, which: WriteBuf) -> Result<i64, CoreError> {
        if size > MAX_BUF {
            return Err(CoreError::TooBig(size, MAX_BUF));
        }
        let pos = self.wrapped(pos);
        let buf = match which {
            WriteBuf::Zero => &self.write_zero,
            WriteBuf::One => &self.write_one,
            WriteBuf::Rand => &self.write_rand,
        };
        let start = Instant::now();

        let mut done = 0usize;
        while done < size {
            let ret = unsafe {
                libc::pwrite(
                    self.fd,
                    buf[done..size].as_ptr() as *const libc::c_void,
                    size - done,
                    (pos + done as u64) as libc::off_t,
                )
            };
            if ret < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    continue;
                }
                return Err(CoreError::Io(err));
            }
            if ret == 0 {
                break;
            }
            done += ret as usize;
        }

        Ok(start.elapsed().as_nanos() as i64)
    }

    /// Issue a discard (TRIM) for `[pos % size, pos % size + size)`, timing
    /// the wall-clock elapsed.
    pub fn time_erase(&mut self, pos: u64, size: u64) -> Result<i64, CoreError> {
        let pos = self.wrapped(pos);
        let start = Instant::now();
        discard_range(self.fd, pos, size)?;
        Ok(start.elapsed().as_nanos() as i64)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Issue a single discard for `[start, start + length)` without going
/// through the interpreter — the interface the standalone erase-only
/// utility (spec §1, §4.1) is built on.
pub fn discard_once(path: &str, start: u64, length: u64) -> Result<(), CoreError> {
    let c_path = CString::new(path)
        .map_err(|_| CoreError::Io(std::io::Error::from(std::io::ErrorKind::InvalidInput)))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc_direct_flag()) };
    if fd < 0 {
        return Err(CoreError::Io(std::io::Error::last_os_error()));
    }
    let result = discard_range(fd, start, length);
    unsafe { libc::close(fd) };
    result.map_err(CoreError::Io)
}

#[cfg(target_os = "linux")]
fn libc_direct_flag() -> libc::c_int {
    libc::O_DIRECT
}

#[cfg(not(target_os = "linux"))]
fn libc_direct_flag() -> libc::c_int {
    0
}
