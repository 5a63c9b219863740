use aligned_vec::{AVec, ConstAlign};

/// Alignment required for O_DIRECT I/O and for the device's own buffers (4 KiB
/// covers the common page size on the platforms this tool targets).
pub const IO_ALIGN: usize = 4096;

pub type AlignedBuf = AVec<u8, ConstAlign<IO_ALIGN>>;

/// Create a new aligned buffer of `size` bytes, zeroed.
pub fn alloc_aligned(size: usize) -> AlignedBuf {
    AVec::from_iter(IO_ALIGN, std::iter::repeat_n(0u8, size))
}

/// Create a new aligned buffer of `size` bytes, filled with `byte`.
pub fn alloc_aligned_filled(size: usize, byte: u8) -> AlignedBuf {
    AVec::from_iter(IO_ALIGN, std::iter::repeat_n(byte, size))
}
