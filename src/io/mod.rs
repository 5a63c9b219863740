pub mod aligned_buf;
pub mod platform;
