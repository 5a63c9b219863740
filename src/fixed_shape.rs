//! Hand-coded fixed-shape probes that predate the interpreter: scatter,
//! alignment, intervals, find-fat, open-au, plus the linear-regression
//! reducer and humanised formatter they share. These call `Device` directly
//! and never build an operator tree (spec §4.5: "none of these are part of
//! the core").

use crate::device::Device;
use crate::error::CoreError;

/// Ordinary least-squares slope and intercept over `(x, y)` samples.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    assert_eq!(xs.len(), ys.len());
    let n = xs.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x).powi(2);
    }
    if var == 0.0 {
        return (0.0, mean_y);
    }
    let slope = cov / var;
    (slope, mean_y - slope * mean_x)
}

/// A human-readable byte count (`1.5 MiB`), independent of the interpreter's
/// own `Value`-based `format()` in `value.rs` — this one serves the driver's
/// plain-text reports and is free to use a different width convention.
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}{}", UNITS[0])
    } else {
        format!("{value:.2}{}", UNITS[unit])
    }
}

/// A human-readable throughput (`12.30 MB/s`).
pub fn humanize_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KB/s", "MB/s", "GB/s", "TB/s"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

/// One `(offset, elapsed_ns)` sample.
pub struct Sample {
    pub offset: u64,
    pub ns: i64,
}

/// Sweep `2^order` blocks of `blocksize` bytes, `span` blocks apart, timing a
/// read of each. Output convention (tab-separated `block_index *
/// blocksize_MiB` and `ns / 1e6`) is the driver's to print; this returns the
/// raw samples so callers can format to spec.md §6.3's exact text.
pub fn scatter(dev: &mut Device, order: u32, span: u32, blocksize: u64) -> Result<Vec<Sample>, CoreError> {
    let count = 1u32 << order;
    let mut samples = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = (i as u64) * (span as u64) * blocksize;
        let ns = dev.time_read(offset, blocksize as usize)?;
        samples.push(Sample { offset, ns });
    }
    Ok(samples)
}

/// Probe read latency at a fixed small set of sub-block offsets to find the
/// device's internal read-cache / alignment granularity.
pub fn alignment(dev: &mut Device, blocksize: u64) -> Result<Vec<Sample>, CoreError> {
    const OFFSETS: [u64; 8] = [0, 512, 1024, 2048, 4096, 8192, 16384, 32768];
    let mut samples = Vec::with_capacity(OFFSETS.len());
    for &delta in &OFFSETS {
        let ns = dev.time_read(delta, blocksize as usize)?;
        samples.push(Sample { offset: delta, ns });
    }
    let _ = blocksize;
    Ok(samples)
}

/// Probe read latency at geometrically increasing offset intervals to find
/// the erase-unit size.
pub fn intervals(dev: &mut Device, order: u32, blocksize: u64) -> Result<Vec<Sample>, CoreError> {
    let mut samples = Vec::with_capacity(order as usize);
    for i in 0..order {
        let offset = blocksize << i;
        let ns = dev.time_read(offset, blocksize as usize)?;
        samples.push(Sample { offset, ns });
    }
    Ok(samples)
}

/// Probe the first `fat_nr` candidate FAT-region blocks at the start of the
/// device, where the controller often provides different random-write
/// behavior (see GLOSSARY "FAT region").
pub fn find_fat(dev: &mut Device, fat_nr: u32, blocksize: u64) -> Result<Vec<Sample>, CoreError> {
    let mut samples = Vec::with_capacity(fat_nr as usize);
    for i in 0..fat_nr {
        let offset = (i as u64) * blocksize;
        let ns = dev.time_write(offset, blocksize as usize, crate::device::WriteBuf::Rand)?;
        samples.push(Sample { offset, ns });
    }
    Ok(samples)
}

/// Write to `open_au_nr` widely separated regions in round-robin to probe
/// how many allocation units the controller keeps open concurrently without
/// an expensive context switch (see GLOSSARY "Open AU").
pub fn open_au(dev: &mut Device, open_au_nr: u32, erasesize: u64) -> Result<Vec<Sample>, CoreError> {
    let size = dev.size().max(erasesize * open_au_nr as u64);
    let stride = size / open_au_nr.max(1) as u64;
    let mut samples = Vec::with_capacity(open_au_nr as usize);
    for i in 0..open_au_nr {
        let offset = (i as u64) * stride;
        let ns = dev.time_write(offset, erasesize.min(crate::device::MAX_BUF as u64) as usize, crate::device::WriteBuf::Zero)?;
        samples.push(Sample { offset, ns });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_recovers_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let (slope, intercept) = linear_regression(&xs, &ys);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn regression_handles_single_point() {
        let (slope, intercept) = linear_regression(&[5.0], &[9.0]);
        assert_eq!(slope, 0.0);
        assert_eq!(intercept, 9.0);
    }

    #[test]
    fn humanize_bytes_picks_unit() {
        assert_eq!(humanize_bytes(512), "512B");
        assert_eq!(humanize_bytes(2048), "2.00KiB");
        assert_eq!(humanize_bytes(1024 * 1024 * 3), "3.00MiB");
    }

    #[test]
    fn humanize_rate_picks_unit() {
        assert_eq!(humanize_rate(999.0), "999.00B/s");
        assert_eq!(humanize_rate(1_500_000.0), "1.50MB/s");
    }
}
