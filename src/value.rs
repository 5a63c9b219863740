//! The tagged-union result value carried by every operator, and the
//! formatting/reduction operations defined over it.

use crate::error::CoreError;
use crate::op::Aggregate;

/// A result produced by one operator invocation.
///
/// `Array` is always stored flattened, row-major: `items.len() ==
/// rows*max(cols,1)`. `cols == 0` means 1-D (a plain vector of `rows`
/// scalars); `cols > 0` means 2-D, `rows` rows of `cols` scalars each.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Ns(i64),
    Bytes(i64),
    Bps(i64),
    Str([u8; 7]),
    Array {
        items: Vec<Value>,
        rows: u32,
        cols: u32,
    },
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// A short tag used for homogeneity checks during aggregation and in
    /// error messages. Two values have the same `kind()` iff they may sit in
    /// the same `Array`.
    fn kind(&self) -> Option<&'static str> {
        match self {
            Value::None => None,
            Value::Ns(_) => Some("ns"),
            Value::Bytes(_) => Some("bytes"),
            Value::Bps(_) => Some("bps"),
            Value::Str(_) => Some("str"),
            Value::Array { .. } => Some("array"),
        }
    }
}

/// Render a fixed-point number as `<int>.<frac><unit>`, padded/truncated to
/// exactly 7 ASCII bytes. The decimal precision shrinks as the integer part
/// grows so the total width stays constant — this is what lets `format()`
/// promise a 7-character result across the full dynamic range of a
/// measurement instead of only near one magnitude.
fn fixed_width_7(value: f64, unit: &str) -> [u8; 7] {
    const WIDTH: usize = 7;
    let int_part = value.trunc().abs() as u64;
    let int_digits = if int_part == 0 {
        1
    } else {
        int_part.ilog10() as usize + 1
    };

    let mut s = if int_digits + unit.len() >= WIDTH {
        format!("{int_part}{unit}")
    } else {
        let decimals = WIDTH - unit.len() - int_digits - 1;
        format!("{value:.decimals$}{unit}")
    };

    if s.len() > WIDTH {
        s.truncate(WIDTH);
    }
    while s.len() < WIDTH {
        s.push(' ');
    }

    let mut out = [0u8; WIDTH];
    out.copy_from_slice(s.as_bytes());
    out
}

fn str_padded(s: &str) -> [u8; 7] {
    let mut out = [b' '; 7];
    let bytes = s.as_bytes();
    let n = bytes.len().min(7);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Format a duration in nanoseconds per spec: `ns` below 1us, `us` below 1ms
/// (three decimals), `ms` below 1s (three decimals), `s` above that (four
/// decimals). ASCII `us`, not `µs` — `Str` contents are required to be ASCII.
fn format_ns(ns: i64) -> [u8; 7] {
    let ns_f = ns as f64;
    if ns < 1_000 {
        str_padded(&format!("{ns}ns"))
    } else if ns < 1_000_000 {
        fixed_width_7(ns_f / 1e3, "us")
    } else if ns < 1_000_000_000 {
        fixed_width_7(ns_f / 1e6, "ms")
    } else {
        fixed_width_7(ns_f / 1e9, "s")
    }
}

/// Format a byte count per spec: plain `B` below 1 KiB, else `KiB`/`MiB`/`GiB`
/// with the fixed-width scheme above.
fn format_bytes(bytes: i64) -> [u8; 7] {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if bytes < 1024 {
        str_padded(&format!("{bytes}B"))
    } else if b < KIB * KIB {
        fixed_width_7(b / KIB, "KiB")
    } else if b < KIB * KIB * KIB {
        fixed_width_7(b / (KIB * KIB), "MiB")
    } else {
        fixed_width_7(b / (KIB * KIB * KIB), "GiB")
    }
}

/// Format a throughput in bytes/second per spec: `B/s`, `K/s`, `M/s`, `G/s`
/// on powers of 1000, rounded to whole units.
fn format_bps(bps: i64) -> [u8; 7] {
    const K: f64 = 1000.0;
    let v = bps as f64;
    if v < K {
        str_padded(&format!("{bps}B/s"))
    } else if v < K * K {
        str_padded(&format!("{}K/s", (v / K).round() as i64))
    } else if v < K * K * K {
        str_padded(&format!("{}M/s", (v / (K * K)).round() as i64))
    } else {
        str_padded(&format!("{}G/s", (v / (K * K * K)).round() as i64))
    }
}

/// Pretty-print any scalar `Value` as a 7-character ASCII string (spec
/// §4.3). Recurses into arrays, preserving shape. Any non-scalar-numeric
/// leaf (or `None`) is `Unformattable`.
pub fn format(v: &Value) -> Result<Value, CoreError> {
    match v {
        Value::Ns(n) => Ok(Value::Str(format_ns(*n))),
        Value::Bytes(n) => Ok(Value::Str(format_bytes(*n))),
        Value::Bps(n) => Ok(Value::Str(format_bps(*n))),
        Value::Array { items, rows, cols } => {
            let formatted = items
                .iter()
                .map(format)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array {
                items: formatted,
                rows: *rows,
                cols: *cols,
            })
        }
        Value::None | Value::Str(_) => Err(CoreError::Unformattable),
    }
}

/// Convert `Ns` leaves to `Bps` using `len` as the byte count transferred:
/// `bps = 1e9 * len / ns`. Recurses into arrays; any non-`Ns` leaf is a
/// `TypeMismatch`.
pub fn bytes_per_second(v: &Value, len: u64) -> Result<Value, CoreError> {
    match v {
        Value::Ns(ns) => {
            if *ns == 0 {
                Ok(Value::Bps(0))
            } else {
                Ok(Value::Bps(((1e9 * len as f64) / (*ns as f64)) as i64))
            }
        }
        Value::Array { items, rows, cols } => {
            let converted = items
                .iter()
                .map(|item| bytes_per_second(item, len))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array {
                items: converted,
                rows: *rows,
                cols: *cols,
            })
        }
        _ => Err(CoreError::TypeMismatch),
    }
}

/// Combine a sequence of homogeneous `Ns` or `Bps` scalars per spec §4.3.
/// `Min`/`Max` treat a zero entry as "unset" and skip it — a genuine
/// zero-duration measurement (never observed in practice, but theoretically
/// possible) would be silently ignored. Preserved from the original
/// behavior; see DESIGN.md.
pub fn reduce_scalar(items: &[Value], agg: Aggregate) -> Result<Value, CoreError> {
    let make: fn(i64) -> Value = match items.first() {
        Some(Value::Ns(_)) => Value::Ns,
        Some(Value::Bps(_)) => Value::Bps,
        _ => return Err(CoreError::TypeMismatch),
    };
    let expected = items.first().map(Value::kind);

    let mut nums = Vec::with_capacity(items.len());
    for item in items {
        if Some(item.kind()) != expected {
            return Err(CoreError::TypeMismatch);
        }
        match item {
            Value::Ns(n) | Value::Bps(n) => nums.push(*n),
            _ => return Err(CoreError::TypeMismatch),
        }
    }

    let result = match agg {
        Aggregate::Min => nums
            .iter()
            .copied()
            .filter(|&n| n != 0)
            .min()
            .unwrap_or(0),
        Aggregate::Max => nums
            .iter()
            .copied()
            .filter(|&n| n != 0)
            .max()
            .unwrap_or(0),
        Aggregate::Total => nums.iter().sum(),
        Aggregate::Avg => {
            if nums.is_empty() {
                0
            } else {
                nums.iter().sum::<i64>() / nums.len() as i64
            }
        }
        Aggregate::Ignore => 0,
    };

    Ok(make(result))
}

/// True iff `a` and `b` could sit in the same homogeneous `Array`.
pub fn same_kind(a: &Value, b: &Value) -> bool {
    a.kind() == b.kind()
}
