//! Galois LFSR permutation generator used by `OFF_RAND` to visit every index
//! in `[0, 2^bits)` exactly once without repetition or extra state.

use std::sync::OnceLock;

/// Feedback bit positions (0-indexed from the LSB) that XOR into the
/// register whenever the bit shifted out of the bottom is set.
///
/// Widths 12 and 16 are the two tap sets spec.md gives verbatim ("the
/// repository's polynomials, preserved for reproducibility"). The spec
/// doesn't enumerate the other seven widths the LFSR must support (8..=16),
/// and no other tap set survived distillation from the original source, so
/// rather than invent plausible-looking numbers, the rest are found by an
/// exhaustive search for a feedback set that actually produces a maximal
/// (`2^bits - 1`) cycle — see `find_taps` below. Decision recorded in
/// DESIGN.md.
fn fixed_taps(bits: u32) -> Option<&'static [u32]> {
    match bits {
        12 => Some(&[0, 1, 2, 8]),
        16 => Some(&[0, 2, 3, 5]),
        _ => None,
    }
}

/// Seed the register is reset to whenever it would otherwise be zero, and
/// the value whose return marks one full cycle.
pub fn seed(bits: u32) -> u32 {
    0xACE1 & mask(bits)
}

fn mask(bits: u32) -> u32 {
    (1u32 << bits) - 1
}

fn step(state: u32, bits: u32, taps: &[u32]) -> u32 {
    let lsb = state & 1;
    let mut next = state >> 1;
    if lsb != 0 {
        for &tap in taps {
            next ^= 1 << (bits - 1 - tap);
        }
    }
    next
}

/// True iff stepping from `seed(bits)` with `taps` visits every nonzero
/// value in `[0, 2^bits)` exactly once before returning to the seed.
fn is_maximal(bits: u32, taps: &[u32]) -> bool {
    let period = (1u64 << bits) - 1;
    let start = seed(bits);
    let mut state = start;
    for _ in 0..period {
        state = step(state, bits, taps);
        if state == 0 {
            return false;
        }
    }
    state == start
}

/// Exhaustively search feedback sets of growing arity (always including tap
/// 0, matching both of the spec-given examples) for one that yields a
/// maximal-length cycle.
fn find_taps(bits: u32) -> Vec<u32> {
    let others: Vec<u32> = (1..bits).collect();
    for arity in 1..=4usize {
        let mut combo = Vec::with_capacity(arity - 1);
        if search(&others, arity - 1, 0, &mut combo, bits) {
            let mut taps = vec![0u32];
            taps.extend(combo);
            return taps;
        }
    }
    panic!("no maximal-length {bits}-bit LFSR tap set found up to arity 4");
}

fn search(pool: &[u32], need: usize, start: usize, combo: &mut Vec<u32>, bits: u32) -> bool {
    if need == 0 {
        let mut taps = vec![0u32];
        taps.extend(combo.iter().copied());
        return is_maximal(bits, &taps);
    }
    for i in start..pool.len() {
        combo.push(pool[i]);
        if search(pool, need - 1, i + 1, combo, bits) {
            return true;
        }
        combo.pop();
    }
    false
}

fn cache() -> &'static std::sync::Mutex<std::collections::HashMap<u32, Vec<u32>>> {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<u32, Vec<u32>>>> =
        OnceLock::new();
    CACHE.get_or_init(Default::default)
}

fn taps_for(bits: u32) -> Vec<u32> {
    if let Some(t) = fixed_taps(bits) {
        return t.to_vec();
    }
    let mut guard = cache().lock().unwrap();
    guard.entry(bits).or_insert_with(|| find_taps(bits)).clone()
}

/// A Galois LFSR over `bits` bits (`8..=16`). `next()` advances the register
/// by one step; the sequence visits every non-zero value in `[0, 2^bits)`
/// exactly once before `next()` returns `seed(bits)` again, at which point
/// the caller should stop (the cycle has closed).
pub struct Lfsr {
    bits: u32,
    taps: Vec<u32>,
    state: u32,
}

impl Lfsr {
    pub fn new(bits: u32) -> Self {
        assert!((8..=16).contains(&bits), "LFSR width must be 8..=16");
        Self {
            bits,
            taps: taps_for(bits),
            state: seed(bits),
        }
    }

    /// Advance and return the new state. A zero state is replaced by
    /// `seed(bits)` before stepping, per spec §4.2.
    pub fn next(&mut self) -> u32 {
        if self.state == 0 {
            self.state = seed(self.bits);
        }
        self.state = step(self.state, self.bits, &self.taps);
        self.state
    }
}

/// Smallest LFSR width (at least 8) that can represent every index in
/// `[0, num)`.
pub fn width_for(num: u32) -> u32 {
    if num <= 1 {
        return 8;
    }
    let bits = 32 - (num - 1).leading_zeros();
    bits.clamp(8, 16)
}

/// Draw up to `num` distinct indices in `[0, num)` via the LFSR, skipping
/// any draw `>= num` and stopping early if the cycle closes first (spec
/// §4.4 `OFF_RAND`).
pub fn draw_permutation(num: u32) -> Vec<u32> {
    if num == 0 {
        return Vec::new();
    }
    let bits = width_for(num);
    let start = seed(bits);
    let mut lfsr = Lfsr::new(bits);
    let mut out = Vec::with_capacity(num as usize);

    loop {
        let v = lfsr.next();
        if v == start {
            break;
        }
        if v < num {
            out.push(v);
            if out.len() as u32 == num {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn visits_every_nonzero_value_exactly_once() {
        for bits in 8..=16u32 {
            let start = seed(bits);
            let mut lfsr = Lfsr::new(bits);
            let mut seen = HashSet::new();
            loop {
                let v = lfsr.next();
                if v == start {
                    break;
                }
                assert!(seen.insert(v), "bits={bits} repeated value {v}");
            }
            assert_eq!(seen.len() as u64, (1u64 << bits) - 1, "bits={bits} short cycle");
        }
    }

    #[test]
    fn zero_is_never_a_resting_state_mid_cycle() {
        let mut lfsr = Lfsr::new(8);
        let start = seed(8);
        for _ in 0..(1u32 << 8) - 2 {
            let v = lfsr.next();
            if v == start {
                break;
            }
            assert_ne!(v, 0);
        }
    }

    #[test]
    fn draw_permutation_covers_every_index_once() {
        for &num in &[1u32, 2, 5, 16, 100, 256] {
            let draws = draw_permutation(num);
            let set: HashSet<u32> = draws.iter().copied().collect();
            assert_eq!(set.len(), draws.len(), "num={num} duplicate draw");
            assert!(draws.iter().all(|&v| v < num), "num={num} out-of-range draw");
        }
    }
}
