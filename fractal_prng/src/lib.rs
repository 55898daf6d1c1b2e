// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled with zero external dependencies so that output is identical
// across platforms and compiler versions.
//
// This crate is the single randomness source of the fractal suite engine.
// The suite DNA generator and every brain own their own `SeededRng`, each
// derived from the session seed with a fixed stream salt, so replaying
// (seed, mood, genre, blueprint, bar sequence) reproduces every event.
//
// Besides the stateful generator, two pure helpers live here:
// - `hash_unit`: a positional hash in [0, 1) of (seed, a, b). Used where a
//   draw must be re-derivable from its coordinates alone (e.g. the timbre
//   lottery keys its pick on bar + option count instead of consuming the
//   stream).
// - `select_branch`: the cumulative weighted-branch walk shared by every
//   weighted choice, including the exact-boundary policy.
//
// **Critical constraint: determinism.** Every method on `SeededRng` must
// produce identical output given the same prior state. Do not use stdlib
// hashing, `rand`, or any other source of non-determinism in this crate.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG: the engine's sole source of randomness.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRng {
    s: [u64; 4],
}

impl SeededRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two `SeededRng` instances created with the same seed will produce
    /// identical output sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Create an independent stream for a subsystem from a shared seed.
    ///
    /// `derive(seed, a)` and `derive(seed, b)` are uncorrelated for `a != b`,
    /// and `derive(seed, s)` is stable for a given pair.
    pub fn derive(seed: u64, stream: u64) -> Self {
        let mut sm = seed ^ stream.wrapping_mul(0xd6e8_feb8_6659_fd93);
        Self::new(splitmix64(&mut sm))
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a `u32` by taking the upper 32 bits of a `u64`.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Generate a uniform `f64` in [0, 1).
    ///
    /// Uses the upper 53 bits of a `u64` to fill the mantissa.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform value in `[low, high)`.
    ///
    /// Returns `low` when the range is empty or inverted rather than
    /// panicking: tempo ranges and jitter widths come from authored data.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        let roll = self.next_f64();
        if high <= low {
            return low;
        }
        low + roll * (high - low)
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform index in `[0, bound)`, or `None` for an empty range.
    pub fn next_index(&mut self, bound: usize) -> Option<usize> {
        if bound == 0 {
            return None;
        }
        Some(self.range_usize(0, bound))
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Fisher–Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }

    /// Pick a uniformly random element, or `None` if the slice is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let idx = self.next_index(items.len())?;
        items.get(idx)
    }

    /// Draw one roll and resolve it against `weights` with `select_branch`.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let roll = self.next_f64();
        select_branch(roll, weights)
    }
}

/// Resolve a roll in [0, 1) against a list of branch weights.
///
/// Walks the cumulative distribution and returns the first branch whose
/// cumulative bound is strictly greater than `roll * total`, so a roll that
/// lands exactly on an interior boundary falls to the later branch. A roll of
/// exactly `0.0` selects the last enumerated branch with positive weight.
/// Non-positive and non-finite weights are never selected. Returns `None` if
/// no branch has positive weight.
pub fn select_branch(roll: f64, weights: &[f64]) -> Option<usize> {
    let usable = |w: f64| w.is_finite() && w > 0.0;
    let last = weights.iter().rposition(|&w| usable(w))?;
    if roll <= 0.0 || !roll.is_finite() {
        return Some(last);
    }
    let total: f64 = weights.iter().copied().filter(|&w| usable(w)).sum();
    let target = roll * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        if !usable(w) {
            continue;
        }
        cumulative += w;
        if target < cumulative {
            return Some(i);
        }
    }
    Some(last)
}

/// Pure positional hash mapped to [0, 1).
///
/// Identical inputs always yield the identical value; no generator state is
/// consumed.
pub fn hash_unit(seed: u64, a: u64, b: u64) -> f64 {
    let mut sm = seed;
    let mut h = splitmix64(&mut sm);
    sm = h ^ a;
    h = splitmix64(&mut sm);
    sm = h ^ b.rotate_left(32);
    h = splitmix64(&mut sm);
    (h >> 11) as f64 / (1u64 << 53) as f64
}

/// SplitMix64: used for seeding xoshiro256++ and for `hash_unit`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
