//! Random source abstraction and weighted selection.
//!
//! Pools never touch a global RNG. Each registry owns a seeded
//! [`rand_pcg::Pcg64`]; anything implementing [`rand::Rng`] is usable as a
//! [`RandomSource`], so tests can substitute their own seeded generator.

use rand::Rng;

/// Uniform draws over closed ranges.
pub trait RandomSource {
    /// Uniform float in `[lo, hi]`. Returns `lo` when the range is empty.
    fn float_in(&mut self, lo: f32, hi: f32) -> f32;
    /// Uniform integer in `[lo, hi]`. Returns `lo` when the range is empty.
    fn int_in(&mut self, lo: u32, hi: u32) -> u32;
}

impl<R: Rng> RandomSource for R {
    fn float_in(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        self.gen_range(lo..=hi)
    }

    fn int_in(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        self.gen_range(lo..=hi)
    }
}

/// Pick an index by weight.
///
/// Each weight is floored at 1.0. A value is drawn uniformly from
/// `[1, total]` and the candidates are walked in order, accumulating weights,
/// until the running sum reaches the draw. Returns `None` for an empty slice.
pub fn weighted_pick<T>(
    candidates: &[T],
    weight: impl Fn(&T) -> f32,
    rng: &mut impl RandomSource,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let total: f32 = candidates.iter().map(|c| weight(c).max(1.0)).sum();
    let choice = rng.float_in(1.0, total);
    let mut running = 0.0f32;
    for (idx, candidate) in candidates.iter().enumerate() {
        running += weight(candidate).max(1.0);
        if running >= choice {
            return Some(idx);
        }
    }
    // float accumulation can fall a hair short of `total`
    Some(candidates.len() - 1)
}
