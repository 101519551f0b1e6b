//! Shared building blocks for the pool generators.
//!
//! Every generator needs the same few things: draw an integer from an
//! inclusive span, mint an id that is unique inside the batch, retry a
//! candidate until it satisfies the pool's constraints (without ever looping
//! forever), and assemble a [`Question`]. [`GenCtx`] bundles the RNG with the
//! id counter so composite pools can recurse while sharing one counter.
//!
//! ## Attempt caps
//!
//! Rejection sampling is capped at `count × factor` draws. Pools with cheap,
//! mostly-satisfiable filters use [`CAP_LOOSE`]; the rest use [`CAP_TIGHT`].
//! When the cap is hit the batch is simply shorter than requested.

use std::ops::RangeInclusive;
use rand::{seq::SliceRandom, Rng};
use tracing::warn;

use crate::drill_engine::{
    models::{Question, QuestionKind, QuestionMetadata, Span},
    shuffle,
};

/// Draw budget multiplier for `add_pairs`.
pub const CAP_LOOSE: usize = 10;
/// Draw budget multiplier for every other constrained pool.
pub const CAP_TIGHT: usize = 20;

/// `[lo, hi]` with the bounds swapped back if a curriculum wrote them inverted.
pub fn ordered(span: Span) -> (i32, i32) {
    let [a, b] = span;
    if a <= b { (a, b) } else { (b, a) }
}

/// Every value of `span`, ascending.
pub fn span_values(span: Span) -> RangeInclusive<i32> {
    let (lo, hi) = ordered(span);
    lo..=hi
}

/// Ones digits of `a` and `b` add up to ten or more.
pub fn ones_carry(a: i32, b: i32) -> bool {
    a % 10 + b % 10 >= 10
}

/// Subtracting a one-digit `s` from `m` needs a borrow from the tens.
pub fn needs_borrow(m: i32, s: i32) -> bool {
    m % 10 < s
}

/// Decimal digits of a non-negative number, most significant first.
pub fn digits(n: i32) -> Vec<u8> {
    n.unsigned_abs()
        .to_string()
        .bytes()
        .map(|b| b - b'0')
        .collect()
}

/// Build a question without metadata.
pub fn question(id: String, text: impl Into<String>, answer: impl ToString, kind: QuestionKind) -> Question {
    Question {
        id,
        text: text.into(),
        answer: answer.to_string(),
        kind,
        metadata: None,
        is_review: false,
    }
}

/// Build a question carrying a metadata payload.
pub fn question_with(
    id: String, text: impl Into<String>, answer: impl ToString,
    kind: QuestionKind, metadata: QuestionMetadata,
) -> Question {
    Question { metadata: Some(metadata), ..question(id, text, answer, kind) }
}

/// RNG plus the per-batch id counter.
pub struct GenCtx<'a, R: Rng> {
    rng: &'a mut R,
    serial: usize,
}

impl<'a, R: Rng> GenCtx<'a, R> {
    pub fn new(rng: &'a mut R) -> Self {
        GenCtx { rng, serial: 0 }
    }

    /// Uniform integer from an inclusive span.
    pub fn int(&mut self, span: Span) -> i32 {
        let (lo, hi) = ordered(span);
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform integer from `lo..=hi` (bounds may come in either order).
    pub fn int_between(&mut self, lo: i32, hi: i32) -> i32 {
        self.int([lo, hi])
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// `true` with probability `p`; out-of-range and NaN probabilities saturate.
    pub fn chance(&mut self, p: f64) -> bool {
        if p.is_nan() || p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.rng.gen_bool(p)
        }
    }

    /// Uniform pick from a list; `None` when it is empty.
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        items.choose(&mut *self.rng).copied()
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        shuffle::shuffle(&mut *self.rng, items);
    }

    pub fn rng(&mut self) -> &mut R {
        &mut *self.rng
    }

    /// `stem_N`, where N counts up across the whole batch.
    pub fn id(&mut self, stem: &str) -> String {
        let id = format!("{}_{}", stem, self.serial);
        self.serial += 1;
        id
    }

    /// Bounded rejection sampler.
    ///
    /// Calls `draw` until `count` questions are accepted or `count × factor`
    /// draws have been spent. `draw` returns `None` to reject a candidate.
    pub fn rejection_sample<F>(&mut self, pool: &str, count: usize, factor: usize, mut draw: F) -> Vec<Question>
    where
        F: FnMut(&mut Self) -> Option<Question>,
    {
        let cap = count.saturating_mul(factor);
        let mut out = Vec::with_capacity(count);
        let mut attempts = 0usize;
        while out.len() < count && attempts < cap {
            attempts += 1;
            if let Some(q) = draw(&mut *self) {
                out.push(q);
            }
        }
        if out.len() < count {
            warn!(
                target: "generator",
                pool,
                requested = count,
                produced = out.len(),
                attempts,
                "Attempt cap reached; returning a short batch."
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn inverted_span_is_normalised() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenCtx::new(&mut rng);
        for _ in 0..100 {
            let v = ctx.int([9, 2]);
            assert!((2..=9).contains(&v), "value {v} outside [2, 9]");
        }
        assert_eq!(span_values([5, 3]).collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn ids_are_unique_within_a_batch() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenCtx::new(&mut rng);
        let a = ctx.id("add_pair_3_4");
        let b = ctx.id("add_pair_3_4");
        assert_ne!(a, b);
        assert_eq!(a, "add_pair_3_4_0");
    }

    #[test]
    fn rejection_sample_stops_at_cap() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenCtx::new(&mut rng);
        let mut calls = 0;
        let out = ctx.rejection_sample("never", 5, CAP_TIGHT, |_| {
            calls += 1;
            None
        });
        assert!(out.is_empty());
        assert_eq!(calls, 5 * CAP_TIGHT);
    }

    #[test]
    fn pick_is_uniform_over_members() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenCtx::new(&mut rng);
        assert_eq!(ctx.pick::<i32>(&[]), None);
        let items = [2, 4, 6];
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let v = ctx.pick(&items).unwrap();
            seen[(v / 2 - 1) as usize] += 1;
        }
        assert!(seen.iter().all(|&n| n > 50), "skewed picks: {seen:?}");
    }

    #[test]
    fn chance_saturates() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenCtx::new(&mut rng);
        assert!(!ctx.chance(0.0));
        assert!(!ctx.chance(f64::NAN));
        assert!(ctx.chance(1.5));
    }

    #[test]
    fn carry_and_borrow_predicates() {
        assert!(ones_carry(8, 7));
        assert!(!ones_carry(12, 5));
        assert!(needs_borrow(13, 9));
        assert!(!needs_borrow(15, 3));
        assert_eq!(digits(405), vec![4, 0, 5]);
    }
}
