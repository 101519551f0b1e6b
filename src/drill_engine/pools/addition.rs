use rand::Rng;

use crate::drill_engine::{
    helpers::{ones_carry, question, question_with, span_values, GenCtx, CAP_LOOSE, CAP_TIGHT},
    models::{
        AddPairsPool, AddThreeNumbersPool, CarryProcedurePool, FixedSetPool, MixedWidthPool,
        Question, QuestionKind, QuestionMetadata, StairPool, TenComplementPool, ThreeNumberTemplate,
    },
};

/// `n + ? = 10`. Sequential mode walks `numbers` in order, wrapping around.
pub fn ten_complement<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &TenComplementPool, count: usize, sequential: bool,
) -> Vec<Question> {
    if spec.numbers.is_empty() {
        return Vec::new();
    }
    let picks: Vec<i32> = if sequential {
        spec.numbers.iter().copied().cycle().take(count).collect()
    } else {
        (0..count).filter_map(|_| ctx.pick(&spec.numbers)).collect()
    };
    picks
        .into_iter()
        .map(|n| {
            question_with(
                ctx.id(&format!("ten_comp_{n}")),
                format!("{n} + ? = 10"),
                10 - n,
                QuestionKind::Input,
                QuestionMetadata::Items { items: vec![n] },
            )
        })
        .collect()
}

fn add_pair_question<R: Rng>(ctx: &mut GenCtx<'_, R>, a: i32, b: i32) -> Question {
    question(ctx.id(&format!("add_pair_{a}_{b}")), format!("{a} + {b}"), a + b, QuestionKind::Input)
}

fn add_pair_accepts(spec: &AddPairsPool, a: i32, b: i32) -> bool {
    let c = &spec.constraints;
    if !c.sum_ok(a + b) {
        return false;
    }
    if c.ones_no_carry && ones_carry(a, b) {
        return false;
    }
    if c.ones_carry && !ones_carry(a, b) {
        return false;
    }
    true
}

/// Single-digit pairs `a + b` under the sum and carry constraints.
pub fn add_pairs<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &AddPairsPool, count: usize, sequential: bool,
) -> Vec<Question> {
    if sequential {
        let mut out = Vec::new();
        for a in span_values(spec.a_range) {
            for b in span_values(spec.b_range) {
                if out.len() == count {
                    return out;
                }
                if add_pair_accepts(spec, a, b) {
                    out.push(add_pair_question(ctx, a, b));
                }
            }
        }
        return out;
    }

    ctx.rejection_sample("add_pairs", count, CAP_LOOSE, |ctx| {
        let a = ctx.int(spec.a_range);
        let b = ctx.int(spec.b_range);
        add_pair_accepts(spec, a, b).then(|| add_pair_question(ctx, a, b))
    })
}

/// Three addends, optionally built around a pair that makes ten.
pub fn add_three_numbers<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &AddThreeNumbersPool, count: usize,
) -> Vec<Question> {
    let c = &spec.constraints;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut nums = match spec.template {
            ThreeNumberTemplate::Make10Visible => {
                let Some([p, q]) = ctx.pick(&spec.pairs) else {
                    tracing::warn!(target: "generator", "make10_visible pool has no pairs.");
                    return out;
                };
                let third = ctx.int(spec.third_range.unwrap_or([1, 9]));
                [p, q, third]
            }
            ThreeNumberTemplate::Make10Find | ThreeNumberTemplate::Mixed => {
                if c.must_contain_make10_pair {
                    let p1 = ctx.int_between(1, 9);
                    [p1, 10 - p1, ctx.int_between(1, 9)]
                } else {
                    [
                        ctx.int(spec.a_range.unwrap_or([1, 9])),
                        ctx.int(spec.b_range.unwrap_or([1, 9])),
                        ctx.int(spec.c_range.unwrap_or([1, 9])),
                    ]
                }
            }
        };
        if !c.fixed_order && ctx.chance(0.5) {
            ctx.shuffle(&mut nums[..]);
        }
        let [a, b, d] = nums;
        out.push(question_with(
            ctx.id(&format!("add_3num_{a}_{b}_{d}")),
            format!("{a} + {b} + {d}"),
            a + b + d,
            QuestionKind::Input,
            QuestionMetadata::Items { items: nums.to_vec() },
        ));
    }
    out
}

/// `base + k` with `k` drawn from `1..=topRowLength`.
pub fn stair_addition<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &StairPool, count: usize) -> Vec<Question> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(base) = ctx.pick(&spec.base_numbers) else { break };
        let other = ctx.int_between(1, spec.top_row_length.max(1));
        out.push(question(
            ctx.id(&format!("stair_{base}_{other}")),
            format!("{base} + {other}"),
            base + other,
            QuestionKind::Input,
        ));
    }
    out
}

/// Two-digit plus one-digit, with optional ones-carry filters.
pub fn add_2d_1d<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MixedWidthPool, count: usize) -> Vec<Question> {
    let c = &spec.constraints;
    ctx.rejection_sample("add_2d_1d", count, CAP_TIGHT, |ctx| {
        let a = ctx.int(spec.two_digit_range);
        let b = ctx.int(spec.one_digit_range);
        let carry = ones_carry(a, b);
        if (c.ones_no_carry && carry) || (c.ones_carry && !carry) || !c.sum_ok(a + b) {
            return None;
        }
        Some(question(ctx.id(&format!("add_2d1d_{a}_{b}")), format!("{a} + {b}"), a + b, QuestionKind::Input))
    })
}

/// One-digit plus two-digit.
pub fn add_1d_2d<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MixedWidthPool, count: usize) -> Vec<Question> {
    let c = &spec.constraints;
    ctx.rejection_sample("add_1d_2d", count, CAP_TIGHT, |ctx| {
        let a = ctx.int(spec.one_digit_range);
        let b = ctx.int(spec.two_digit_range);
        c.sum_ok(a + b).then(|| {
            question(ctx.id(&format!("add_1d2d_{a}_{b}")), format!("{a} + {b}"), a + b, QuestionKind::Input)
        })
    })
}

fn carry_procedure_accepts(spec: &CarryProcedurePool, a: i32, b: i32) -> bool {
    // A sum of exactly ten leaves a zero remainder, which is not a carry drill.
    a + b > 10 && spec.constraints.sum_ok(a + b)
}

fn carry_procedure_question<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &CarryProcedurePool, a: i32, b: i32,
) -> Question {
    let complement = 10 - a;
    question_with(
        ctx.id(&format!("proc_{a}_{b}")),
        format!("{a} + {b}"),
        a + b,
        QuestionKind::Fill,
        QuestionMetadata::CarryProcedure {
            split_host: a,
            split_guest: b,
            complement,
            remainder: b - complement,
            mode: spec.variant,
        },
    )
}

/// Make-10 decomposition drill: `a + b` with `a + b > 10`.
pub fn add_carry_procedure<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &CarryProcedurePool, count: usize, sequential: bool,
) -> Vec<Question> {
    if sequential {
        let mut out = Vec::new();
        for a in span_values(spec.a_range) {
            for b in span_values(spec.b_range) {
                if out.len() == count {
                    return out;
                }
                if carry_procedure_accepts(spec, a, b) {
                    out.push(carry_procedure_question(ctx, spec, a, b));
                }
            }
        }
        return out;
    }

    ctx.rejection_sample("add_carry_procedure", count, CAP_TIGHT, |ctx| {
        let a = ctx.int(spec.a_range);
        let b = ctx.int(spec.b_range);
        carry_procedure_accepts(spec, a, b).then(|| carry_procedure_question(ctx, spec, a, b))
    })
}

/// The 36 single-digit pairs whose sum reaches ten, in table order.
fn carry_pairs() -> Vec<(i32, i32)> {
    (1..=9)
        .flat_map(|a| (1..=9).map(move |b| (a, b)))
        .filter(|(a, b)| a + b >= 10)
        .collect()
}

/// Ids go through the batch counter so a composite that draws the same pair
/// twice still yields distinct ids.
fn carry_pair_questions<R: Rng>(ctx: &mut GenCtx<'_, R>, pairs: &[(i32, i32)]) -> Vec<Question> {
    pairs
        .iter()
        .map(|&(a, b)| question(ctx.id(&format!("fix_{a}_{b}")), format!("{a} + {b}"), a + b, QuestionKind::Input))
        .collect()
}

/// Fixed carry-pair table, truncated to `count`.
pub fn fixed_set<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &FixedSetPool, count: usize) -> Vec<Question> {
    tracing::trace!(target: "generator", set_id = %spec.set_id, "Serving fixed set.");
    let mut pairs = carry_pairs();
    pairs.truncate(count);
    carry_pair_questions(ctx, &pairs)
}

/// Fixed carry-pair table, shuffled, truncated to `count`.
pub fn fixed_set_random<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &FixedSetPool, count: usize) -> Vec<Question> {
    tracing::trace!(target: "generator", set_id = %spec.set_id, "Serving shuffled fixed set.");
    let mut pairs = carry_pairs();
    ctx.shuffle(&mut pairs);
    pairs.truncate(count);
    carry_pair_questions(ctx, &pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::{Constraints, ProcedureVariant};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pairs(a: [i32; 2], b: [i32; 2], constraints: Constraints) -> AddPairsPool {
        AddPairsPool { a_range: a, b_range: b, constraints }
    }

    #[test]
    fn ten_complement_text_and_answer() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenCtx::new(&mut rng);
        let qs = ten_complement(&mut ctx, &TenComplementPool { numbers: vec![7] }, 1, false);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].text, "7 + ? = 10");
        assert_eq!(qs[0].answer, "3");
        assert_eq!(qs[0].metadata, Some(QuestionMetadata::Items { items: vec![7] }));
    }

    #[test]
    fn ten_complement_sequential_cycles_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenCtx::new(&mut rng);
        let spec = TenComplementPool { numbers: vec![1, 2, 3] };
        let answers: Vec<String> = ten_complement(&mut ctx, &spec, 5, true)
            .into_iter()
            .map(|q| q.answer)
            .collect();
        assert_eq!(answers, vec!["9", "8", "7", "9", "8"]);
    }

    #[test]
    fn add_pairs_sum_min_holds() {
        let spec = pairs([1, 9], [1, 9], Constraints { sum_min: Some(10), ..Default::default() });
        for seed in [1u64, 42, 999] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ctx = GenCtx::new(&mut rng);
            for q in add_pairs(&mut ctx, &spec, 20, false) {
                let sum: i32 = q.answer.parse().unwrap();
                assert!(sum >= 10, "seed {seed}: {} = {sum}", q.text);
            }
        }
    }

    #[test]
    fn add_pairs_impossible_constraint_returns_short() {
        let spec = pairs([1, 2], [1, 2], Constraints { sum_min: Some(50), ..Default::default() });
        let mut rng = StdRng::seed_from_u64(5);
        let mut ctx = GenCtx::new(&mut rng);
        assert!(add_pairs(&mut ctx, &spec, 10, false).is_empty());
    }

    #[test]
    fn add_pairs_sequential_is_ordered() {
        let spec = pairs([1, 2], [1, 2], Constraints::default());
        let mut rng = StdRng::seed_from_u64(5);
        let mut ctx = GenCtx::new(&mut rng);
        let texts: Vec<String> = add_pairs(&mut ctx, &spec, 10, true).into_iter().map(|q| q.text).collect();
        assert_eq!(texts, vec!["1 + 1", "1 + 2", "2 + 1", "2 + 2"]);
    }

    #[test]
    fn three_numbers_make10_pair_present() {
        let spec = AddThreeNumbersPool {
            template: ThreeNumberTemplate::Make10Find,
            pairs: vec![],
            third_range: None,
            a_range: Some([1, 9]),
            b_range: Some([1, 9]),
            c_range: Some([1, 9]),
            constraints: Constraints { must_contain_make10_pair: true, fixed_order: true, ..Default::default() },
        };
        let mut rng = StdRng::seed_from_u64(11);
        let mut ctx = GenCtx::new(&mut rng);
        for q in add_three_numbers(&mut ctx, &spec, 15) {
            let Some(QuestionMetadata::Items { items }) = q.metadata else { panic!("missing items") };
            assert_eq!(items[0] + items[1], 10, "{}", q.text);
        }
    }

    #[test]
    fn make10_visible_without_pairs_yields_nothing() {
        let spec = AddThreeNumbersPool {
            template: ThreeNumberTemplate::Make10Visible,
            pairs: vec![],
            third_range: Some([1, 9]),
            a_range: None,
            b_range: None,
            c_range: None,
            constraints: Constraints::default(),
        };
        let mut rng = StdRng::seed_from_u64(11);
        let mut ctx = GenCtx::new(&mut rng);
        assert!(add_three_numbers(&mut ctx, &spec, 5).is_empty());
    }

    #[test]
    fn carry_procedure_decomposition_is_consistent() {
        let spec = CarryProcedurePool {
            variant: Some(ProcedureVariant::Full),
            a_range: [2, 9],
            b_range: [2, 9],
            constraints: Constraints::default(),
        };
        for sequential in [false, true] {
            let mut rng = StdRng::seed_from_u64(8);
            let mut ctx = GenCtx::new(&mut rng);
            let qs = add_carry_procedure(&mut ctx, &spec, 30, sequential);
            assert!(!qs.is_empty());
            for q in qs {
                let Some(QuestionMetadata::CarryProcedure { split_host, split_guest, complement, remainder, .. }) =
                    q.metadata
                else {
                    panic!("wrong metadata for {}", q.text)
                };
                assert_eq!(split_host + complement, 10);
                assert_eq!(complement + remainder + 10, split_host + split_guest);
                assert!(remainder > 0, "{} has zero remainder", q.text);
                assert_eq!(q.kind, QuestionKind::Fill);
            }
        }
    }

    #[test]
    fn two_digit_one_digit_carry_filters() {
        let spec = MixedWidthPool {
            two_digit_range: [11, 19],
            one_digit_range: [1, 9],
            constraints: Constraints { ones_carry: true, ..Default::default() },
        };
        let mut rng = StdRng::seed_from_u64(21);
        let mut ctx = GenCtx::new(&mut rng);
        for q in add_2d_1d(&mut ctx, &spec, 20) {
            let parts: Vec<i32> = q.text.split(" + ").map(|p| p.parse().unwrap()).collect();
            assert!(ones_carry(parts[0], parts[1]), "{} should carry", q.text);
        }
    }

    #[test]
    fn fixed_set_table_has_36_pairs() {
        let spec = FixedSetPool { set_id: "carry".into(), notes: None };
        let mut rng = StdRng::seed_from_u64(4);
        let mut ctx = GenCtx::new(&mut rng);
        let all = fixed_set(&mut ctx, &spec, 100);
        assert_eq!(all.len(), 36);
        assert_eq!(all[0].id, "fix_1_9_0");
        assert_eq!(all[0].text, "1 + 9");

        let some = fixed_set_random(&mut ctx, &spec, 10);
        assert_eq!(some.len(), 10);
        assert!(some.iter().all(|q| q.answer.parse::<i32>().unwrap() >= 10));
    }
}
