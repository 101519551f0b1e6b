use rand::Rng;

use crate::drill_engine::{
    helpers::{needs_borrow, question, question_with, span_values, GenCtx, CAP_TIGHT},
    models::{
        BorrowProcedurePool, MixedWidthPool, Question, QuestionKind, QuestionMetadata, StairPool,
        SubAddMixedPool, SubPairsPool,
    },
};

fn sub_pair_accepts(spec: &SubPairsPool, m: i32, s: i32) -> bool {
    m - s >= 0 && spec.constraints.result_ok(m - s)
}

fn sub_pair_question<R: Rng>(ctx: &mut GenCtx<'_, R>, m: i32, s: i32) -> Question {
    question(ctx.id(&format!("sub_pair_{m}_{s}")), format!("{m} - {s}"), m - s, QuestionKind::Input)
}

/// `m - s` with a non-negative result inside the optional result window.
pub fn sub_pairs<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &SubPairsPool, count: usize, sequential: bool,
) -> Vec<Question> {
    if sequential {
        let mut out = Vec::new();
        for m in span_values(spec.minuend_range) {
            for s in span_values(spec.subtrahend_range) {
                if out.len() == count {
                    return out;
                }
                if sub_pair_accepts(spec, m, s) {
                    out.push(sub_pair_question(ctx, m, s));
                }
            }
        }
        return out;
    }

    ctx.rejection_sample("sub_pairs", count, CAP_TIGHT, |ctx| {
        let m = ctx.int(spec.minuend_range);
        let s = ctx.int(spec.subtrahend_range);
        sub_pair_accepts(spec, m, s).then(|| sub_pair_question(ctx, m, s))
    })
}

/// Only minuends of ten or more whose ones digit is smaller than the subtrahend.
fn borrow_accepts(m: i32, s: i32) -> bool {
    m >= 10 && m - s >= 0 && needs_borrow(m, s)
}

fn borrow_question<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &BorrowProcedurePool, m: i32, s: i32) -> Question {
    let unit = m % 10;
    let step1 = 10 - s;
    question_with(
        ctx.id(&format!("sub_proc_{m}_{s}")),
        format!("{m} - {s}"),
        m - s,
        QuestionKind::Fill,
        QuestionMetadata::BorrowProcedure {
            minuend: m,
            subtrahend: s,
            split_host: 10,
            split_guest: unit,
            step1,
            step2: step1 + unit,
            mode: spec.variant,
        },
    )
}

/// Subtraction by decomposition: `13 - 9` → `10 - 9 = 1`, `1 + 3 = 4`.
pub fn sub_borrow_procedure<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &BorrowProcedurePool, count: usize, sequential: bool,
) -> Vec<Question> {
    if sequential {
        let mut out = Vec::new();
        for m in span_values(spec.minuend_range) {
            for s in span_values(spec.subtrahend_range) {
                if out.len() == count {
                    return out;
                }
                if borrow_accepts(m, s) {
                    out.push(borrow_question(ctx, spec, m, s));
                }
            }
        }
        return out;
    }

    ctx.rejection_sample("sub_borrow_procedure", count, CAP_TIGHT, |ctx| {
        let m = ctx.int(spec.minuend_range);
        let s = ctx.int(spec.subtrahend_range);
        borrow_accepts(m, s).then(|| borrow_question(ctx, spec, m, s))
    })
}

/// A row of consecutive minuends minus a fixed subtrahend, answered as one grid.
pub fn sub_stair<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &StairPool, count: usize) -> Vec<Question> {
    let len = spec.top_row_length.max(0);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(base) = ctx.pick(&spec.base_numbers) else { break };
        let start = ctx.int_between(base + 1, base + 5);
        let row: Vec<i32> = (0..len).map(|k| start + k).collect();
        let answer = row
            .iter()
            .map(|m| (m - base).to_string())
            .collect::<Vec<_>>()
            .join(",");
        out.push(question_with(
            ctx.id(&format!("sub_stair_{base}")),
            format!("stair:{base}"),
            answer,
            QuestionKind::Input,
            QuestionMetadata::Stair { row, operator: '-', base },
        ));
    }
    out
}

/// Two-digit minus one-digit, with optional borrow / no-borrow filters.
pub fn sub_2d_1d<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MixedWidthPool, count: usize) -> Vec<Question> {
    let c = &spec.constraints;
    ctx.rejection_sample("sub_2d_1d", count, CAP_TIGHT, |ctx| {
        let m = ctx.int(spec.two_digit_range);
        let s = ctx.int(spec.one_digit_range);
        let borrow = needs_borrow(m, s);
        if m - s < 0 || (c.no_borrow && borrow) || (c.borrow && !borrow) || !c.result_ok(m - s) {
            return None;
        }
        Some(question(ctx.id(&format!("sub_2d1d_{m}_{s}")), format!("{m} - {s}"), m - s, QuestionKind::Input))
    })
}

/// `base - a + b`, never negative.
pub fn sub_add_mixed<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &SubAddMixedPool, count: usize) -> Vec<Question> {
    let base = spec.base;
    ctx.rejection_sample("sub_add_mixed", count, CAP_TIGHT, |ctx| {
        let a = ctx.int(spec.subtrahend_range);
        let b = ctx.int(spec.addend_range);
        let result = base - a + b;
        (result >= 0).then(|| {
            question(
                ctx.id(&format!("sub_add_{base}_{a}_{b}")),
                format!("{base} - {a} + {b}"),
                result,
                QuestionKind::Input,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::Constraints;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn borrow_procedure_steps_add_up() {
        let spec = BorrowProcedurePool { minuend_range: [10, 18], subtrahend_range: [2, 9], variant: None };
        for sequential in [false, true] {
            let mut rng = StdRng::seed_from_u64(13);
            let mut ctx = GenCtx::new(&mut rng);
            let qs = sub_borrow_procedure(&mut ctx, &spec, 40, sequential);
            assert!(!qs.is_empty());
            for q in qs {
                let Some(QuestionMetadata::BorrowProcedure { minuend, subtrahend, step1, step2, .. }) = q.metadata
                else {
                    panic!("wrong metadata for {}", q.text)
                };
                assert!(minuend >= 10);
                assert!(minuend % 10 < subtrahend, "{} needs no borrow", q.text);
                assert_eq!(step1, 10 - subtrahend);
                assert_eq!(step2, minuend - subtrahend);
            }
        }
    }

    #[test]
    fn thirteen_minus_nine() {
        let spec = BorrowProcedurePool { minuend_range: [13, 13], subtrahend_range: [9, 9], variant: None };
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &sub_borrow_procedure(&mut ctx, &spec, 1, true)[0];
        assert_eq!(q.answer, "4");
        assert!(matches!(
            q.metadata,
            Some(QuestionMetadata::BorrowProcedure { step1: 1, step2: 4, split_guest: 3, .. })
        ));
    }

    #[test]
    fn sub_pairs_never_negative() {
        let spec = SubPairsPool {
            minuend_range: [0, 10],
            subtrahend_range: [0, 10],
            constraints: Constraints { result_max: Some(5), ..Default::default() },
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        for q in sub_pairs(&mut ctx, &spec, 30, false) {
            let r: i32 = q.answer.parse().unwrap();
            assert!((0..=5).contains(&r), "{} = {r}", q.text);
        }
    }

    #[test]
    fn sub_stair_row_and_answer() {
        let spec = StairPool { base_numbers: vec![3], top_row_length: 4 };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &sub_stair(&mut ctx, &spec, 1)[0];
        assert_eq!(q.text, "stair:3");
        let Some(QuestionMetadata::Stair { row, base, .. }) = &q.metadata else { panic!("no stair metadata") };
        assert_eq!(row.len(), 4);
        assert!(row[0] >= 4 && row[0] <= 8);
        let expected: Vec<String> = row.iter().map(|m| (m - base).to_string()).collect();
        assert_eq!(q.answer, expected.join(","));
    }

    #[test]
    fn sub_2d_1d_borrow_filter() {
        let spec = MixedWidthPool {
            two_digit_range: [11, 19],
            one_digit_range: [1, 9],
            constraints: Constraints { borrow: true, ..Default::default() },
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut ctx = GenCtx::new(&mut rng);
        for q in sub_2d_1d(&mut ctx, &spec, 20) {
            let parts: Vec<i32> = q.text.split(" - ").map(|p| p.parse().unwrap()).collect();
            assert!(needs_borrow(parts[0], parts[1]), "{} should borrow", q.text);
        }
    }

    #[test]
    fn sub_add_mixed_uses_default_base() {
        let spec: SubAddMixedPool =
            serde_json::from_str(r#"{"subtrahendRange":[1,9],"addendRange":[1,9]}"#).unwrap();
        assert_eq!(spec.base, 10);
        let mut rng = StdRng::seed_from_u64(9);
        let mut ctx = GenCtx::new(&mut rng);
        for q in sub_add_mixed(&mut ctx, &spec, 10) {
            assert!(q.text.starts_with("10 - "));
            assert!(q.answer.parse::<i32>().unwrap() >= 0);
        }
    }
}
