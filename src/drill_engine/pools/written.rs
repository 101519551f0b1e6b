//! Written (column) arithmetic: place value, layout, carry marks and checks.

use std::collections::HashSet;
use rand::Rng;

use crate::drill_engine::{
    helpers::{digits, ones_carry, question_with, GenCtx, CAP_TIGHT},
    models::{
        CarryMarkTapPool, InputOrder, LayoutChoice, LayoutError, MentalAddStepPool,
        PlaceValue2dPool, PlaceValue3dPool, Question, QuestionKind, QuestionMetadata, VerifyType,
        WrittenAddPool, WrittenFormChoicePool, WrittenFormFillPool, WrittenVerifyPool,
    },
};

/// Re-roll budget per question for the place-value pools.
const REROLLS: usize = 50;
/// Zero-middle bias only applies during the first draws of a question.
const ZERO_MIDDLE_DRAWS: usize = 20;
const ZERO_MIDDLE_RATE: f64 = 0.3;
/// The same tens digit may appear at most this many times in a row.
const MAX_TENS_STREAK: usize = 2;
const CHOICES: usize = 3;

/// Two-digit place value: `47` → `"4,7"`.
///
/// Avoids repeating a number within the batch and avoids three questions in
/// a row sharing a tens digit; when the range is too narrow to honour both,
/// the last draw is kept.
pub fn place_value_2d<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &PlaceValue2dPool, count: usize) -> Vec<Question> {
    let mut used = HashSet::new();
    let mut last_tens = None;
    let mut streak = 0usize;
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        let mut num = ctx.int(spec.range);
        for _ in 1..REROLLS {
            let breaks_streak = last_tens == Some(num / 10) && streak >= MAX_TENS_STREAK;
            if !breaks_streak && !used.contains(&num) {
                break;
            }
            num = ctx.int(spec.range);
        }
        used.insert(num);

        let (tens, ones) = (num / 10, num % 10);
        if last_tens == Some(tens) {
            streak += 1;
        } else {
            last_tens = Some(tens);
            streak = 1;
        }

        out.push(question_with(
            ctx.id(&format!("pv_2d_{num}")),
            num.to_string(),
            format!("{tens},{ones}"),
            QuestionKind::PlaceValue,
            QuestionMetadata::PlaceValue { number: num, hundreds: None, tens, ones, has_zero_middle: false },
        ));
    }
    out
}

/// Three-digit place value: `405` → `"4,0,5"`, optionally biased toward a
/// zero in the tens place.
pub fn place_value_3d<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &PlaceValue3dPool, count: usize) -> Vec<Question> {
    let mut used = HashSet::new();
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        let mut num = 0;
        for attempt in 0..REROLLS {
            num = ctx.int(spec.range);
            if spec.include_zero_middle && attempt < ZERO_MIDDLE_DRAWS && ctx.chance(ZERO_MIDDLE_RATE) {
                num = ctx.int_between(1, 9) * 100 + ctx.int_between(0, 9);
            }
            if !used.contains(&num) {
                break;
            }
        }
        used.insert(num);

        let (hundreds, tens, ones) = (num / 100, (num % 100) / 10, num % 10);
        out.push(question_with(
            ctx.id(&format!("pv_3d_{num}")),
            num.to_string(),
            format!("{hundreds},{tens},{ones}"),
            QuestionKind::PlaceValue,
            QuestionMetadata::PlaceValue {
                number: num,
                hundreds: Some(hundreds),
                tens,
                ones,
                has_zero_middle: tens == 0,
            },
        ));
    }
    out
}

/// Where the bottom operand's first digit goes: under the ones or the tens.
pub fn written_form_fill<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &WrittenFormFillPool, count: usize,
) -> Vec<Question> {
    (0..count)
        .map(|_| {
            let a = ctx.int(spec.operand_a_range);
            let b = ctx.int(spec.operand_b_range);
            question_with(
                ctx.id(&format!("wf_fill_{a}_{b}")),
                format!("{a} + {b}"),
                if a < 10 { "ones" } else { "tens" },
                QuestionKind::WrittenFormFill,
                QuestionMetadata::FormFill {
                    format: spec.format,
                    top_number: a,
                    bottom_number: b,
                    top_digits: digits(a),
                    bottom_digits: digits(b),
                },
            )
        })
        .collect()
}

/// Pick the correctly aligned layout among three; the answer is its index.
pub fn written_form_choice<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &WrittenFormChoicePool, count: usize,
) -> Vec<Question> {
    let errors: Vec<LayoutError> = if spec.error_types.is_empty() {
        vec![LayoutError::RightShift, LayoutError::LeftShift, LayoutError::BlankShift]
    } else {
        spec.error_types.clone()
    };

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let a = ctx.int(spec.operand_a_range);
        let b = ctx.int(spec.operand_b_range);
        let correct_index = ctx.rng().gen_range(0..CHOICES);
        let choices = (0..CHOICES)
            .map(|j| {
                if j == correct_index {
                    LayoutChoice { error: None, is_correct: true }
                } else {
                    LayoutChoice { error: ctx.pick(&errors), is_correct: false }
                }
            })
            .collect();
        out.push(question_with(
            ctx.id(&format!("wf_choice_{a}_{b}")),
            format!("{a} + {b}"),
            correct_index,
            QuestionKind::WrittenFormChoice,
            QuestionMetadata::FormChoice { top_number: a, bottom_number: b, choices, correct_index },
        ));
    }
    out
}

/// Column addition with full carry bookkeeping.
///
/// `carryRequired` keeps only sums with a ones carry; `noCarry` rejects a
/// ones carry and any sum of 100 or more.
pub fn written_add<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &WrittenAddPool, count: usize, stem: &str,
) -> Vec<Question> {
    let input_order = spec.input_order.unwrap_or(InputOrder::OnesFirst);
    ctx.rejection_sample(stem, count, CAP_TIGHT, |ctx| {
        let a = ctx.int(spec.a_range);
        let b = ctx.int(spec.b_range);
        let sum = a + b;
        let has_carry = ones_carry(a, b);
        if spec.carry_required && !has_carry {
            return None;
        }
        if spec.no_carry && (has_carry || sum >= 100) {
            return None;
        }
        let carry_value = i32::from(has_carry);
        Some(question_with(
            ctx.id(&format!("{stem}_{a}_{b}")),
            format!("{a} + {b}"),
            sum,
            QuestionKind::WrittenAdd,
            QuestionMetadata::WrittenAdd {
                a,
                b,
                sum,
                a_ones: a % 10,
                a_tens: a / 10,
                b_ones: b % 10,
                b_tens: b / 10,
                ones_sum: a % 10 + b % 10,
                tens_sum: a / 10 + b / 10 + carry_value,
                has_carry,
                carry_value,
                answer_ones: sum % 10,
                answer_tens: (sum % 100) / 10,
                answer_hundreds: (sum >= 100).then_some(sum / 100),
                input_order,
            },
        ))
    })
}

/// Decide whether the tens column needs a carry mark. `carryRatio` of the
/// questions aim for a carry; each aim gets a bounded number of draws.
pub fn carry_mark_tap<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &CarryMarkTapPool, count: usize) -> Vec<Question> {
    let ratio = spec.carry_ratio.unwrap_or(0.5);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let want_carry = ctx.chance(ratio);
        let (mut a, mut b) = (ctx.int(spec.a_range), ctx.int(spec.b_range));
        for _ in 1..REROLLS {
            if ones_carry(a, b) == want_carry {
                break;
            }
            a = ctx.int(spec.a_range);
            b = ctx.int(spec.b_range);
        }
        let has_carry = ones_carry(a, b);
        out.push(question_with(
            ctx.id(&format!("cm_tap_{a}_{b}")),
            format!("{a} + {b}"),
            if has_carry { "tens" } else { "none" },
            QuestionKind::CarryMarkTap,
            QuestionMetadata::CarryMark { a, b, has_carry },
        ));
    }
    out
}

/// Check an addition by subtracting one addend back out of the sum.
pub fn written_verify<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &WrittenVerifyPool, count: usize) -> Vec<Question> {
    (0..count)
        .map(|_| {
            let a = ctx.int(spec.a_range);
            let b = ctx.int(spec.b_range);
            let subtract_a = match spec.verify_type {
                VerifyType::SubtractA => true,
                VerifyType::SubtractB => false,
                VerifyType::Random => ctx.chance(0.5),
            };
            let (bottom, expected) = if subtract_a { (a, b) } else { (b, a) };
            let top = a + b;
            question_with(
                ctx.id(&format!("wv_{a}_{b}")),
                format!("{top} - {bottom}"),
                expected,
                QuestionKind::WrittenVerify,
                QuestionMetadata::WrittenVerify { top, bottom, expected_answer: expected },
            )
        })
        .collect()
}

/// Mental addition answered tens digit first, then ones digit.
pub fn mental_add_step<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &MentalAddStepPool, count: usize,
) -> Vec<Question> {
    (0..count)
        .map(|_| {
            let a = ctx.int(spec.a_range);
            let b = ctx.int(spec.b_range);
            let sum = a + b;
            let (tens_part, ones_part) = (sum / 10, sum % 10);
            question_with(
                ctx.id(&format!("mental_{a}_{b}")),
                format!("{a} + {b}"),
                format!("{tens_part}{ones_part}"),
                QuestionKind::MentalAddStep,
                QuestionMetadata::MentalStep { a, b, tens_part, ones_part, has_carry: ones_carry(a, b) },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::FormFillFormat;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn place_value_2d_answer_format() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &place_value_2d(&mut ctx, &PlaceValue2dPool { range: [47, 47] }, 1)[0];
        assert_eq!(q.text, "47");
        assert_eq!(q.answer, "4,7");
    }

    #[test]
    fn place_value_2d_breaks_tens_streaks() {
        for seed in [1u64, 2, 3, 42] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ctx = GenCtx::new(&mut rng);
            let qs = place_value_2d(&mut ctx, &PlaceValue2dPool { range: [10, 99] }, 30);
            for w in qs.windows(3) {
                let tens: Vec<char> = w.iter().map(|q| q.answer.chars().next().unwrap()).collect();
                assert!(!(tens[0] == tens[1] && tens[1] == tens[2]), "seed {seed}: streak {tens:?}");
            }
        }
    }

    #[test]
    fn place_value_3d_zero_middle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &place_value_3d(&mut ctx, &PlaceValue3dPool { range: [405, 405], include_zero_middle: false }, 1)[0];
        assert_eq!(q.answer, "4,0,5");
        assert!(matches!(q.metadata, Some(QuestionMetadata::PlaceValue { has_zero_middle: true, .. })));
    }

    #[test]
    fn written_add_carry_filters() {
        let required = WrittenAddPool { a_range: [10, 99], b_range: [10, 99], carry_required: true, no_carry: false, input_order: None };
        let none = WrittenAddPool { carry_required: false, no_carry: true, ..required.clone() };
        let mut rng = StdRng::seed_from_u64(17);
        let mut ctx = GenCtx::new(&mut rng);

        for q in written_add(&mut ctx, &required, 20, "wa_2d2d") {
            let Some(QuestionMetadata::WrittenAdd { has_carry, tens_sum, a_tens, b_tens, .. }) = q.metadata else {
                panic!("missing metadata")
            };
            assert!(has_carry);
            assert_eq!(tens_sum, a_tens + b_tens + 1);
        }
        for q in written_add(&mut ctx, &none, 20, "wa_2d2d") {
            let Some(QuestionMetadata::WrittenAdd { has_carry, sum, answer_hundreds, .. }) = q.metadata else {
                panic!("missing metadata")
            };
            assert!(!has_carry && sum < 100 && answer_hundreds.is_none(), "{}", q.text);
        }
    }

    #[test]
    fn form_fill_alignment_answer() {
        let spec = WrittenFormFillPool { operand_a_range: [5, 5], operand_b_range: [23, 23], format: FormFillFormat::PlaceLower };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        assert_eq!(written_form_fill(&mut ctx, &spec, 1)[0].answer, "ones");
    }

    #[test]
    fn form_choice_has_one_correct_layout() {
        let spec = WrittenFormChoicePool { operand_a_range: [10, 99], operand_b_range: [1, 9], error_types: vec![] };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        for q in written_form_choice(&mut ctx, &spec, 10) {
            let Some(QuestionMetadata::FormChoice { choices, correct_index, .. }) = q.metadata else { panic!() };
            assert_eq!(choices.iter().filter(|c| c.is_correct).count(), 1);
            assert!(choices[correct_index].is_correct);
            assert_eq!(q.answer, correct_index.to_string());
        }
    }

    #[test]
    fn verify_subtracts_requested_operand() {
        let spec = WrittenVerifyPool { a_range: [30, 30], b_range: [12, 12], verify_type: VerifyType::SubtractA };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &written_verify(&mut ctx, &spec, 1)[0];
        assert_eq!(q.text, "42 - 30");
        assert_eq!(q.answer, "12");
    }

    #[test]
    fn carry_mark_full_ratio_always_carries() {
        let spec = CarryMarkTapPool { a_range: [10, 99], b_range: [10, 99], carry_ratio: Some(1.0) };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        assert!(carry_mark_tap(&mut ctx, &spec, 10).iter().all(|q| q.answer == "tens"));
    }

    #[test]
    fn mental_step_answer_is_tens_then_ones() {
        let spec = MentalAddStepPool { a_range: [27, 27], b_range: [15, 15], step_type: None };
        let mut rng = StdRng::seed_from_u64(2);
        let mut ctx = GenCtx::new(&mut rng);
        let q = &mental_add_step(&mut ctx, &spec, 1)[0];
        assert_eq!(q.answer, "42");
        assert!(matches!(q.metadata, Some(QuestionMetadata::MentalStep { tens_part: 4, ones_part: 2, has_carry: true, .. })));
    }
}
