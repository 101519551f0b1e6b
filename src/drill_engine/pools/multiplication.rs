use rand::Rng;

use crate::drill_engine::{
    helpers::{question, question_with, span_values, GenCtx},
    models::{
        ElevAddPool, LinkDirection, MulLinkPool, MulMixPool, MulReviewPool, MulTablePool, Question,
        QuestionKind, QuestionMetadata, SkipCountPool, SkipTapPool, TableOrder,
    },
    shuffle,
};

/// How many times an ascending multiplication table is walked before stopping.
const TABLE_REPEATS: usize = 3;
const DEFAULT_TAP_BOARD: usize = 12;
const DEFAULT_TAP_SECONDS: u32 = 15;
/// Distractors are drawn from at most this many values below `to + 5`.
const DISTRACTOR_WINDOW: i32 = 200;

/// `from, from + step, ...` up to and including `to`. Empty for `step <= 0`.
/// Stops at the last value below `i32::MAX` instead of wrapping.
fn arithmetic_run(from: i32, to: i32, step: i32) -> Vec<i32> {
    if step <= 0 {
        return Vec::new();
    }
    let mut run = Vec::new();
    let mut n = from;
    while n <= to {
        run.push(n);
        match n.checked_add(step) {
            Some(next) => n = next,
            None => break,
        }
    }
    run
}

/// Skip counting with boxes: one question per hidden value, in order.
///
/// Earlier blanks are shown filled in, so the learner walks the sequence
/// left to right: `2 → 4 → □ → □ → 10`, then `2 → 4 → 6 → □ → 10`.
pub fn skip_count<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &SkipCountPool, count: usize) -> Vec<Question> {
    let sequence = arithmetic_run(spec.from, spec.to, spec.step);
    let show = spec.show_numbers.clone().unwrap_or_else(|| vec![spec.from, spec.to]);
    let blanks: Vec<(usize, i32)> = sequence
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !show.contains(v))
        .collect();

    blanks
        .iter()
        .take(count)
        .map(|&(blank_index, value)| {
            let text = sequence
                .iter()
                .enumerate()
                .map(|(idx, v)| {
                    if show.contains(v) || idx < blank_index {
                        v.to_string()
                    } else {
                        "□".to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" → ");
            question_with(
                ctx.id(&format!("skip_{}_{}", spec.step, blank_index)),
                text,
                value,
                QuestionKind::Input,
                QuestionMetadata::SkipCount {
                    step: spec.step,
                    sequence: sequence.clone(),
                    blank_index,
                    show_numbers: show.clone(),
                },
            )
        })
        .collect()
}

/// Elevator addition: `0 + 2`, `2 + 2`, `4 + 2`, ... in step order.
pub fn elev_add<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &ElevAddPool, count: usize) -> Vec<Question> {
    span_values(spec.steps_range)
        .take(count)
        .map(|step| {
            let current = spec.start + (step - 1) * spec.add;
            question_with(
                ctx.id(&format!("elev_add_{}_{}", spec.add, step)),
                format!("{} + {}", current, spec.add),
                current + spec.add,
                QuestionKind::Input,
                QuestionMetadata::Elevator { step, addend: spec.add },
            )
        })
        .collect()
}

fn repeated(n: i32, times: i32) -> String {
    vec![n.to_string(); times.max(0) as usize].join("+")
}

/// Repeated addition linked to multiplication, in either direction.
pub fn mul_link<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MulLinkPool, count: usize) -> Vec<Question> {
    let n = spec.n;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let multiplier = ctx.int(spec.range);
        let direction = match spec.direction {
            LinkDirection::Both => {
                if ctx.chance(0.5) { LinkDirection::AddToMul } else { LinkDirection::MulToAdd }
            }
            fixed => fixed,
        };
        let meta = QuestionMetadata::MulLink { n, multiplier, direction };
        let q = match direction {
            LinkDirection::MulToAdd => {
                let partial = repeated(n, multiplier - 1);
                let rhs = if partial.is_empty() { "□".to_string() } else { format!("{partial}+□") };
                question_with(
                    ctx.id(&format!("mul_link_mta_{n}_{multiplier}")),
                    format!("{n}×{multiplier} = {rhs}"),
                    n,
                    QuestionKind::Input,
                    meta,
                )
            }
            _ => question_with(
                ctx.id(&format!("mul_link_atm_{n}_{multiplier}")),
                format!("{} = {n}×□", repeated(n, multiplier)),
                multiplier,
                QuestionKind::Input,
                meta,
            ),
        };
        out.push(q);
    }
    out
}

fn fact<R: Rng>(ctx: &mut GenCtx<'_, R>, stem: &str, n: i32, m: i32) -> Question {
    question_with(
        ctx.id(&format!("{stem}_{n}_{m}")),
        format!("{n}×{m}"),
        n * m,
        QuestionKind::Input,
        QuestionMetadata::MulFact { n, m },
    )
}

/// One times-table row. Ascending (or sequential) walks `n×min..=n×max` three
/// times before truncating; otherwise multiplicands are drawn at random.
pub fn mul_table<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &MulTablePool, count: usize, sequential: bool,
) -> Vec<Question> {
    if sequential || spec.order == Some(TableOrder::Asc) {
        let row: Vec<i32> = span_values(spec.range).collect();
        return row
            .iter()
            .cycle()
            .take(row.len() * TABLE_REPEATS)
            .take(count)
            .map(|&m| fact(ctx, "mul_table", spec.n, m))
            .collect();
    }
    (0..count)
        .map(|_| {
            let m = ctx.int(spec.range);
            fact(ctx, "mul_table", spec.n, m)
        })
        .collect()
}

/// Review across several tables, with an optional floor per table.
pub fn mul_review<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MulReviewPool, count: usize) -> Vec<Question> {
    let min_per_n = spec.distribution.as_ref().and_then(|d| d.min_per_n).unwrap_or(0);
    let mut out = Vec::with_capacity(count);
    for n in span_values([spec.from_n, spec.to_n]) {
        for _ in 0..min_per_n {
            if out.len() == count {
                break;
            }
            let m = ctx.int(spec.range);
            out.push(fact(ctx, "mul_review", n, m));
        }
    }
    while out.len() < count {
        let n = ctx.int([spec.from_n, spec.to_n]);
        let m = ctx.int(spec.range);
        out.push(fact(ctx, "mul_review", n, m));
    }
    ctx.shuffle(&mut out);
    out
}

/// Any table, any multiplicand.
pub fn mul_mix<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &MulMixPool, count: usize) -> Vec<Question> {
    (0..count)
        .map(|_| {
            let n = ctx.int([spec.from_n, spec.to_n]);
            let m = ctx.int(spec.range);
            fact(ctx, "mul_mix", n, m)
        })
        .collect()
}

/// Tap-the-multiples game. The board (every target plus random distractors,
/// shuffled) is fixed at generation time so the tap pad can be replayed.
pub fn skip_tap<R: Rng>(ctx: &mut GenCtx<'_, R>, spec: &SkipTapPool, count: usize) -> Vec<Question> {
    let targets = arithmetic_run(spec.from, spec.to, spec.step);
    if targets.is_empty() {
        return Vec::new();
    }
    let total_numbers = spec.total_numbers.unwrap_or(DEFAULT_TAP_BOARD);
    let time_limit = spec.time_limit.unwrap_or(DEFAULT_TAP_SECONDS);
    let hi = spec.to.saturating_add(5);
    let lo = hi.saturating_sub(DISTRACTOR_WINDOW).max(1);
    let distractors: Vec<i32> = (lo..=hi).filter(|v| !targets.contains(v)).collect();
    // The tap pad submits "tapped/targets"; a full board is the right answer.
    let answer = format!("{0}/{0}", targets.len());

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let extra = total_numbers.saturating_sub(targets.len());
        let mut board = targets.clone();
        board.extend(shuffle::sample(ctx.rng(), &distractors, extra));
        ctx.shuffle(&mut board);
        out.push(question_with(
            ctx.id(&format!("skip_tap_{}", spec.step)),
            format!("Tap the numbers counting by {}", spec.step),
            &answer,
            QuestionKind::Tap,
            QuestionMetadata::SkipTap {
                step: spec.step,
                from: spec.from,
                to: spec.to,
                total_numbers,
                time_limit,
                board,
            },
        ));
    }
    out
}
