use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};

use crate::drill_engine::{
    helpers::GenCtx,
    models::{PoolSpec, Question, Stage, StageMode, WeakInjectionRule, WeakQuestion, WeightedChoice},
    pools::{addition, multiplication, subtraction, written},
    shuffle,
};

/// Share of a round drawn from the weak set when no injection rule applies.
pub const DEFAULT_REVIEW_RATIO: f64 = 0.3;

/// Output of [`generate_questions_for_stage`]: review items are played first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedQuestions {
    pub review_questions: Vec<Question>,
    pub new_questions: Vec<Question>,
}

/// Seeded RNG when a seed is given, OS entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    }
}

/// Core dispatch: routes a pool spec to its generator.
///
/// Unknown pool types produce nothing; the caller treats an empty batch as
/// "no questions", not as an error.
pub fn generate_pool<R: Rng>(
    ctx: &mut GenCtx<'_, R>, spec: &PoolSpec, count: usize, sequential: bool,
) -> Vec<Question> {
    match spec {
        PoolSpec::TenComplement(p)      => addition::ten_complement(ctx, p, count, sequential),
        PoolSpec::AddPairs(p)           => addition::add_pairs(ctx, p, count, sequential),
        PoolSpec::AddThreeNumbers(p)    => addition::add_three_numbers(ctx, p, count),
        PoolSpec::StairAddition(p)      => addition::stair_addition(ctx, p, count),
        PoolSpec::Add2d1d(p)            => addition::add_2d_1d(ctx, p, count),
        PoolSpec::Add1d2d(p)            => addition::add_1d_2d(ctx, p, count),
        PoolSpec::AddCarryProcedure(p)  => addition::add_carry_procedure(ctx, p, count, sequential),
        PoolSpec::FixedSet(p)           => addition::fixed_set(ctx, p, count),
        PoolSpec::FixedSetRandom(p)     => addition::fixed_set_random(ctx, p, count),

        PoolSpec::SubPairs(p)           => subtraction::sub_pairs(ctx, p, count, sequential),
        PoolSpec::SubBorrowProcedure(p) => subtraction::sub_borrow_procedure(ctx, p, count, sequential),
        PoolSpec::SubStair(p)           => subtraction::sub_stair(ctx, p, count),
        PoolSpec::Sub2d1d(p)            => subtraction::sub_2d_1d(ctx, p, count),
        PoolSpec::SubAddMixed(p)        => subtraction::sub_add_mixed(ctx, p, count),

        PoolSpec::SkipCount(p)          => multiplication::skip_count(ctx, p, count),
        PoolSpec::ElevAdd(p)            => multiplication::elev_add(ctx, p, count),
        PoolSpec::MulLink(p)            => multiplication::mul_link(ctx, p, count),
        PoolSpec::MulTable(p)           => multiplication::mul_table(ctx, p, count, sequential),
        PoolSpec::MulReview(p)          => multiplication::mul_review(ctx, p, count),
        PoolSpec::MulMix(p)             => multiplication::mul_mix(ctx, p, count),
        PoolSpec::SkipTap(p)            => multiplication::skip_tap(ctx, p, count),

        PoolSpec::PlaceValue2d(p)       => written::place_value_2d(ctx, p, count),
        PoolSpec::PlaceValue3d(p)       => written::place_value_3d(ctx, p, count),
        PoolSpec::WrittenFormFill(p)    => written::written_form_fill(ctx, p, count),
        PoolSpec::WrittenFormChoice(p)  => written::written_form_choice(ctx, p, count),
        PoolSpec::WrittenAdd2d2d(p)     => written::written_add(ctx, p, count, "wa_2d2d"),
        PoolSpec::WrittenAdd(p)         => written::written_add(ctx, p, count, "wa"),
        PoolSpec::CarryMarkTap(p)       => written::carry_mark_tap(ctx, p, count),
        PoolSpec::MentalAddStep(p)      => written::mental_add_step(ctx, p, count),
        PoolSpec::WrittenVerify(p)      => written::written_verify(ctx, p, count),

        PoolSpec::Composite(p)          => composite(ctx, &p.choices, count),

        PoolSpec::Unsupported => {
            warn!(target: "generator", "Unsupported pool type; no questions generated.");
            Vec::new()
        }
    }
}

/// Cumulative-weight roulette over the choices.
///
/// Negative or NaN weights count as zero. With no positive weight at all the
/// first choice wins; with no choices there is nothing to pick.
pub fn pick_weighted<'c, R: Rng>(ctx: &mut GenCtx<'_, R>, choices: &'c [WeightedChoice]) -> Option<&'c PoolSpec> {
    let first = choices.first()?;
    let weight = |c: &WeightedChoice| c.weight.max(0.0);
    let total: f64 = choices.iter().map(weight).sum();
    if !(total > 0.0) {
        return Some(&first.spec);
    }
    let mut roll = ctx.unit() * total;
    for choice in choices {
        let w = weight(choice);
        roll -= w;
        if w > 0.0 && roll <= 0.0 {
            return Some(&choice.spec);
        }
    }
    // Float rounding can leave a sliver of `roll`; the last positive weight owns it.
    choices.iter().rev().find(|c| weight(*c) > 0.0).map(|c| &c.spec)
}

/// One question per draw, each from a freshly picked sub-pool. Sub-pools are
/// always sampled at random: a one-item sequential draw would only ever
/// return the head of its domain.
fn composite<R: Rng>(ctx: &mut GenCtx<'_, R>, choices: &[WeightedChoice], count: usize) -> Vec<Question> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(spec) = pick_weighted(ctx, choices) else {
            warn!(target: "generator", "Composite pool has no choices.");
            break;
        };
        if let Some(q) = generate_pool(ctx, spec, 1, false).into_iter().next() {
            out.push(q);
        }
    }
    out
}

/// How many weak-set items to replay in a round of `count` questions.
pub fn review_quota(count: usize, weak_len: usize, rule: Option<&WeakInjectionRule>) -> usize {
    let quota = match rule {
        Some(rule) if rule.enabled => {
            let raw = (count as f64 * rule.inject_ratio).floor().max(0.0) as usize;
            raw.max(rule.min_injected_per_round).min(rule.max_injected_per_round.max(rule.min_injected_per_round))
        }
        _ => (count as f64 * DEFAULT_REVIEW_RATIO).floor() as usize,
    };
    quota.min(weak_len)
}

/// Build one round for `stage`: review items sampled from `weak_set`, then
/// fresh questions from the stage's pool.
///
/// Sequential and fill-in stages never receive review items. Only the new
/// questions are shuffled for RND / MIX stages.
pub fn generate_questions_for_stage<R: Rng>(
    rng: &mut R,
    stage: &Stage,
    weak_set: &[WeakQuestion],
    rule: Option<&WeakInjectionRule>,
) -> GeneratedQuestions {
    let count = stage.round.questions;

    let review_questions: Vec<Question> = if stage.mode.accepts_review() && !weak_set.is_empty() {
        let quota = review_quota(count, weak_set.len(), rule);
        shuffle::sample(rng, weak_set, quota)
            .into_iter()
            .enumerate()
            .map(|(i, wq)| Question {
                id: format!("{}_review_{}", wq.data.id, i),
                is_review: true,
                ..wq.data
            })
            .collect()
    } else {
        Vec::new()
    };

    let sequential = stage.mode == StageMode::Seq;
    let mut ctx = GenCtx::new(rng);
    let mut new_questions = generate_pool(&mut ctx, &stage.pool_spec, count, sequential);
    if stage.mode.shuffles() {
        ctx.shuffle(&mut new_questions);
    }

    if new_questions.len() < count {
        warn!(
            target: "generator",
            stage_id = %stage.id,
            pool = stage.pool_spec.type_name(),
            requested = count,
            produced = new_questions.len(),
            "Stage produced fewer questions than requested."
        );
    }
    debug!(
        target: "generator",
        stage_id = %stage.id,
        mode = %stage.mode,
        review = review_questions.len(),
        new = new_questions.len(),
        "Generated round."
    );

    GeneratedQuestions { review_questions, new_questions }
}

/// Convenience wrapper: seeded (or entropy) RNG, then [`generate_questions_for_stage`].
pub fn generate_round(
    stage: &Stage,
    weak_set: &[WeakQuestion],
    rule: Option<&WeakInjectionRule>,
    rng_seed: Option<u64>,
) -> GeneratedQuestions {
    let mut rng = rng_from_seed(rng_seed);
    generate_questions_for_stage(&mut rng, stage, weak_set, rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::models::{
        AddPairsPool, CompositePool, Constraints, FixedSetPool, RoundConfig, TenComplementPool,
    };

    fn ten(n: i32) -> PoolSpec {
        PoolSpec::TenComplement(TenComplementPool { numbers: vec![n] })
    }

    fn stage(mode: StageMode, pool_spec: PoolSpec, questions: usize) -> Stage {
        Stage {
            id: "S".into(),
            title: "t".into(),
            skill_id: String::new(),
            mode,
            pool_spec,
            round: RoundConfig { questions, sec_per_question: 5.0, pass_override: None },
            next_stage_id: None,
            on_complete: None,
        }
    }

    #[test]
    fn weighted_pick_ignores_zero_weights() {
        let choices = vec![
            WeightedChoice { spec: ten(1), weight: 0.0 },
            WeightedChoice { spec: ten(2), weight: 3.0 },
        ];
        let mut rng = StdRng::seed_from_u64(4);
        let mut ctx = GenCtx::new(&mut rng);
        for _ in 0..50 {
            assert_eq!(pick_weighted(&mut ctx, &choices), Some(&ten(2)));
        }
    }

    #[test]
    fn weighted_pick_degenerate_falls_back_to_first() {
        let zero = vec![
            WeightedChoice { spec: ten(1), weight: 0.0 },
            WeightedChoice { spec: ten(2), weight: 0.0 },
        ];
        let mut rng = StdRng::seed_from_u64(4);
        let mut ctx = GenCtx::new(&mut rng);
        assert_eq!(pick_weighted(&mut ctx, &zero), Some(&ten(1)));
        assert_eq!(pick_weighted(&mut ctx, &[]), None);
    }

    #[test]
    fn composite_produces_count_with_unique_ids() {
        let spec = PoolSpec::Composite(CompositePool {
            choices: vec![
                WeightedChoice { spec: ten(3), weight: 1.0 },
                WeightedChoice {
                    spec: PoolSpec::AddPairs(AddPairsPool { a_range: [1, 9], b_range: [1, 9], constraints: Constraints::default() }),
                    weight: 1.0,
                },
            ],
        });
        let out = generate_round(&stage(StageMode::Mix, spec, 12), &[], None, Some(9));
        assert_eq!(out.new_questions.len(), 12);
        let mut ids: Vec<&str> = out.new_questions.iter().map(|q| q.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn composite_over_a_fixed_table_keeps_ids_unique() {
        let table = FixedSetPool { set_id: "carry".into(), notes: None };
        for spec in [PoolSpec::FixedSet(table.clone()), PoolSpec::FixedSetRandom(table)] {
            let composite = PoolSpec::Composite(CompositePool {
                choices: vec![WeightedChoice { spec, weight: 1.0 }],
            });
            let mut rng = StdRng::seed_from_u64(17);
            let mut ctx = GenCtx::new(&mut rng);
            let out = generate_pool(&mut ctx, &composite, 20, false);
            assert_eq!(out.len(), 20);
            let mut ids: Vec<&str> = out.iter().map(|q| q.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), 20, "duplicate ids in {:?}", composite.type_name());
        }
    }

    #[test]
    fn unsupported_pool_is_empty() {
        let out = generate_round(&stage(StageMode::Rnd, PoolSpec::Unsupported, 5), &[], None, Some(1));
        assert!(out.new_questions.is_empty());
    }

    #[test]
    fn review_quota_policies() {
        assert_eq!(review_quota(10, 100, None), 3);
        assert_eq!(review_quota(10, 1, None), 1);
        let rule = WeakInjectionRule { enabled: true, inject_ratio: 0.5, min_injected_per_round: 1, max_injected_per_round: 2, ..Default::default() };
        assert_eq!(review_quota(10, 100, Some(&rule)), 2);
        assert_eq!(review_quota(1, 100, Some(&rule)), 1);
    }
}
