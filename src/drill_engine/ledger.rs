//! Progress ledger: pure functions from one [`UserProgress`] to the next.
//!
//! Nothing here mutates its input. Callers persist the returned value.
//! `unlocked` and `cleared` are monotone: no function in this module ever
//! sets either back to `false`.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::drill_engine::models::{GlobalRules, Stage, StageProgress, UserProgress, WeakQuestion};

/// Most weak questions kept, newest first.
pub const WEAK_SET_CAP: usize = 50;

/// What one finished round reports to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub passed: bool,
    /// Seconds spent on the round; zero or `None` never becomes a best time.
    pub time_sec: Option<f64>,
    pub next_stage_id: Option<String>,
}

/// Record one round on `stage_id`.
///
/// A pass bumps `consecutive_passes` and marks the stage cleared; a fail
/// resets the streak but leaves `cleared` alone. A pass with a successor
/// unlocks the successor straight away.
pub fn update_stage_progress(current: &UserProgress, stage_id: &str, result: &StageResult, now: i64) -> UserProgress {
    let mut next = current.clone();
    let prev = next
        .stage_progress_map
        .get(stage_id)
        .cloned()
        .unwrap_or_else(|| StageProgress::unlocked(stage_id));

    let consecutive_passes = if result.passed { prev.consecutive_passes + 1 } else { 0 };
    let best_time_sec = match (result.time_sec, prev.best_time_sec) {
        (Some(t), Some(best)) if t > 0.0 && t < best => Some(t),
        (Some(t), None) if t > 0.0 => Some(t),
        (_, best) => best,
    };
    next.stage_progress_map.insert(
        stage_id.to_string(),
        StageProgress {
            consecutive_passes,
            best_time_sec,
            cleared: prev.cleared || result.passed,
            ..prev
        },
    );

    if result.passed {
        if let Some(successor) = &result.next_stage_id {
            mark_unlocked(&mut next, successor);
        }
    }

    next.last_played_at = now;
    debug!(
        target: "ledger",
        stage_id,
        passed = result.passed,
        consecutive_passes,
        "Stage progress updated."
    );
    next
}

fn mark_unlocked(progress: &mut UserProgress, stage_id: &str) {
    progress
        .stage_progress_map
        .entry(stage_id.to_string())
        .or_insert_with(|| StageProgress::locked(stage_id))
        .unlocked = true;
}

/// Ledger update plus the stricter successor check: once the stage's
/// consecutive-pass requirement is met, the successor is (re)confirmed
/// unlocked.
pub fn apply_round_outcome(
    current: &UserProgress, stage: &Stage, rules: &GlobalRules, passed: bool, time_sec: f64, now: i64,
) -> UserProgress {
    let result = StageResult {
        passed,
        time_sec: Some(time_sec),
        next_stage_id: stage.next_stage_id.clone(),
    };
    let mut next = update_stage_progress(current, &stage.id, &result, now);

    let required = rules.passes_required(stage);
    let streak = next.stage(&stage.id).map_or(0, |p| p.consecutive_passes);
    if passed && streak >= required {
        if let Some(successor) = &stage.next_stage_id {
            mark_unlocked(&mut next, successor);
            info!(target: "ledger", stage_id = %stage.id, next = %successor, streak, "Pass streak met; successor unlocked.");
        }
    }
    next
}

/// Merge newly missed questions into the weak set.
///
/// Entries match on `question_id`: a repeat bumps `mistake_count`, refreshes
/// `last_mistake_at` to `now` and replaces the stored question. The result is
/// newest-first and at most [`WEAK_SET_CAP`] long.
pub fn update_weak_set(current: &[WeakQuestion], new_mistakes: &[WeakQuestion], now: i64) -> Vec<WeakQuestion> {
    let mut merged: Vec<WeakQuestion> = current.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, w)| (w.question_id.clone(), i))
        .collect();

    for mistake in new_mistakes {
        match index.get(&mistake.question_id) {
            Some(&i) => {
                let entry = &mut merged[i];
                entry.mistake_count += 1;
                entry.last_mistake_at = now;
                entry.data = mistake.data.clone();
            }
            None => {
                index.insert(mistake.question_id.clone(), merged.len());
                merged.push(mistake.clone());
            }
        }
    }

    merged.sort_by(|a, b| b.last_mistake_at.cmp(&a.last_mistake_at));
    merged.truncate(WEAK_SET_CAP);
    merged
}

/// Force one stage open.
pub fn unlock_stage(current: &UserProgress, stage_id: &str) -> UserProgress {
    let mut next = current.clone();
    mark_unlocked(&mut next, stage_id);
    next
}

/// Force every listed stage open (teacher mode).
pub fn unlock_all_stages<'a, I>(current: &UserProgress, stage_ids: I) -> UserProgress
where
    I: IntoIterator<Item = &'a str>,
{
    let mut next = current.clone();
    for id in stage_ids {
        mark_unlocked(&mut next, id);
    }
    next
}

/// Give each start stage an unlocked entry if it has none yet. Existing
/// entries are left untouched.
pub fn seed_start_stages<'a, I>(current: &UserProgress, start_ids: I) -> UserProgress
where
    I: IntoIterator<Item = &'a str>,
{
    let mut next = current.clone();
    for id in start_ids {
        next.stage_progress_map
            .entry(id.to_string())
            .or_insert_with(|| StageProgress::unlocked(id));
    }
    next
}
