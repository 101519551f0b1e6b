//! Application state: merged curriculum, the learner's progress and the
//! store it persists to.
//!
//! Every mutation goes through a ledger function and is saved in full right
//! away. Weak-set collection and review injection only run when the
//! curriculum enables `weakInjection`.

use rand::Rng;
use tracing::{info, warn};

use crate::config::DrillConfig;
use crate::drill_engine::{
    curriculum::{load_tracks, MergedCurriculum},
    error::{DrillError, Result},
    generator::generate_questions_for_stage,
    ledger,
    models::{Stage, StageProgress, UserProgress, WeakInjectionRule, WeakQuestion},
    persistence::{clear_progress, load_progress, save_progress, FileStore, ProgressStore},
    session::{RoundOutcome, StageRunner},
};

pub struct DrillApp<S: ProgressStore> {
    config: DrillConfig,
    curriculum: MergedCurriculum,
    progress: UserProgress,
    store: S,
}

impl DrillApp<FileStore> {
    /// Bootstrap against the progress file named by `config.storage_path`.
    pub fn from_config(config: DrillConfig) -> Result<Self> {
        let store = FileStore::new(config.storage_path.clone());
        info!(target: "persistence", path = %store.path().display(), "Using progress file.");
        Self::bootstrap(config, store)
    }
}

impl<S: ProgressStore> DrillApp<S> {
    /// Load the configured tracks, restore progress, open every start stage
    /// (and every stage in teacher mode), then save.
    pub fn bootstrap(config: DrillConfig, store: S) -> Result<Self> {
        let curriculum = load_tracks(&config.tracks)?;
        let progress = load_progress(&store);
        let mut app = DrillApp { config, curriculum, progress, store };
        app.seed();
        info!(
            target: "curriculum",
            tracks = app.curriculum.track_ids.len(),
            stages = app.curriculum.stages.len(),
            teacher_mode = app.config.teacher_mode,
            "Drill app ready."
        );
        Ok(app)
    }

    fn seed(&mut self) {
        let mut next = ledger::seed_start_stages(&self.progress, self.curriculum.start_stage_ids.iter().map(String::as_str));
        if self.config.teacher_mode {
            next = ledger::unlock_all_stages(&next, self.curriculum.stage_ids());
        }
        self.commit(next);
    }

    fn commit(&mut self, next: UserProgress) {
        self.progress = next;
        save_progress(&mut self.store, &self.progress);
    }

    pub fn config(&self) -> &DrillConfig {
        &self.config
    }

    pub fn curriculum(&self) -> &MergedCurriculum {
        &self.curriculum
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stage(&self, stage_id: &str) -> Result<&Stage> {
        self.curriculum
            .stage(stage_id)
            .ok_or_else(|| DrillError::StageNotFound(stage_id.to_string()))
    }

    /// Every stage with its progress; stages never touched show as locked.
    pub fn stages_with_progress(&self) -> Vec<(&Stage, StageProgress)> {
        self.curriculum
            .stages
            .iter()
            .map(|stage| {
                let progress = self
                    .progress
                    .stage(&stage.id)
                    .cloned()
                    .unwrap_or_else(|| StageProgress::locked(&stage.id));
                (stage, progress)
            })
            .collect()
    }

    /// First unlocked stage not yet cleared, in curriculum order.
    pub fn next_up(&self) -> Option<&Stage> {
        self.curriculum.stages.iter().find(|stage| {
            self.progress
                .stage(&stage.id)
                .map_or(false, |p| p.unlocked && !p.cleared)
        })
    }

    fn injection_rule(&self) -> Option<&WeakInjectionRule> {
        let rule = &self.curriculum.global_rules.weak_injection;
        rule.enabled.then_some(rule)
    }

    /// Generate a round for `stage_id` and wrap it in a ready runner.
    pub fn prepare_round<R: Rng>(&self, stage_id: &str, rng: &mut R) -> Result<StageRunner> {
        let stage = self.stage(stage_id)?;
        if !self.progress.is_unlocked(stage_id) {
            warn!(target: "session", stage_id, "Preparing a round for a locked stage.");
        }
        let rule = self.injection_rule();
        let weak: &[WeakQuestion] = if rule.is_some() { &self.progress.weak_set } else { &[] };
        let questions = generate_questions_for_stage(rng, stage, weak, rule);
        Ok(StageRunner::new(stage, &self.curriculum.global_rules, questions))
    }

    /// Feed a finished round into the ledger and persist.
    ///
    /// A pass on a stage with `onComplete.unlockTracks` also opens the start
    /// stage of each listed track that is loaded.
    pub fn record_stage_result(&mut self, stage_id: &str, outcome: &RoundOutcome, now: i64) -> Result<&UserProgress> {
        let stage = self.stage(stage_id)?.clone();
        let rules = &self.curriculum.global_rules;
        let mut next = ledger::apply_round_outcome(&self.progress, &stage, rules, outcome.passed, outcome.total_time_sec, now);

        if self.injection_rule().is_some() {
            next.weak_set = ledger::update_weak_set(&next.weak_set, &outcome.weak_entries(now), now);
        }
        if outcome.passed {
            if let Some(done) = &stage.on_complete {
                for track in &done.unlock_tracks {
                    match self.curriculum.start_stage_of(track) {
                        Some(start) => next = ledger::unlock_stage(&next, start),
                        None => warn!(target: "curriculum", track = %track, "Completion unlocks a track that is not loaded."),
                    }
                }
            }
        }
        next.current_stage_id = stage.id.clone();
        if let Some(track) = self.curriculum.track_of(&stage.id) {
            next.current_track_id = track.to_string();
        }
        self.commit(next);
        Ok(&self.progress)
    }

    pub fn unlock_stage(&mut self, stage_id: &str) -> Result<()> {
        self.stage(stage_id)?;
        let next = ledger::unlock_stage(&self.progress, stage_id);
        self.commit(next);
        Ok(())
    }

    pub fn unlock_all_stages(&mut self) {
        let next = ledger::unlock_all_stages(&self.progress, self.curriculum.stage_ids());
        info!(target: "ledger", stages = self.curriculum.stages.len(), "All stages unlocked.");
        self.commit(next);
    }

    /// Wipe stored progress and start over from the start stages.
    pub fn reset_all_data(&mut self) {
        clear_progress(&mut self.store);
        self.progress = UserProgress::default();
        info!(target: "ledger", "Progress reset.");
        self.seed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::persistence::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    fn app(teacher_mode: bool) -> DrillApp<MemoryStore> {
        let config = DrillConfig { teacher_mode, ..DrillConfig::default() };
        DrillApp::bootstrap(config, MemoryStore::new()).unwrap()
    }

    fn outcome(passed: bool) -> RoundOutcome {
        RoundOutcome {
            correct: if passed { 10 } else { 5 },
            attempted: 10,
            accuracy: if passed { 100 } else { 50 },
            passed,
            total_time_sec: 30.0,
            mistakes: Vec::new(),
        }
    }

    #[test]
    fn bootstrap_unlocks_only_start_stages() {
        let app = app(false);
        let unlocked: Vec<&str> = app
            .stages_with_progress()
            .into_iter()
            .filter(|(_, p)| p.unlocked)
            .map(|(s, _)| s.id.as_str())
            .collect();
        assert_eq!(unlocked.len(), 4);
        assert_eq!(app.next_up().unwrap().id, "G1A_NUM10_MAKE_SEQ_1_5");
        assert!(app.store().blob().is_some(), "bootstrap persists");
    }

    #[test]
    fn teacher_mode_unlocks_everything() {
        let app = app(true);
        assert!(app.stages_with_progress().iter().all(|(_, p)| p.unlocked));
    }

    #[test]
    fn pass_unlocks_successor_and_persists() {
        let mut app = app(false);
        app.record_stage_result("G1A_NUM10_MAKE_SEQ_1_5", &outcome(true), 1_000).unwrap();
        assert!(app.progress().is_unlocked("G1A_NUM10_MAKE_RND_1_9"));
        assert_eq!(app.progress().current_stage_id, "G1A_NUM10_MAKE_SEQ_1_5");
        assert_eq!(app.next_up().unwrap().id, "G1A_NUM10_MAKE_RND_1_9");

        let reloaded = load_progress(app.store());
        assert_eq!(&reloaded, app.progress());
    }

    #[test]
    fn unknown_stage_is_an_error() {
        let mut app = app(false);
        assert!(matches!(app.stage("NOPE"), Err(DrillError::StageNotFound(_))));
        assert!(app.unlock_stage("NOPE").is_err());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(app.prepare_round("NOPE", &mut rng).is_err());
    }

    #[test]
    fn prepared_round_has_no_review_when_injection_is_off() {
        let app = app(false);
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = app.prepare_round("G1A_NUM10_MAKE_SEQ_1_5", &mut rng).unwrap();
        runner.start();
        assert_eq!(runner.phase(), crate::drill_engine::session::ListPhase::New);
        assert_eq!(runner.current_question().unwrap().text, "1 + ? = 10");
    }

    #[test]
    fn reset_restores_start_state() {
        let mut app = app(false);
        app.unlock_all_stages();
        app.reset_all_data();
        let unlocked = app.stages_with_progress().iter().filter(|(_, p)| p.unlocked).count();
        assert_eq!(unlocked, 4);
    }

    #[test]
    fn from_config_persists_to_the_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let config = DrillConfig { storage_path: path.clone(), ..DrillConfig::default() };

        let mut app = DrillApp::from_config(config.clone()).unwrap();
        assert_eq!(app.store().path(), path.as_path());
        assert!(path.exists());
        app.unlock_stage("G1A_NUM10_MAKE_RND_1_9").unwrap();

        let reopened = DrillApp::from_config(config).unwrap();
        assert!(reopened.progress().stage_progress_map["G1A_NUM10_MAKE_RND_1_9"].unlocked);
    }
}
