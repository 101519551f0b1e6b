//! One play-through of a stage.
//!
//! [`StageRunner`] never reads a clock: the host calls [`StageRunner::tick`]
//! with elapsed seconds and forwards keypad tokens through
//! [`StageRunner::input`]. States run
//! `Ready → Playing ⇄ Feedback → … → Finished`, with a `Transition` pause
//! between the review list and the new list.
//!
//! A manual submission moves the runner to `Feedback` before any later tick
//! is processed, so it always beats the countdown.

use tracing::{debug, info};

use crate::drill_engine::{
    generator::GeneratedQuestions,
    input::{pad_for, AnswerPad, InputToken, PadEvent, Submission},
    models::{GlobalRules, Question, QuestionResult, Stage, WeakQuestion},
};

/// Countdown granularity; longer `tick` calls are processed in slices of this.
pub const TICK_SEC: f64 = 0.1;
pub const FEEDBACK_HOLD_SEC: f64 = 1.0;
pub const PHASE_TRANSITION_SEC: f64 = 2.0;
/// Input is ignored this long after the round starts.
pub const INPUT_DEBOUNCE_SEC: f64 = 0.5;
/// Wrong answers within one question list that end the round.
///
/// The count is per list: a miss in the review list does not carry over into
/// the new list, which starts again from zero after the transition.
pub const MISTAKE_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Ready,
    Playing,
    Feedback { correct: bool },
    Transition,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Review,
    New,
}

/// Final score of a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub correct: usize,
    pub attempted: usize,
    /// Rounded percentage; 0 when nothing was attempted.
    pub accuracy: u32,
    pub passed: bool,
    pub total_time_sec: f64,
    /// Missed questions, in play order.
    pub mistakes: Vec<Question>,
}

impl RoundOutcome {
    /// Score answered questions against an accuracy threshold in percent.
    pub fn from_results(results: &[QuestionResult], pass_accuracy: u32) -> Self {
        let attempted = results.len();
        let correct = results.iter().filter(|r| r.is_correct).count();
        let accuracy = if attempted == 0 {
            0
        } else {
            (correct as f64 / attempted as f64 * 100.0).round() as u32
        };
        RoundOutcome {
            correct,
            attempted,
            accuracy,
            passed: attempted > 0 && accuracy >= pass_accuracy,
            total_time_sec: results.iter().map(|r| r.time_taken).sum(),
            mistakes: results.iter().filter(|r| !r.is_correct).map(|r| r.question.clone()).collect(),
        }
    }

    /// Missed questions as fresh weak-set entries stamped `now`.
    pub fn weak_entries(&self, now: i64) -> Vec<WeakQuestion> {
        self.mistakes.iter().map(|q| WeakQuestion::first_miss(q, now)).collect()
    }
}

pub struct StageRunner {
    stage_id: String,
    sec_per_question: f64,
    pass_accuracy: u32,
    review: Vec<Question>,
    fresh: Vec<Question>,
    phase: ListPhase,
    index: usize,
    state: RunnerState,
    pad: Option<Box<dyn AnswerPad>>,
    time_left: f64,
    question_elapsed: f64,
    hold_left: f64,
    debounce_left: f64,
    /// Misses in the current list only; cleared when the new list starts.
    list_mistakes: usize,
    results: Vec<QuestionResult>,
    outcome: Option<RoundOutcome>,
}

impl StageRunner {
    pub fn new(stage: &Stage, rules: &GlobalRules, questions: GeneratedQuestions) -> Self {
        let GeneratedQuestions { review_questions, new_questions } = questions;
        StageRunner {
            stage_id: stage.id.clone(),
            sec_per_question: stage.round.sec_per_question,
            pass_accuracy: rules.pass_accuracy(stage),
            phase: if review_questions.is_empty() { ListPhase::New } else { ListPhase::Review },
            review: review_questions,
            fresh: new_questions,
            index: 0,
            state: RunnerState::Ready,
            pad: None,
            time_left: stage.round.sec_per_question,
            question_elapsed: 0.0,
            hold_left: 0.0,
            debounce_left: 0.0,
            list_mistakes: 0,
            results: Vec::new(),
            outcome: None,
        }
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn phase(&self) -> ListPhase {
        self.phase
    }

    /// Seconds left on the current question's countdown.
    pub fn time_left(&self) -> f64 {
        self.time_left
    }

    pub fn results(&self) -> &[QuestionResult] {
        &self.results
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    fn list(&self) -> &[Question] {
        match self.phase {
            ListPhase::Review => &self.review,
            ListPhase::New => &self.fresh,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            RunnerState::Finished | RunnerState::Transition => None,
            _ => self.list().get(self.index),
        }
    }

    /// Explicit start from `Ready`. A round with nothing to play finishes at once.
    pub fn start(&mut self) {
        if self.state != RunnerState::Ready {
            return;
        }
        self.debounce_left = INPUT_DEBOUNCE_SEC;
        if self.list().is_empty() {
            self.finish();
            return;
        }
        info!(
            target: "session",
            stage_id = %self.stage_id,
            review = self.review.len(),
            new = self.fresh.len(),
            "Round started."
        );
        self.begin_question();
    }

    fn begin_question(&mut self) {
        self.time_left = self.sec_per_question;
        self.question_elapsed = 0.0;
        self.pad = self.list().get(self.index).map(pad_for);
        self.state = RunnerState::Playing;
    }

    /// Route one keypad token to the active question's pad.
    pub fn input(&mut self, token: InputToken) -> PadEvent {
        if self.state != RunnerState::Playing || self.debounce_left > 0.0 {
            return PadEvent::Ignored;
        }
        let Some(pad) = self.pad.as_mut() else { return PadEvent::Ignored };
        let event = pad.handle(token);
        if let PadEvent::Submitted(submission) = &event {
            self.record(submission.clone());
        }
        event
    }

    /// Advance the clock by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let mut remaining = dt.max(0.0);
        while remaining > 0.0 && self.state != RunnerState::Finished {
            let slice = remaining.min(TICK_SEC);
            remaining -= slice;
            self.step(slice);
        }
    }

    fn step(&mut self, dt: f64) {
        match self.state {
            RunnerState::Ready | RunnerState::Finished => {}
            RunnerState::Playing => {
                self.debounce_left = (self.debounce_left - dt).max(0.0);
                self.question_elapsed += dt;
                self.time_left -= dt;
                if self.time_left <= 0.0 {
                    self.time_left = 0.0;
                    let forced = self.pad.as_mut().and_then(|pad| pad.force_submit());
                    debug!(target: "session", stage_id = %self.stage_id, index = self.index, "Question timed out.");
                    self.record(forced.unwrap_or(Submission { answer: String::new(), correct: false }));
                }
            }
            RunnerState::Feedback { correct } => {
                self.hold_left -= dt;
                if self.hold_left <= 0.0 {
                    self.advance(correct);
                }
            }
            RunnerState::Transition => {
                self.hold_left -= dt;
                if self.hold_left <= 0.0 {
                    self.phase = ListPhase::New;
                    self.index = 0;
                    self.list_mistakes = 0;
                    self.begin_question();
                }
            }
        }
    }

    fn record(&mut self, submission: Submission) {
        let Some(question) = self.list().get(self.index).cloned() else { return };
        let correct = submission.correct;
        self.results.push(QuestionResult {
            question,
            user_answer: submission.answer,
            is_correct: correct,
            time_taken: self.question_elapsed,
        });
        if !correct {
            self.list_mistakes += 1;
        }
        self.hold_left = FEEDBACK_HOLD_SEC;
        self.state = RunnerState::Feedback { correct };
    }

    fn advance(&mut self, last_correct: bool) {
        if !last_correct && self.list_mistakes >= MISTAKE_LIMIT {
            info!(target: "session", stage_id = %self.stage_id, attempted = self.results.len(), "Mistake limit reached; round ends early.");
            self.finish();
            return;
        }
        if self.index + 1 < self.list().len() {
            self.index += 1;
            self.begin_question();
        } else if self.phase == ListPhase::Review && !self.fresh.is_empty() {
            self.pad = None;
            self.hold_left = PHASE_TRANSITION_SEC;
            self.state = RunnerState::Transition;
            debug!(target: "session", stage_id = %self.stage_id, "Review list done; switching to new questions.");
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.pad = None;
        self.state = RunnerState::Finished;
        let outcome = RoundOutcome::from_results(&self.results, self.pass_accuracy);
        info!(
            target: "session",
            stage_id = %self.stage_id,
            correct = outcome.correct,
            attempted = outcome.attempted,
            accuracy = outcome.accuracy,
            passed = outcome.passed,
            "Round finished."
        );
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drill_engine::helpers::question;
    use crate::drill_engine::models::{PoolSpec, QuestionKind, RoundConfig, StageMode};

    fn stage(questions: usize) -> Stage {
        Stage {
            id: "S".into(),
            title: "t".into(),
            skill_id: String::new(),
            mode: StageMode::Rnd,
            pool_spec: PoolSpec::Unsupported,
            round: RoundConfig { questions, sec_per_question: 5.0, pass_override: None },
            next_stage_id: None,
            on_complete: None,
        }
    }

    fn qs(prefix: &str, n: usize) -> Vec<Question> {
        (0..n).map(|i| question(format!("{prefix}{i}"), "1 + 1", 2, QuestionKind::Input)).collect()
    }

    fn runner(review: usize, fresh: usize) -> StageRunner {
        let generated = GeneratedQuestions { review_questions: qs("r", review), new_questions: qs("n", fresh) };
        let mut r = StageRunner::new(&stage(fresh), &GlobalRules::default(), generated);
        r.start();
        r.tick(INPUT_DEBOUNCE_SEC);
        r
    }

    fn answer(r: &mut StageRunner, digit: u8) {
        r.input(InputToken::Digit(digit));
        r.input(InputToken::Enter);
        r.tick(FEEDBACK_HOLD_SEC);
    }

    #[test]
    fn input_is_debounced_after_start() {
        let generated = GeneratedQuestions { review_questions: Vec::new(), new_questions: qs("n", 1) };
        let mut r = StageRunner::new(&stage(1), &GlobalRules::default(), generated);
        assert_eq!(r.input(InputToken::Digit(2)), PadEvent::Ignored, "not started");
        r.start();
        assert_eq!(r.input(InputToken::Digit(2)), PadEvent::Ignored, "debounce");
        r.tick(INPUT_DEBOUNCE_SEC);
        assert_eq!(r.input(InputToken::Digit(2)), PadEvent::Pending);
    }

    #[test]
    fn timeout_force_submits() {
        let mut r = runner(0, 2);
        r.input(InputToken::Digit(2));
        r.tick(5.0);
        assert_eq!(r.state(), RunnerState::Feedback { correct: true });
        assert_eq!(r.results()[0].user_answer, "2");
    }

    #[test]
    fn manual_submit_cancels_timeout() {
        let mut r = runner(0, 2);
        r.tick(4.4);
        answer(&mut r, 2);
        assert_eq!(r.state(), RunnerState::Playing);
        assert_eq!(r.results().len(), 1);
        assert!(r.results()[0].is_correct);
        assert!((r.time_left() - 5.0).abs() < 1e-9, "fresh countdown for the next question");
    }

    #[test]
    fn two_mistakes_end_the_round_early() {
        let mut r = runner(0, 10);
        answer(&mut r, 3);
        answer(&mut r, 2);
        answer(&mut r, 3);
        assert_eq!(r.state(), RunnerState::Finished);
        let out = r.outcome().unwrap();
        assert_eq!(out.attempted, 3);
        assert_eq!(out.correct, 1);
        assert_eq!(out.accuracy, 33);
        assert!(!out.passed);
        assert_eq!(out.mistakes.len(), 2);
    }

    #[test]
    fn review_then_new_with_transition() {
        let mut r = runner(1, 2);
        assert_eq!(r.phase(), ListPhase::Review);
        answer(&mut r, 2);
        assert_eq!(r.state(), RunnerState::Transition);
        assert!(r.current_question().is_none());
        r.tick(PHASE_TRANSITION_SEC);
        assert_eq!(r.phase(), ListPhase::New);
        assert_eq!(r.current_question().unwrap().id, "n0");
        answer(&mut r, 2);
        answer(&mut r, 2);
        let out = r.outcome().unwrap();
        assert_eq!((out.correct, out.attempted, out.accuracy), (3, 3, 100));
        assert!(out.passed);
    }

    #[test]
    fn mistake_count_restarts_with_the_new_list() {
        let mut r = runner(2, 3);
        answer(&mut r, 3);
        answer(&mut r, 2);
        assert_eq!(r.state(), RunnerState::Transition);
        r.tick(PHASE_TRANSITION_SEC);

        answer(&mut r, 3);
        assert_eq!(r.state(), RunnerState::Playing, "one miss per list is allowed");
        answer(&mut r, 3);
        assert_eq!(r.state(), RunnerState::Finished);
        let out = r.outcome().unwrap();
        assert_eq!((out.correct, out.attempted), (1, 4));
        assert_eq!(out.mistakes.len(), 3);
    }

    #[test]
    fn empty_round_scores_zero() {
        let mut r = runner(0, 0);
        assert_eq!(r.state(), RunnerState::Finished);
        let out = r.outcome().unwrap();
        assert_eq!(out.accuracy, 0);
        assert!(!out.passed);
    }
}
