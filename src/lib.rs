//! # arith_drill_gen
//!
//! An offline, deterministic drill engine for elementary arithmetic: making
//! ten, carrying and borrowing, times tables and column addition.
//!
//! Curricula are JSON stage graphs. Each stage names a pool recipe; the engine
//! turns the recipe into a batch of questions, runs them as a timed round,
//! scores the round and moves the learner through the graph once a stage is
//! passed often enough in a row.
//!
//! ## How it works
//!
//! 1. [`DrillApp::bootstrap`] loads the configured tracks (four ship built
//!    in), restores saved progress and opens each track's start stage.
//! 2. [`DrillApp::prepare_round`] generates the stage's questions, with missed
//!    questions from earlier rounds mixed in front when weak injection is on.
//! 3. The host drives the returned [`StageRunner`] with keypad tokens and
//!    elapsed time. The runner owns the countdown, feedback pauses and early
//!    termination.
//! 4. [`DrillApp::record_stage_result`] updates pass streaks, unlocks the next
//!    stage and saves.
//!
//! ## Key features
//!
//! - **Deterministic**: every generator takes an explicit RNG; seed a
//!   `StdRng` to reproduce a round exactly.
//! - **Pure progress transitions**: the `ledger` functions take the old
//!   progress and return the new one, so they are trivially testable.
//! - **No clock inside**: the runner is ticked by the host, which makes timed
//!   behaviour testable without sleeping.
//!
//! ## Quick start
//!
//! ```rust
//! use arith_drill_gen::{DrillApp, DrillConfig, InputToken, MemoryStore, RunnerState};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut app = DrillApp::bootstrap(DrillConfig::default(), MemoryStore::new()).unwrap();
//! let stage_id = app.next_up().unwrap().id.clone();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut runner = app.prepare_round(&stage_id, &mut rng).unwrap();
//! runner.start();
//! runner.tick(0.6);
//!
//! while runner.state() != RunnerState::Finished {
//!     if let Some(q) = runner.current_question().cloned() {
//!         if runner.state() == RunnerState::Playing {
//!             for d in q.answer.bytes() {
//!                 runner.input(InputToken::Digit(d - b'0'));
//!             }
//!             runner.input(InputToken::Enter);
//!         }
//!     }
//!     runner.tick(0.1);
//! }
//!
//! let outcome = runner.outcome().unwrap().clone();
//! assert!(outcome.passed);
//! app.record_stage_result(&stage_id, &outcome, 0).unwrap();
//! ```

pub mod config;
pub mod drill_engine;
pub mod telemetry;

// Convenience re-exports so callers can use `arith_drill_gen::DrillApp`
// directly without reaching into `drill_engine::`.
pub use config::{load_config, load_config_from_env, DrillConfig};
pub use drill_engine::{
    generate_pool, generate_questions_for_stage, generate_round, load_curriculum, load_tracks,
    pad_for, AnswerPad, Curriculum, DrillApp, DrillError, FileStore, GeneratedQuestions,
    GlobalRules, InputToken, ListPhase, MemoryStore, MergedCurriculum, PadEvent, PoolSpec,
    ProgressStore, Question, QuestionKind, RoundOutcome, RunnerState, Stage, StageMode,
    StageProgress, StageRunner, Submission, UserProgress, BUILTIN_TRACKS,
};
