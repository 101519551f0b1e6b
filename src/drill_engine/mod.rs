//! Core drill engine: curricula, question generation, answer input, timed
//! rounds and progress bookkeeping.
//!
//! ## Module overview
//!
//! | Module        | Purpose |
//! |---------------|---------|
//! | `models`      | Shared types: pool specs, questions, stages, rules, progress records |
//! | `curriculum`  | Built-in tracks, JSON loading, multi-track merge |
//! | `shuffle`     | Fisher-Yates shuffle and sampling without replacement |
//! | `helpers`     | Digit and carry/borrow helpers, question builders, id counter |
//! | `pools`       | One generator per pool type, grouped by operation |
//! | `generator`   | `generate_pool()` dispatch, composite picks, review/new split |
//! | `input`       | Answer pads that turn tokens into exactly one submission |
//! | `session`     | `StageRunner`, the timed round state machine |
//! | `ledger`      | Pure progress transitions: pass counting, unlocks, weak set |
//! | `persistence` | Progress blob stores (file, memory) with safe load/save |
//! | `app`         | `DrillApp`, which ties the above together for a host UI |
//! | `error`       | `DrillError` and the crate `Result` alias |

pub mod app;
pub mod curriculum;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod input;
pub mod ledger;
pub mod models;
pub mod persistence;
pub mod pools;
pub mod session;
pub mod shuffle;

// Re-export the surface a host needs so it can use
// `drill_engine::DrillApp` without reaching into sub-modules.
pub use app::DrillApp;
pub use curriculum::{load_curriculum, load_tracks, merge_curricula, MergedCurriculum, BUILTIN_TRACKS};
pub use error::{DrillError, Result};
pub use generator::{generate_pool, generate_questions_for_stage, generate_round, GeneratedQuestions};
pub use input::{pad_for, AnswerPad, InputToken, PadEvent, Submission};
pub use models::{
    Curriculum, GlobalRules, PoolSpec, Question, QuestionKind, QuestionMetadata, QuestionResult,
    Stage, StageMode, StageProgress, UserProgress, WeakQuestion,
};
pub use persistence::{FileStore, MemoryStore, ProgressStore};
pub use session::{ListPhase, RoundOutcome, RunnerState, StageRunner};
