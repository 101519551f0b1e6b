//! End-to-end demo: bootstrap the app, play two rounds, print the stage map.
//!
//! Run with: `cargo run --example demo`
//!
//! `LOG_LEVEL=info,session=debug` shows the runner's state changes;
//! `DRILL_CONFIG_PATH` points at an optional TOML config. Set `rng_seed` there
//! to make the rounds reproducible.
//!
//! ## Key concepts demonstrated
//!
//! - `DrillApp::from_config`, which keeps progress in the file named by
//!   `storage_path`, so a second run picks up where the first stopped.
//! - The host owns the clock: it forwards keypad tokens and calls `tick`.
//! - The first round misses one question on purpose and still passes at 90%.
//! - `record_stage_result` unlocks the next stage after a pass.

use arith_drill_gen::{
    drill_engine::generator::rng_from_seed, load_config_from_env, telemetry::init_tracing, DrillApp,
    InputToken, PadEvent, RunnerState, StageRunner,
};

/// Play one round, answering everything right except the question at `miss`.
fn play(runner: &mut StageRunner, miss: Option<usize>) {
    runner.start();
    runner.tick(0.6);

    let mut asked = 0;
    while runner.state() != RunnerState::Finished {
        if runner.state() != RunnerState::Playing {
            runner.tick(0.1);
            continue;
        }
        let Some(q) = runner.current_question().cloned() else { break };
        let typed = if miss == Some(asked) { format!("{}0", q.answer) } else { q.answer.clone() };

        let mut last = PadEvent::Ignored;
        for d in typed.bytes().filter(u8::is_ascii_digit) {
            last = runner.input(InputToken::Digit(d - b'0'));
        }
        if !matches!(last, PadEvent::Submitted(_)) {
            last = runner.input(InputToken::Enter);
        }
        let mark = match last {
            PadEvent::Submitted(s) if s.correct => "✓",
            PadEvent::Submitted(_) => "✗",
            _ => "?",
        };
        println!("  [{mark}] {:<14} you: {:<4} answer: {}", q.text, typed, q.answer);
        asked += 1;
        runner.tick(0.1);
    }
}

fn main() {
    init_tracing();
    let config = load_config_from_env();
    let mut rng = rng_from_seed(config.rng_seed);

    let mut app = match DrillApp::from_config(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("bootstrap failed: {e}");
            return;
        }
    };

    for (round, miss) in [Some(3), None].into_iter().enumerate() {
        let Some(stage) = app.next_up().cloned() else { break };
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("  Round {}: {} ({}, {})", round + 1, stage.title, stage.id, stage.mode);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let mut runner = match app.prepare_round(&stage.id, &mut rng) {
            Ok(runner) => runner,
            Err(e) => {
                eprintln!("cannot prepare {}: {e}", stage.id);
                return;
            }
        };
        play(&mut runner, miss);

        let Some(outcome) = runner.outcome().cloned() else { continue };
        println!(
            "  {}/{} correct ({}%) in {:.1}s, {}",
            outcome.correct,
            outcome.attempted,
            outcome.accuracy,
            outcome.total_time_sec,
            if outcome.passed { "passed" } else { "failed" },
        );
        if let Err(e) = app.record_stage_result(&stage.id, &outcome, chrono::Utc::now().timestamp_millis()) {
            eprintln!("cannot record result: {e}");
        }
        println!();
    }

    println!("Stage map:");
    for (stage, progress) in app.stages_with_progress() {
        let state = match (progress.unlocked, progress.cleared) {
            (_, true) => "cleared",
            (true, false) => "open",
            (false, false) => "locked",
        };
        println!("  {:<8} {:<28} passes in a row: {}", state, stage.id, progress.consecutive_passes);
    }
}
