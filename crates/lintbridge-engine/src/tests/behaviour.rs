//! Behaviour-driven tests for engine run supervision.

use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::launcher::RunOptions;
use crate::protocol::DiagnosticRecord;
use crate::run::{RunState, RunStatus};

use super::{FakeEngine, emit_records};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

struct RunWorld {
    engine: Option<FakeEngine>,
    timeout: Duration,
    records: Vec<DiagnosticRecord>,
    status: Option<RunStatus>,
    stderr_lines: usize,
    error: Option<EngineError>,
    finished_after_cancel: Option<Duration>,
    readers_joined: bool,
}

impl Default for RunWorld {
    fn default() -> Self {
        Self {
            engine: None,
            timeout: Duration::from_secs(30),
            records: Vec::new(),
            status: None,
            stderr_lines: 0,
            error: None,
            finished_after_cancel: None,
            readers_joined: false,
        }
    }
}

#[fixture]
fn world() -> RunWorld {
    RunWorld::default()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run_engine(world: &mut RunWorld, cancel_after: Option<Duration>) {
    let engine = world.engine.as_ref().expect("engine configured");
    let token = CancellationToken::new();
    let options = RunOptions::new(world.timeout).with_cancellation(token.clone());
    let mut run = FakeEngine::launcher()
        .launch(&engine.bundle(), &engine.request(), options)
        .expect("launch engine");

    let canceller = cancel_after.map(|delay| {
        thread::spawn(move || {
            thread::sleep(delay);
            token.cancel();
            Instant::now()
        })
    });
    world.records.extend(run.by_ref());
    let outcome = run.finish();
    let finished = Instant::now();
    if let Some(handle) = canceller {
        let cancelled = handle.join().expect("join canceller");
        world.finished_after_cancel = Some(finished.saturating_duration_since(cancelled));
    }
    world.readers_joined = outcome.readers_joined();

    world.status = Some(outcome.status().clone());
    world.stderr_lines = outcome.stderr().len();
    let (remaining, result) = outcome.into_parts();
    world.records.extend(remaining);
    world.error = result.err();
}

fn assert_state(world: &RunWorld, expected: RunState) {
    let status = world.status.as_ref().expect("run finished");
    assert_eq!(status.state(), expected, "status was {status:?}");
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("an engine that writes {count} records")]
fn given_records(world: &mut RunWorld, count: usize) {
    world.engine = Some(FakeEngine::new(&emit_records(count)));
}

#[given("an engine that floods stderr with {lines} lines before writing {count} records")]
fn given_stderr_flood(world: &mut RunWorld, lines: usize, count: usize) {
    let script = format!(
        "yes 'warning: deprecated option in tsconfig.json' | head -n {lines} >&2\n{}",
        emit_records(count)
    );
    world.engine = Some(FakeEngine::new(&script));
}

#[given("an engine that writes {message} to stderr and exits with status {status}")]
fn given_failing_engine(world: &mut RunWorld, message: String, status: i32) {
    let text = message.trim_matches('"');
    let script = format!("echo '{text}' >&2\nexit {status}\n");
    world.engine = Some(FakeEngine::new(&script));
}

#[given("an engine that writes {count} records followed by malformed output")]
fn given_malformed_output(world: &mut RunWorld, count: usize) {
    let script = format!("{}echo 'not a record'\necho 'more noise'\n", emit_records(count));
    world.engine = Some(FakeEngine::new(&script));
}

#[given("an engine that never exits")]
fn given_never_ending_engine(world: &mut RunWorld) {
    world.engine = Some(FakeEngine::new("exec sleep 60\n"));
}

#[given("a run timeout of {seconds} seconds")]
fn given_timeout(world: &mut RunWorld, seconds: u64) {
    world.timeout = Duration::from_secs(seconds);
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the engine runs to completion")]
fn when_run(world: &mut RunWorld) {
    run_engine(world, None);
}

#[when("the run is cancelled after {millis} milliseconds")]
fn when_cancelled(world: &mut RunWorld, millis: u64) {
    run_engine(world, Some(Duration::from_millis(millis)));
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the run is completed")]
fn then_completed(world: &mut RunWorld) {
    assert_state(world, RunState::Completed);
    assert!(world.error.is_none(), "unexpected error: {:?}", world.error);
}

#[then("the run is failed")]
fn then_failed(world: &mut RunWorld) {
    assert_state(world, RunState::Failed);
}

#[then("the run is killed")]
fn then_killed(world: &mut RunWorld) {
    assert_state(world, RunState::Killed);
    assert!(matches!(world.error, Some(EngineError::Cancelled { .. })));
}

#[then("{count} records are delivered in order")]
fn then_records_in_order(world: &mut RunWorld, count: usize) {
    let lines: Vec<u32> = world.records.iter().map(|r| r.span().line()).collect();
    let expected: Vec<u32> = (0..).take(count).collect();
    assert_eq!(lines, expected);
}

#[then("{count} stderr lines are retained")]
fn then_stderr_retained(world: &mut RunWorld, count: usize) {
    assert_eq!(world.stderr_lines, count);
}

#[then("the error mentions {text}")]
fn then_error_mentions(world: &mut RunWorld, text: String) {
    let expected = text.trim_matches('"');
    let message = world.error.as_ref().expect("run failed").to_string();
    assert!(message.contains(expected), "'{expected}' not in: {message}");
}

#[then("the run ended within {millis} milliseconds of cancellation")]
fn then_ended_after_cancel(world: &mut RunWorld, millis: u64) {
    let delay = world.finished_after_cancel.expect("run was cancelled");
    assert!(
        delay < Duration::from_millis(millis),
        "finish returned {delay:?} after cancel"
    );
}

#[then("both output readers were joined")]
fn then_readers_joined(world: &mut RunWorld) {
    assert!(world.readers_joined);
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/engine_run.feature")]
fn engine_run_behaviour(world: RunWorld) {
    let _ = world;
}
