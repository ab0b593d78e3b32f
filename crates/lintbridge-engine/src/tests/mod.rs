//! Crate-level process and BDD tests.
//!
//! Fake engines are shell scripts run through `/bin/sh`, so nothing needs to
//! be marked executable.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::bundle::BundleRoot;
use crate::cancel::CancellationToken;
use crate::consumer::ErrorLog;
use crate::launcher::{EngineCommand, EngineLauncher, RunOptions};
use crate::request::{AnalysisRequest, RuleConfig};
use crate::run::{KillReason, RunState, RunStatus};

mod behaviour;

/// Bundle holding a fake engine script at `bin/engine`.
pub(crate) struct FakeEngine {
    dir: TempDir,
}

impl FakeEngine {
    pub(crate) fn new(script: &str) -> Self {
        let dir = TempDir::new().expect("create bundle dir");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).expect("create bin dir");
        fs::write(bin.join("engine"), script).expect("write engine script");
        Self { dir }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn bundle(&self) -> BundleRoot {
        BundleRoot::new(self.dir.path())
    }

    pub(crate) fn launcher() -> EngineLauncher {
        EngineLauncher::new(EngineCommand::new("bin/engine").with_runtime("/bin/sh"))
    }

    pub(crate) fn request(&self) -> AnalysisRequest {
        AnalysisRequest::new(self.dir.path())
            .with_file("src/a.ts")
            .with_rule(RuleConfig::new("S4275"))
    }
}

/// Shell snippet printing `count` records whose start line is their index.
pub(crate) fn emit_records(count: usize) -> String {
    format!(
        concat!(
            "i=0\n",
            "while [ $i -lt {count} ]; do\n",
            "  printf '{{\"ruleKey\":\"S4275\",\"filePath\":\"src/a.ts\",\"line\":%d,",
            "\"column\":0,\"endLine\":%d,\"endColumn\":1,\"message\":\"m\"}}\\n' $i $i\n",
            "  i=$((i+1))\n",
            "done\n",
        ),
        count = count
    )
}

#[test]
fn request_is_written_to_stdin_as_one_line() {
    let engine = FakeEngine::new("cat > \"$LINTBRIDGE_BUNDLE_ROOT/request.json\"\n");
    let request = engine.request();
    let (records, result) =
        FakeEngine::launcher().run(&engine.bundle(), &request, Duration::from_secs(10));
    result.expect("engine succeeds");
    assert!(records.is_empty());

    let written = fs::read_to_string(engine.path().join("request.json")).expect("read request");
    let expected = request.to_json_line().expect("serialise request");
    assert_eq!(written, expected);
    assert_eq!(written.matches('\n').count(), 1);
}

#[test]
fn engine_runs_in_request_working_directory() {
    let engine = FakeEngine::new("pwd > \"$LINTBRIDGE_BUNDLE_ROOT/cwd.txt\"\n");
    let workspace = TempDir::new().expect("create workspace");
    let request = AnalysisRequest::new(workspace.path());
    let (_, result) =
        FakeEngine::launcher().run(&engine.bundle(), &request, Duration::from_secs(10));
    result.expect("engine succeeds");

    let cwd = fs::read_to_string(engine.path().join("cwd.txt")).expect("read cwd");
    let expected = workspace.path().canonicalize().expect("canonical workspace");
    let actual = Path::new(cwd.trim_end()).canonicalize().expect("canonical cwd");
    assert_eq!(actual, expected);
}

#[test]
fn records_beyond_channel_capacity_are_collected_by_finish() {
    let engine = FakeEngine::new(&emit_records(1000));
    let run = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &engine.request(),
            RunOptions::new(Duration::from_secs(30)),
        )
        .expect("launch");
    let outcome = run.finish();
    assert_eq!(outcome.status(), &RunStatus::Completed);
    assert_eq!(outcome.records().len(), 1000);
    assert_eq!(outcome.record_count(), 1000);
    let lines: Vec<u32> = outcome.records().iter().map(|r| r.span().line()).collect();
    assert!(lines.windows(2).all(|pair| pair.first() < pair.get(1)));
}

#[test]
fn timeout_kills_a_silent_engine() {
    let engine = FakeEngine::new("exec sleep 30\n");
    let started = Instant::now();
    let run = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &engine.request(),
            RunOptions::new(Duration::from_millis(300)),
        )
        .expect("launch");
    let outcome = run.finish();
    assert_eq!(outcome.status(), &RunStatus::Killed(KillReason::Timeout));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn timeout_covers_a_request_the_engine_never_reads() {
    let engine = FakeEngine::new("exec sleep 30\n");
    let request = engine.request().with_files(
        (0..5000).map(|index| format!("src/components/module_{index:05}/index.component.ts")),
    );
    let payload = request.to_json_line().expect("serialise request");
    assert!(payload.len() > 200 * 1024, "request must exceed the pipe buffer");

    let started = Instant::now();
    let run = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &request,
            RunOptions::new(Duration::from_millis(500)),
        )
        .expect("launch");
    let launched = started.elapsed();
    let outcome = run.finish();

    assert!(launched < Duration::from_millis(500), "launch blocked for {launched:?}");
    assert_eq!(outcome.status(), &RunStatus::Killed(KillReason::Timeout));
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "run took {:?}",
        started.elapsed()
    );
    assert!(outcome.readers_joined());
}

#[test]
fn cancellation_from_another_thread_kills_the_run() {
    let engine = FakeEngine::new("exec sleep 30\n");
    let token = CancellationToken::new();
    let mut run = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &engine.request(),
            RunOptions::new(Duration::from_secs(10)).with_cancellation(token.clone()),
        )
        .expect("launch");
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        token.cancel();
        Instant::now()
    });
    assert!(run.next_record().is_none());
    assert_eq!(run.state(), RunState::Killed);
    let outcome = run.finish();
    let finished = Instant::now();
    let cancelled = canceller.join().expect("join canceller");

    assert_eq!(outcome.status(), &RunStatus::Killed(KillReason::Cancelled));
    let grace = finished.saturating_duration_since(cancelled);
    assert!(grace < Duration::from_secs(1), "finish took {grace:?} after cancel");
    assert!(outcome.readers_joined());
}

#[test]
fn background_process_holding_the_pipes_is_killed_after_exit() {
    let engine = FakeEngine::new("sleep 30 &\necho 'spawned watcher' >&2\n");
    let started = Instant::now();
    let outcome = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &engine.request(),
            RunOptions::new(Duration::from_secs(30)),
        )
        .expect("launch")
        .finish();

    assert_eq!(outcome.status(), &RunStatus::Completed);
    assert_eq!(outcome.stderr(), ["spawned watcher"]);
    assert!(outcome.readers_joined());
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "run took {:?}",
        started.elapsed()
    );
}

#[test]
fn one_error_log_serves_many_runs() {
    let errors = ErrorLog::start().expect("start error log");
    let launcher = FakeEngine::launcher().with_error_sink(errors.clone());
    for run in 0..3 {
        let engine = FakeEngine::new(&format!(
            "echo 'run {run}: tsconfig.json not found' >&2\necho 'run {run}: falling back to defaults' >&2\n"
        ));
        let (_, result) = launcher.run(&engine.bundle(), &engine.request(), Duration::from_secs(10));
        let report = result.expect("engine succeeds");
        assert_eq!(report.warnings().len(), 2);
    }

    assert_eq!(errors.shutdown(), 6);

    let late = FakeEngine::new("echo 'after shutdown' >&2\n");
    let (_, result) = launcher.run(&late.bundle(), &late.request(), Duration::from_secs(10));
    assert!(result.is_ok());
    assert_eq!(errors.shutdown(), 0);
}

#[test]
fn dropping_an_unfinished_run_kills_the_engine() {
    let engine = FakeEngine::new("exec sleep 30\n");
    let run = FakeEngine::launcher()
        .launch(
            &engine.bundle(),
            &engine.request(),
            RunOptions::new(Duration::from_secs(30)),
        )
        .expect("launch");
    let pid = run.pid();
    let started = Instant::now();
    drop(run);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!Path::new("/proc").join(pid.to_string()).exists());
}
