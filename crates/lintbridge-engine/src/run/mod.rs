//! Supervision of a running engine process.
//!
//! An [`EngineRun`] moves through `NotStarted -> Running` when the launcher
//! spawns the child, and ends in exactly one of `Completed`, `Failed` or
//! `Killed`. The foreground thread only ever blocks on the record channel or
//! the exit poll, each bounded by the poll interval, so cancellation and the
//! deadline are observed promptly while a writer thread feeds the request
//! and two reader threads keep the child's pipes drained.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::consumer::{
    ErrorLineSink, StderrCapture, StdoutSummary, spawn_stderr_reader, spawn_stdin_writer,
    spawn_stdout_reader,
};
use crate::error::EngineError;
use crate::launcher::RunOptions;
use crate::protocol::DiagnosticRecord;

/// Tracing target for run supervision.
const RUN_TARGET: &str = "lintbridge_engine::run";

/// Records buffered between the stdout reader and the consumer of the run.
pub const RECORD_CHANNEL_CAPACITY: usize = 256;

/// How long readers may keep running after the child exited before the
/// remaining process group is killed.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle position of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The child has not been spawned yet.
    NotStarted,
    /// The child is running and its output is being consumed.
    Running,
    /// The child exited with status zero and stdout ended cleanly.
    Completed,
    /// The child exited unsuccessfully or broke the protocol.
    Failed,
    /// The child was killed by timeout or cancellation.
    Killed,
}

/// Why a run was killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    /// The run exceeded its time budget.
    Timeout,
    /// The caller cancelled the run.
    Cancelled,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// The engine exited with a non-zero status, `-1` when killed by a
    /// signal.
    NonZeroExit(i32),
    /// Stdout contained a record that could not be decoded.
    Decode {
        /// 1-based stdout line.
        line: usize,
        /// Decoder message.
        message: String,
    },
    /// Writing the request or waiting for the child failed.
    Supervision(String),
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// See [`RunState::Completed`].
    Completed,
    /// See [`RunState::Failed`].
    Failed(RunFailure),
    /// See [`RunState::Killed`].
    Killed(KillReason),
}

impl RunStatus {
    /// Lifecycle state this status belongs to.
    #[must_use]
    pub const fn state(&self) -> RunState {
        match self {
            Self::Completed => RunState::Completed,
            Self::Failed(_) => RunState::Failed,
            Self::Killed(_) => RunState::Killed,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    record_count: usize,
    warnings: Vec<String>,
    exit_code: i32,
}

impl RunReport {
    /// Creates the report of a run that exited with status zero.
    #[must_use]
    pub const fn new(record_count: usize, warnings: Vec<String>) -> Self {
        Self {
            record_count,
            warnings,
            exit_code: 0,
        }
    }

    /// Number of records the engine produced.
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Stderr lines written by an otherwise successful engine.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

/// Everything known about a run once it has finished.
#[derive(Debug)]
pub struct RunOutcome {
    status: RunStatus,
    exit_code: Option<i32>,
    stderr: Vec<String>,
    omitted_stderr: usize,
    records: Vec<DiagnosticRecord>,
    record_count: usize,
    timeout: Duration,
    readers_joined: bool,
}

impl RunOutcome {
    /// Terminal status.
    #[must_use]
    pub const fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Exit code, when the process exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Retained stderr lines.
    #[must_use]
    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// Stderr lines read but not retained.
    #[must_use]
    pub const fn omitted_stderr(&self) -> usize {
        self.omitted_stderr
    }

    /// Records decoded but not yet handed out by [`EngineRun::next_record`].
    #[must_use]
    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    /// Total records decoded over the whole run.
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Returns `true` when both reader threads ran to completion and were
    /// joined before the run finished.
    #[must_use]
    pub const fn readers_joined(&self) -> bool {
        self.readers_joined
    }

    /// Splits the outcome into the undelivered records and the run result.
    #[must_use]
    pub fn into_parts(self) -> (Vec<DiagnosticRecord>, Result<RunReport, EngineError>) {
        let Self {
            status,
            exit_code,
            stderr,
            records,
            record_count,
            timeout,
            ..
        } = self;
        let result = match status {
            RunStatus::Completed => Ok(RunReport {
                record_count,
                warnings: stderr,
                exit_code: exit_code.unwrap_or_default(),
            }),
            RunStatus::Failed(RunFailure::NonZeroExit(code)) => Err(EngineError::NonZeroExit {
                status: code,
                stderr,
            }),
            RunStatus::Failed(RunFailure::Decode { line, message }) => {
                Err(EngineError::ProtocolDecode {
                    line,
                    message,
                    stderr,
                })
            }
            RunStatus::Failed(RunFailure::Supervision(message)) => {
                Err(EngineError::Supervision { message, stderr })
            }
            RunStatus::Killed(KillReason::Timeout) => Err(EngineError::Timeout { timeout, stderr }),
            RunStatus::Killed(KillReason::Cancelled) => Err(EngineError::Cancelled { stderr }),
        };
        (records, result)
    }

    /// Converts the outcome into the run result, discarding undelivered
    /// records.
    ///
    /// # Errors
    ///
    /// Returns the [`EngineError`] matching a failed or killed run.
    pub fn into_result(self) -> Result<RunReport, EngineError> {
        self.into_parts().1
    }
}

/// A running engine process and the threads draining its output.
///
/// Records are yielded lazily, in the order the engine wrote them, through
/// [`next_record`](Self::next_record) or the [`Iterator`] implementation.
/// Iteration ends when stdout closes or the run is killed; [`finish`]
/// then reports how the run ended. Dropping an unfinished run kills the
/// child and joins both reader threads.
///
/// [`finish`]: Self::finish
#[derive(Debug)]
pub struct EngineRun {
    child: Option<Child>,
    pid: u32,
    records: Option<Receiver<DiagnosticRecord>>,
    stdout_reader: Option<JoinHandle<StdoutSummary>>,
    stderr_reader: Option<JoinHandle<StderrCapture>>,
    stdin_writer: Option<JoinHandle<io::Result<()>>>,
    options: RunOptions,
    started: Instant,
    delivered: usize,
    exit: Option<ExitStatus>,
    kill_reason: Option<KillReason>,
    supervision_failure: Option<String>,
}

impl EngineRun {
    /// Takes ownership of a freshly spawned child, starts both readers and
    /// then the writer feeding `payload` to stdin.
    pub(crate) fn start(
        mut child: Child,
        options: RunOptions,
        error_sink: Option<Arc<dyn ErrorLineSink>>,
        payload: String,
    ) -> Result<Self, EngineError> {
        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let pid = child.id();
        let mut run = Self {
            child: Some(child),
            pid,
            records: None,
            stdout_reader: None,
            stderr_reader: None,
            stdin_writer: None,
            options,
            started: Instant::now(),
            delivered: 0,
            exit: None,
            kill_reason: None,
            supervision_failure: None,
        };
        transition(pid, RunState::NotStarted, RunState::Running);

        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            return Err(EngineError::Supervision {
                message: String::from("engine standard streams were not captured"),
                stderr: Vec::new(),
            });
        };
        run.stderr_reader = Some(spawn_stderr_reader(stderr, error_sink).map_err(worker_error)?);
        let (sender, receiver) = mpsc::sync_channel(RECORD_CHANNEL_CAPACITY);
        run.stdout_reader = Some(spawn_stdout_reader(stdout, sender).map_err(worker_error)?);
        run.records = Some(receiver);
        run.stdin_writer = Some(spawn_stdin_writer(stdin, payload).map_err(worker_error)?);
        Ok(run)
    }

    /// Token that cancels this run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        self.options.cancellation()
    }

    /// Operating system process id of the engine.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Records handed out so far.
    #[must_use]
    pub const fn delivered(&self) -> usize {
        self.delivered
    }

    /// Current lifecycle state; terminal states other than `Killed` are only
    /// known once the run is finished.
    #[must_use]
    pub const fn state(&self) -> RunState {
        if self.kill_reason.is_some() {
            RunState::Killed
        } else if self.supervision_failure.is_some() {
            RunState::Failed
        } else {
            RunState::Running
        }
    }

    /// Waits for the next record.
    ///
    /// Returns `None` once stdout has closed, or after the run was killed
    /// because its deadline passed or it was cancelled.
    pub fn next_record(&mut self) -> Option<DiagnosticRecord> {
        loop {
            if self.check_limits() {
                return None;
            }
            let wait = self.wait_slice();
            let received = self.records.as_ref()?.recv_timeout(wait);
            match received {
                Ok(record) => {
                    self.delivered += 1;
                    return Some(record);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.records = None;
                    return None;
                }
            }
        }
    }

    /// Drives the run to its end and reports how it ended.
    ///
    /// Records not yet taken through [`next_record`](Self::next_record) are
    /// collected into the outcome. Both reader threads are joined before this
    /// returns.
    #[must_use]
    pub fn finish(mut self) -> RunOutcome {
        let mut remaining = Vec::new();
        while let Some(record) = self.next_record() {
            remaining.push(record);
        }
        self.wait_for_exit();
        let (summary, capture) = self.join_workers();
        let readers_joined = summary.is_some() && capture.is_some();

        let status = self.terminal_status(summary.as_ref());
        let exit_code = self.exit.and_then(|exit| exit.code());
        let stderr = capture.unwrap_or_default();
        let record_count = summary.as_ref().map_or(self.delivered, |s| s.records);
        transition(self.pid, RunState::Running, status.state());
        if status == RunStatus::Completed && !stderr.lines.is_empty() {
            info!(
                target: RUN_TARGET,
                pid = self.pid,
                lines = stderr.lines.len(),
                "engine completed with stderr output"
            );
        }
        RunOutcome {
            status,
            exit_code,
            stderr: stderr.lines,
            omitted_stderr: stderr.omitted,
            records: remaining,
            record_count,
            timeout: self.options.timeout(),
            readers_joined,
        }
    }

    /// Kills the run when it was cancelled or ran out of time. Returns `true`
    /// when no further records should be read.
    fn check_limits(&mut self) -> bool {
        if self.kill_reason.is_some() || self.supervision_failure.is_some() {
            return true;
        }
        self.poll_writer();
        if self.supervision_failure.is_some() {
            return true;
        }
        if self.options.cancellation().is_cancelled() {
            self.kill(KillReason::Cancelled);
            return true;
        }
        if self.started.elapsed() >= self.options.timeout() {
            self.kill(KillReason::Timeout);
            return true;
        }
        false
    }

    fn wait_slice(&self) -> Duration {
        self.options
            .timeout()
            .saturating_sub(self.started.elapsed())
            .min(self.options.poll_interval())
    }

    fn wait_for_exit(&mut self) {
        while self.exit.is_none() {
            let Some(child) = self.child.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(target: RUN_TARGET, pid = self.pid, ?status, "engine exited");
                    self.exit = Some(status);
                }
                Ok(None) => {
                    if self.check_limits() {
                        self.reap();
                        return;
                    }
                    thread::sleep(self.wait_slice());
                }
                Err(err) => {
                    self.fail(format!("failed to wait for engine: {err}"));
                    return;
                }
            }
        }
    }

    /// Joins the writer and both readers once the leader has exited or been
    /// killed.
    fn join_workers(&mut self) -> (Option<StdoutSummary>, Option<StderrCapture>) {
        self.records = None;
        let grace_end = Instant::now() + READER_GRACE;
        while !self.workers_finished() && Instant::now() < grace_end {
            thread::sleep(self.options.poll_interval());
        }
        if !self.workers_finished() {
            // A worker still blocked on a pipe means some process holds the
            // other end open. Processes started by the engine inherit its
            // group, so the group outlives the reaped leader and its id
            // cannot have been reused.
            warn!(
                target: RUN_TARGET,
                pid = self.pid,
                "engine pipes still open after exit, killing process group"
            );
            kill_process_group(self.pid);
        }
        if let Some(writer) = self.stdin_writer.take() {
            let written = join_worker(writer);
            self.record_write(written);
        }
        let summary = self.stdout_reader.take().and_then(join_worker);
        let capture = self.stderr_reader.take().and_then(join_worker);
        (summary, capture)
    }

    fn workers_finished(&self) -> bool {
        [
            self.stdout_reader.as_ref().is_none_or(JoinHandle::is_finished),
            self.stderr_reader.as_ref().is_none_or(JoinHandle::is_finished),
            self.stdin_writer.as_ref().is_none_or(JoinHandle::is_finished),
        ]
        .into_iter()
        .all(|finished| finished)
    }

    /// Collects the writer's result once it has finished on its own.
    fn poll_writer(&mut self) {
        if !self.stdin_writer.as_ref().is_some_and(JoinHandle::is_finished) {
            return;
        }
        if let Some(writer) = self.stdin_writer.take() {
            let written = join_worker(writer);
            self.record_write(written);
        }
    }

    /// A broken pipe means the engine stopped reading; its exit status tells
    /// the rest. Any other write error fails a run that is still live.
    fn record_write(&mut self, written: Option<io::Result<()>>) {
        match written {
            Some(Ok(())) => {}
            Some(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => debug!(
                target: RUN_TARGET,
                pid = self.pid,
                "engine closed stdin before reading the whole request"
            ),
            Some(Err(err)) => {
                if self.kill_reason.is_none() && self.supervision_failure.is_none() {
                    self.fail(format!("failed to write request to engine stdin: {err}"));
                }
            }
            None => {
                if self.kill_reason.is_none() && self.supervision_failure.is_none() {
                    self.fail(String::from("engine request writer panicked"));
                }
            }
        }
    }

    fn terminal_status(&self, summary: Option<&StdoutSummary>) -> RunStatus {
        if let Some(reason) = self.kill_reason {
            return RunStatus::Killed(reason);
        }
        if let Some(message) = &self.supervision_failure {
            return RunStatus::Failed(RunFailure::Supervision(message.clone()));
        }
        if let Some(failure) = summary.and_then(|s| s.failure.as_ref()) {
            return RunStatus::Failed(RunFailure::Decode {
                line: failure.line(),
                message: failure.to_string(),
            });
        }
        match self.exit {
            Some(status) if status.success() => RunStatus::Completed,
            Some(status) => RunStatus::Failed(RunFailure::NonZeroExit(status.code().unwrap_or(-1))),
            None => RunStatus::Failed(RunFailure::Supervision(String::from(
                "engine exit status unknown",
            ))),
        }
    }

    fn kill(&mut self, reason: KillReason) {
        if self.kill_reason.is_none() {
            warn!(
                target: RUN_TARGET,
                pid = self.pid,
                ?reason,
                timeout_ms = u64::try_from(self.options.timeout().as_millis()).unwrap_or(u64::MAX),
                "killing engine"
            );
            self.kill_reason = Some(reason);
        }
        self.terminate();
    }

    fn fail(&mut self, message: String) {
        warn!(
            target: RUN_TARGET,
            pid = self.pid,
            error = %message,
            "engine supervision failed, killing engine"
        );
        self.supervision_failure = Some(message);
        self.terminate();
    }

    /// Kills the child and its process group and stops listening for records.
    fn terminate(&mut self) {
        self.records = None;
        if self.exit.is_some() {
            return;
        }
        kill_process_group(self.pid);
        if let Some(child) = self.child.as_mut() {
            drop(child.kill());
        }
    }

    fn reap(&mut self) {
        if self.exit.is_some() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            self.exit = child.wait().ok();
        }
    }
}

impl Iterator for EngineRun {
    type Item = DiagnosticRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

impl Drop for EngineRun {
    fn drop(&mut self) {
        if self.stdout_reader.is_none()
            && self.stderr_reader.is_none()
            && self.stdin_writer.is_none()
            && self.exit.is_some()
        {
            return;
        }
        if self.exit.is_none() {
            debug!(target: RUN_TARGET, pid = self.pid, "dropping unfinished engine run");
            self.terminate();
            self.reap();
        }
        drop(self.join_workers());
    }
}

fn join_worker<T>(handle: JoinHandle<T>) -> Option<T> {
    let name = handle.thread().name().map(str::to_owned);
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(target: RUN_TARGET, thread = ?name, "engine pipe thread panicked");
            None
        }
    }
}

fn worker_error(err: io::Error) -> EngineError {
    EngineError::Supervision {
        message: format!("failed to start engine pipe thread: {err}"),
        stderr: Vec::new(),
    }
}

fn transition(pid: u32, from: RunState, to: RunState) {
    debug!(target: RUN_TARGET, pid, ?from, ?to, "engine run state changed");
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(target: RUN_TARGET, pid, error = %err, "process group already gone");
    }
}

#[cfg(not(unix))]
const fn kill_process_group(_pid: u32) {}
