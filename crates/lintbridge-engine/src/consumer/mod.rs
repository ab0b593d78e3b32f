//! Concurrent feeding and draining of the engine's pipes.
//!
//! Each run owns two reader threads, started before the request is written
//! or the child's exit is awaited, and one writer thread feeding the request
//! to stdin. Pipes have bounded kernel buffers:
//! a child that fills stdout or stderr while the parent is blocked elsewhere
//! stalls forever, so both pipes are always read independently of each other
//! and of the exit wait.
//!
//! The stdout reader decodes [`DiagnosticRecord`]s and forwards them, in
//! order, through a bounded channel. When decoding fails, or when the run
//! stops listening, it keeps reading and discarding bytes until end of stream
//! so the child never blocks on a full pipe. The stderr reader forwards every
//! line to an optional [`ErrorLineSink`] and retains the lines for the run's
//! outcome. The writer keeps a large request, or an engine that never reads
//! its input, from blocking the thread that supervises the run.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::protocol::{DecodeError, DiagnosticRecord, RecordDecoder};

/// Tracing target for stream consumption.
const CONSUMER_TARGET: &str = "lintbridge_engine::consumer";

/// Tracing target [`ErrorLog`] logs engine stderr lines under, so a
/// subscriber can filter them apart from the bridge's own diagnostics.
pub const ENGINE_STDERR_TARGET: &str = "lintbridge_engine::stderr";

/// Maximum number of stderr lines retained per run; later lines are still
/// forwarded to the sink and counted.
pub const MAX_RETAINED_STDERR_LINES: usize = 10_000;

/// Receives engine stderr lines as they are read.
///
/// Implementations must be cheap and non-blocking: they run on the stderr
/// reader thread.
pub trait ErrorLineSink: Send + Sync {
    /// Accepts one stderr line, without its trailing newline.
    fn accept(&self, line: &str);
}

/// What the stdout reader observed by the time the stream closed.
#[derive(Debug, Default)]
pub(crate) struct StdoutSummary {
    /// Records successfully decoded.
    pub(crate) records: usize,
    /// First decode failure, after which decoding stopped.
    pub(crate) failure: Option<DecodeError>,
    /// Bytes read and discarded after decoding stopped.
    pub(crate) discarded_bytes: u64,
}

/// Lines captured from stderr.
#[derive(Debug, Default)]
pub(crate) struct StderrCapture {
    /// Retained lines, in order.
    pub(crate) lines: Vec<String>,
    /// Lines read beyond [`MAX_RETAINED_STDERR_LINES`].
    pub(crate) omitted: usize,
}

/// Starts the thread decoding stdout into `records`.
pub(crate) fn spawn_stdout_reader<R>(
    stdout: R,
    records: SyncSender<DiagnosticRecord>,
) -> io::Result<JoinHandle<StdoutSummary>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(String::from("lintbridge-stdout"))
        .spawn(move || read_stdout(stdout, &records))
}

/// Starts the thread forwarding stderr lines to `sink`.
pub(crate) fn spawn_stderr_reader<R>(
    stderr: R,
    sink: Option<Arc<dyn ErrorLineSink>>,
) -> io::Result<JoinHandle<StderrCapture>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(String::from("lintbridge-stderr"))
        .spawn(move || read_stderr(stderr, sink.as_deref()))
}

/// Starts the thread writing `payload` to stdin and closing it.
///
/// The thread finishes once the whole payload is written or the pipe breaks;
/// killing the engine closes the read end and unblocks a pending write.
pub(crate) fn spawn_stdin_writer<W>(
    stdin: W,
    payload: String,
) -> io::Result<JoinHandle<io::Result<()>>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name(String::from("lintbridge-stdin"))
        .spawn(move || write_request(stdin, &payload))
}

fn write_request<W: Write>(mut stdin: W, payload: &str) -> io::Result<()> {
    stdin.write_all(payload.as_bytes())?;
    stdin.flush()?;
    debug!(
        target: CONSUMER_TARGET,
        request_bytes = payload.len(),
        "wrote request to engine stdin"
    );
    Ok(())
}

fn read_stdout<R: Read>(stdout: R, records: &SyncSender<DiagnosticRecord>) -> StdoutSummary {
    let mut decoder = RecordDecoder::new(BufReader::new(stdout));
    let mut summary = StdoutSummary::default();
    loop {
        match decoder.next_record() {
            Ok(Some(record)) => {
                if records.send(record).is_err() {
                    debug!(
                        target: CONSUMER_TARGET,
                        "record receiver dropped, discarding remaining stdout"
                    );
                    break;
                }
                summary.records += 1;
            }
            Ok(None) => {
                debug!(
                    target: CONSUMER_TARGET,
                    records = summary.records,
                    "stdout reached end of stream"
                );
                return summary;
            }
            Err(error) => {
                warn!(
                    target: CONSUMER_TARGET,
                    line = error.line(),
                    error = %error,
                    "failed to decode engine output"
                );
                summary.failure = Some(error);
                break;
            }
        }
    }
    summary.discarded_bytes = discard(decoder.into_inner());
    summary
}

fn discard<R: Read>(mut reader: R) -> u64 {
    match io::copy(&mut reader, &mut io::sink()) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!(
                target: CONSUMER_TARGET,
                error = %error,
                "stopped discarding stdout"
            );
            0
        }
    }
}

fn read_stderr<R: Read>(stderr: R, sink: Option<&dyn ErrorLineSink>) -> StderrCapture {
    let mut reader = BufReader::new(stderr);
    let mut capture = StderrCapture::default();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(
                    target: CONSUMER_TARGET,
                    error = %error,
                    "stderr read failed"
                );
                break;
            }
        }
        let text = String::from_utf8_lossy(&buffer);
        let line = text.trim_end_matches(['\n', '\r']);
        if let Some(forward) = sink {
            forward.accept(line);
        }
        if capture.lines.len() < MAX_RETAINED_STDERR_LINES {
            capture.lines.push(line.to_owned());
        } else {
            capture.omitted += 1;
        }
    }
    debug!(
        target: CONSUMER_TARGET,
        lines = capture.lines.len(),
        omitted = capture.omitted,
        "stderr reached end of stream"
    );
    capture
}

/// Long-lived consumer that logs engine stderr lines from many runs.
///
/// The log owns one background thread fed through a channel. A harness
/// constructs it once, hands it to every run as their [`ErrorLineSink`], and
/// calls [`shutdown`](Self::shutdown) after the last run. Lines accepted after
/// shutdown are dropped.
///
/// # Example
///
/// ```
/// use lintbridge_engine::consumer::{ErrorLineSink, ErrorLog};
///
/// let log = ErrorLog::start().unwrap();
/// log.accept("warning: tsconfig.json not found");
/// assert_eq!(log.shutdown(), 1);
/// ```
#[derive(Debug)]
pub struct ErrorLog {
    sender: Mutex<Option<Sender<String>>>,
    worker: Mutex<Option<JoinHandle<usize>>>,
}

impl ErrorLog {
    /// Starts the background consumer thread.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when the thread cannot be spawned.
    pub fn start() -> io::Result<Arc<Self>> {
        let (sender, receiver) = mpsc::channel::<String>();
        let worker = thread::Builder::new()
            .name(String::from("lintbridge-error-log"))
            .spawn(move || {
                let mut logged = 0_usize;
                for line in receiver {
                    warn!(target: ENGINE_STDERR_TARGET, line = %line, "engine stderr");
                    logged += 1;
                }
                logged
            })?;
        Ok(Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Stops accepting lines, waits for queued lines to be logged, and
    /// returns how many lines were logged in total. Later calls return `0`.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match worker.map(JoinHandle::join) {
            Some(Ok(logged)) => logged,
            Some(Err(_)) => {
                warn!(target: CONSUMER_TARGET, "error log worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl ErrorLineSink for ErrorLog {
    fn accept(&self, line: &str) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            drop(sender.send(line.to_owned()));
        }
    }
}

impl Drop for ErrorLog {
    fn drop(&mut self) {
        let _logged = self.shutdown();
    }
}
