use std::{
    fmt,
    io::{self, Read, Write},
    sync::mpsc,
};

use thiserror::Error;
use threadpool::{Builder, ThreadPool};

use crate::{pump, BoundedPipe, CHUNK_SIZE, PIPE_CAPACITY};

const WORKER_NAME: &str = "tandem-relay";
const WORKER_STACK: usize = 1_048_576;

// One thread per stage; a relay never runs more than its two stages.
const STAGES: usize = 2;

fn make_worker_pool() -> ThreadPool {
    Builder::new()
        .num_threads(STAGES)
        .thread_name(WORKER_NAME.into())
        .thread_stack_size(WORKER_STACK)
        .build()
}

/// The two halves of a relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Reads the origin and feeds the pipe.
    Source,
    /// Drains the pipe into the destination.
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Sink => f.write_str("sink"),
        }
    }
}

/// Byte counts of a relay run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Bytes read from the origin and handed to the pipe.
    pub read: u64,
    /// Bytes written to the destination.
    pub written: u64,
}

/// The failure of a single relay stage.
#[derive(Debug, Error)]
#[error("{stage} stage failed after {bytes} bytes: {error}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: Stage,
    /// How many bytes the stage moved before failing.
    pub bytes: u64,
    /// The underlying I/O error.
    #[source]
    pub error: io::Error,
}

fn summarize(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregated failure of a relay run.
///
/// Carries every stage failure alongside the partial byte counts, so a
/// truncated copy can never be mistaken for a complete one.
#[derive(Debug, Error)]
#[error("stream relay failed: {}", summarize(.failures))]
pub struct RelayError {
    report: RelayReport,
    failures: Vec<StageFailure>,
}

impl RelayError {
    /// The byte counts reached before the relay gave up.
    #[inline]
    pub fn report(&self) -> RelayReport {
        self.report
    }

    /// The failures of the individual stages, in order of arrival.
    #[inline]
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// Checks whether the given stage is among the failed ones.
    pub fn failed(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }
}

struct Notification {
    stage: Stage,
    result: Result<u64, (io::Error, u64)>,
}

/// Copies streams with reading and writing overlapping in time.
///
/// Each run creates a fresh [`BoundedPipe`] and carries out its two
/// stages on background threads owned by the relay.
#[derive(Debug)]
pub struct Relay {
    pool: ThreadPool,
    capacity: usize,
}

impl Relay {
    /// Creates a relay whose pipes buffer [`PIPE_CAPACITY`] bytes.
    pub fn new() -> Self {
        Self::with_capacity(PIPE_CAPACITY)
    }

    /// Creates a relay whose pipes buffer `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: make_worker_pool(),
            capacity: capacity.max(1),
        }
    }

    fn execute<F>(&self, stage: Stage, tx: mpsc::Sender<Notification>, job: F)
    where
        F: FnOnce(&mut [u8]) -> Result<u64, (io::Error, u64)> + Send + 'static,
    {
        self.pool.execute(move || {
            log::trace!("{stage} stage started");

            // The job owns its streams and drops them before we report,
            // so they are closed by the time the coordinator hears back.
            let mut buf = vec![0; CHUNK_SIZE];
            let result = job(&mut buf);

            match &result {
                Ok(n) => log::trace!("{stage} stage finished after {n} bytes"),
                Err((e, n)) => log::error!("{stage} stage failed after {n} bytes: {e}"),
            }

            let _ = tx.send(Notification { stage, result });
        });
    }

    /// Moves every byte of `source` into `sink`.
    ///
    /// Returns once both stages have finished, with both streams closed.
    /// A failing stage ends only itself; its peer winds down when the
    /// pipe closes, and all failures are reported together.
    ///
    /// There is no timeout. A source that never ends keeps this call
    /// blocked forever.
    pub fn run<R, W>(&mut self, source: R, sink: W) -> Result<RelayReport, RelayError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (writer, reader) = BoundedPipe::with_capacity(self.capacity).split();
        let (tx, rx) = mpsc::channel();

        log::debug!("Starting relay over a {} byte pipe", self.capacity);

        self.execute(Stage::Source, tx.clone(), move |buf| {
            let (mut source, mut writer) = (source, writer);
            pump(&mut source, &mut writer, buf)
        });
        self.execute(Stage::Sink, tx, move |buf| {
            let (mut reader, mut sink) = (reader, sink);
            pump(&mut reader, &mut sink, buf)
        });

        let mut report = RelayReport::default();
        let mut failures = Vec::new();
        let mut reported = [false; STAGES];

        // The senders live inside the stage jobs, so this ends once both
        // stages are gone, whether they reported or not.
        for Notification { stage, result } in rx.iter() {
            reported[stage as usize] = true;

            let bytes = match result {
                Ok(n) => n,
                Err((error, n)) => {
                    failures.push(StageFailure {
                        stage,
                        bytes: n,
                        error,
                    });
                    n
                }
            };

            match stage {
                Stage::Source => report.read = bytes,
                Stage::Sink => report.written = bytes,
            }
        }

        for stage in [Stage::Source, Stage::Sink] {
            if !reported[stage as usize] {
                failures.push(StageFailure {
                    stage,
                    bytes: 0,
                    error: io::Error::other("stage terminated without reporting"),
                });
            }
        }

        log::debug!(
            "Relay joined: {} bytes read, {} bytes written",
            report.read,
            report.written
        );

        if failures.is_empty() {
            debug_assert_eq!(report.read, report.written);
            Ok(report)
        } else {
            Err(RelayError { report, failures })
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

/// Relays `source` into `sink` on a freshly created [`Relay`].
pub fn relay<R, W>(source: R, sink: W) -> Result<RelayReport, RelayError>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    Relay::new().run(source, sink)
}
