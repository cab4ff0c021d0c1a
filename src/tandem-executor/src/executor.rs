use std::{
    any::Any,
    env, io,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
    thread,
};

use thiserror::Error;

use crate::JoinBarrier;

mod stripe;
pub use stripe::{stripes, Stripe};

const TANDEM_WORKER_THREADS: &str = "TANDEM_WORKER_THREADS";

const WORKER_NAME: &str = "tandem-worker";
const WORKER_STACK: usize = 1_048_576;

#[derive(Clone, Debug, Error)]
#[error(
    "invalid value in {}; must be a natural number",
    TANDEM_WORKER_THREADS
)]
pub struct BadConfiguration;

fn parse_threads(value: Option<&str>) -> Result<usize, BadConfiguration> {
    match value {
        Some(value) => match value.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(BadConfiguration),
            Ok(n) => Ok(n),
        },

        None => Ok(thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1)),
    }
}

fn available_threads() -> Result<usize, BadConfiguration> {
    parse_threads(env::var(TANDEM_WORKER_THREADS).ok().as_deref())
}

/// Errors produced while running a parallel phase.
#[derive(Debug, Error)]
pub enum ComputeError<E>
where
    E: std::error::Error + 'static,
{
    /// The per-index function failed inside a worker.
    #[error("worker {worker} failed at index {index}")]
    Worker {
        worker: usize,
        index: usize,
        #[source]
        source: E,
    },

    /// A worker panicked while working on its stripe.
    #[error("worker {worker} panicked: {message}")]
    Panicked { worker: usize, message: String },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Runs index-parallel computations over a fixed number of workers.
///
/// The worker count can be configured with the `TANDEM_WORKER_THREADS`
/// environment variable through [`Executor::get`]. If not set, falls
/// back to [`thread::available_parallelism`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Executor {
    workers: NonZeroUsize,
}

impl Executor {
    /// Creates an executor with the given number of workers.
    ///
    /// A count of zero is treated as one.
    #[inline]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Gets an executor sized for the configuration of available
    /// worker threads on the system.
    #[inline]
    pub fn get() -> Result<Self, BadConfiguration> {
        available_threads().map(Self::new)
    }

    /// The number of workers every parallel phase is split into.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Stores `f(i)` into `out[i]` for every index of `out`.
    ///
    /// Index `i` is computed by worker `i % workers`, and each worker
    /// walks its stripe in ascending order. This only returns once all
    /// workers have signaled completion on the join barrier.
    ///
    /// When `f` fails, the worker stops its stripe and the first failure
    /// recorded across all workers is returned. Cells which were not
    /// reached are left with their previous contents.
    pub fn fill<T, E, F>(&self, out: &mut [T], f: F) -> Result<(), ComputeError<E>>
    where
        T: Send,
        E: std::error::Error + Send + 'static,
        F: Fn(usize) -> Result<T, E> + Sync,
    {
        let workers = self.workers();
        let len = out.len();
        log::debug!("Dispatching {workers} workers over {len} indices");

        let barrier = JoinBarrier::new(workers);
        let failure: Mutex<Option<ComputeError<E>>> = Mutex::new(None);
        let record = |e: ComputeError<E>| {
            let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(e);
            }
        };

        thread::scope(|s| {
            for stripe in stripes(out, workers) {
                let worker = stripe.worker();
                let completion = barrier.completion();
                let (f, record) = (&f, &record);

                let spawned = thread::Builder::new()
                    .name(format!("{WORKER_NAME}-{worker}"))
                    .stack_size(WORKER_STACK)
                    .spawn_scoped(s, move || {
                        let _completion = completion;
                        log::trace!("Worker {worker} started on {} cells", stripe.len());

                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            for (index, cell) in stripe {
                                match f(index) {
                                    Ok(value) => *cell = value,
                                    Err(source) => {
                                        return Err(ComputeError::Worker {
                                            worker,
                                            index,
                                            source,
                                        })
                                    }
                                }
                            }

                            Ok(())
                        }));

                        match outcome {
                            Ok(Ok(())) => log::trace!("Worker {worker} done"),
                            Ok(Err(e)) => record(e),
                            Err(payload) => record(ComputeError::Panicked {
                                worker,
                                message: panic_message(&*payload),
                            }),
                        }
                    });

                // On failure the closure is dropped right here, and with
                // it the completion guard, so the barrier still releases.
                if let Err(source) = spawned {
                    record(ComputeError::Spawn { worker, source });
                }
            }

            // A barrier is only ever awaited once, right here.
            let _ = barrier.await_all();
            log::debug!("All {workers} workers joined");
        });

        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
