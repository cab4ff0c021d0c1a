use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Errors from misusing a [`JoinBarrier`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BarrierError {
    /// More completions were signaled than the barrier was built for.
    #[error("barrier for {0} workers received an extra completion signal")]
    Oversignaled(usize),

    /// The barrier was already awaited once.
    #[error("barrier was already awaited and is spent")]
    Spent,
}

#[derive(Debug)]
struct State {
    // Starts at `1 - workers`; the coordinator may pass once it is
    // positive and then takes the single unit for itself.
    permits: isize,
    spent: bool,
}

/// A one-shot primitive on which a coordinator blocks until a fixed
/// number of workers have each signaled completion.
///
/// Every worker calls [`JoinBarrier::signal_done`] exactly once, which
/// never blocks. The coordinator calls [`JoinBarrier::await_all`] exactly
/// once. Workers should prefer holding a [`Completion`] so that the
/// signal is delivered even when they bail out early.
#[derive(Debug)]
pub struct JoinBarrier {
    workers: usize,
    state: Mutex<State>,
    released: Condvar,
}

impl JoinBarrier {
    /// Creates a barrier waiting for `workers` completions.
    ///
    /// A barrier always waits for at least one worker.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            state: Mutex::new(State {
                permits: 1 - workers as isize,
                spent: false,
            }),
            released: Condvar::new(),
        }
    }

    /// The number of completions this barrier waits for.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is a plain counter that stays consistent across a
        // panic in another thread, so poisoning carries no meaning here.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the completion of one worker.
    pub fn signal_done(&self) -> Result<(), BarrierError> {
        let mut state = self.lock();

        // Once the coordinator took its unit, the counter is back at zero
        // even though every worker already signaled.
        let signaled = (state.permits + self.workers as isize - 1) as usize + state.spent as usize;
        if signaled >= self.workers {
            return Err(BarrierError::Oversignaled(self.workers));
        }

        state.permits += 1;
        if state.permits > 0 {
            self.released.notify_all();
        }

        Ok(())
    }

    /// Hands out a guard which signals completion when dropped.
    pub fn completion(&self) -> Completion<'_> {
        Completion { barrier: self }
    }

    /// Checks whether all workers have signaled, without blocking.
    pub fn is_released(&self) -> bool {
        let state = self.lock();
        state.spent || state.permits > 0
    }

    /// Blocks until every worker has signaled completion.
    ///
    /// There is no timeout; a worker that never signals keeps the
    /// caller blocked forever.
    pub fn await_all(&self) -> Result<(), BarrierError> {
        let mut state = self.lock();
        if state.spent {
            return Err(BarrierError::Spent);
        }

        while state.permits <= 0 {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.permits -= 1;
        state.spent = true;

        Ok(())
    }
}

/// A pending completion signal for a [`JoinBarrier`].
///
/// The signal is delivered when the guard is dropped, which covers
/// early returns and unwinding alike.
#[must_use = "dropping a Completion immediately signals the worker as done"]
#[derive(Debug)]
pub struct Completion<'a> {
    barrier: &'a JoinBarrier,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.barrier.signal_done() {
            log::error!("{e}");
        }
    }
}
