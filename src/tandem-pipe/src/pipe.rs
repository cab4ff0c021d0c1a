use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

/// Default capacity of a [`BoundedPipe`] in bytes.
pub const PIPE_CAPACITY: usize = 0x10000;

#[derive(Debug)]
struct State {
    buf: VecDeque<u8>,
    writer_closed: bool,
    reader_closed: bool,
    written: u64,
    read: u64,
}

#[derive(Debug)]
struct Shared {
    capacity: usize,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-process, single-producer single-consumer byte channel over a
/// fixed-size ring buffer.
///
/// The pipe itself is only a constructor; [`BoundedPipe::split`] hands
/// out the two ends which then share the buffer.
#[derive(Debug)]
pub struct BoundedPipe {
    shared: Arc<Shared>,
}

impl BoundedPipe {
    /// Creates a pipe with [`PIPE_CAPACITY`] bytes of buffer.
    pub fn new() -> Self {
        Self::with_capacity(PIPE_CAPACITY)
    }

    /// Creates a pipe buffering up to `capacity` bytes.
    ///
    /// The capacity is at least one byte.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(State {
                    buf: VecDeque::with_capacity(capacity),
                    writer_closed: false,
                    reader_closed: false,
                    written: 0,
                    read: 0,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    /// The number of bytes the pipe buffers at most.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Splits the pipe into its producer and consumer ends.
    pub fn split(self) -> (PipeWriter, PipeReader) {
        let writer = PipeWriter {
            shared: self.shared.clone(),
            closed: false,
        };
        let reader = PipeReader {
            shared: self.shared,
        };

        (writer, reader)
    }
}

impl Default for BoundedPipe {
    fn default() -> Self {
        Self::new()
    }
}

/// The producer end of a [`BoundedPipe`].
///
/// Dropping the writer closes the pipe.
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    closed: bool,
}

impl PipeWriter {
    /// Signals that no further data will arrive.
    ///
    /// The reader still gets every byte that was written before. Calling
    /// this more than once has no further effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.shared.lock();
        state.writer_closed = true;
        drop(state);

        self.shared.not_empty.notify_all();
    }

    /// The total number of bytes accepted by the pipe so far.
    pub fn bytes_written(&self) -> u64 {
        self.shared.lock().written
    }
}

impl Write for PipeWriter {
    /// Blocks while the pipe is full, then accepts as many bytes of
    /// `data` as fit into the buffer.
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write to closed pipe",
            ));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let capacity = self.shared.capacity;
        let mut state = self.shared.lock();
        while state.buf.len() == capacity && !state.reader_closed {
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.reader_closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader was dropped",
            ));
        }

        let n = data.len().min(capacity - state.buf.len());
        state.buf.extend(&data[..n]);
        state.written += n as u64;
        drop(state);

        self.shared.not_empty.notify_one();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// The consumer end of a [`BoundedPipe`].
///
/// Dropping the reader makes every further write fail with
/// [`io::ErrorKind::BrokenPipe`].
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    /// The total number of bytes taken out of the pipe so far.
    pub fn bytes_read(&self) -> u64 {
        self.shared.lock().read
    }
}

impl Read for PipeReader {
    /// Blocks while the pipe is empty and the writer is still open.
    ///
    /// Returns `Ok(0)` once the writer closed and all data was drained.
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.lock();
        while state.buf.is_empty() && !state.writer_closed {
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let n = out.len().min(state.buf.len());
        for (dst, src) in out.iter_mut().zip(state.buf.drain(..n)) {
            *dst = src;
        }
        state.read += n as u64;
        drop(state);

        if n > 0 {
            self.shared.not_full.notify_one();
        }
        Ok(n)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.reader_closed = true;
        drop(state);

        self.shared.not_full.notify_all();
    }
}
