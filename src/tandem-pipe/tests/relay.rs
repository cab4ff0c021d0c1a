use std::{
    fs::{self, File},
    io::{self, Cursor, Read, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use tandem_pipe::{copy_sequential, relay, Relay, RelayReport, Stage, PIPE_CAPACITY};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

const LENGTHS: [usize; 5] = [0, 1, PIPE_CAPACITY, PIPE_CAPACITY + 1, 3 * PIPE_CAPACITY + 17];

/// Counts how often the wrapped stream gets dropped.
struct Tracked<T> {
    inner: T,
    drops: Arc<AtomicUsize>,
}

impl<T> Tracked<T> {
    fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let tracked = Self {
            inner,
            drops: drops.clone(),
        };
        (tracked, drops)
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: Read> Read for Tracked<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Write> Write for Tracked<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Yields `left` bytes, then fails.
struct FailingReader {
    left: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::Error::other("disk vanished"));
        }
        let n = buf.len().min(self.left);
        buf[..n].fill(0xAB);
        self.left -= n;
        Ok(n)
    }
}

/// Accepts `left` bytes, then fails.
struct FailingWriter {
    left: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "no space left"));
        }
        let n = buf.len().min(self.left);
        self.left -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shares its buffer so tests can inspect it after the relay dropped it.
#[derive(Clone, Default)]
struct SharedSink(Arc<std::sync::Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn file_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut relay = Relay::new();

    for len in LENGTHS {
        let data = pattern(len);
        let source_path = dir.path().join(format!("source-{len}"));
        let sink_path = dir.path().join(format!("sink-{len}"));
        fs::write(&source_path, &data)?;

        let report = relay.run(File::open(&source_path)?, File::create(&sink_path)?)?;

        assert_eq!(report, RelayReport { read: len as u64, written: len as u64 });
        assert_eq!(fs::read(&sink_path)?, data);
    }

    Ok(())
}

#[test]
fn sequential_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    for len in LENGTHS {
        let data = pattern(len);
        let source_path = dir.path().join(format!("source-{len}"));
        let sink_path = dir.path().join(format!("sink-{len}"));
        fs::write(&source_path, &data)?;

        let copied = copy_sequential(File::open(&source_path)?, File::create(&sink_path)?)?;

        assert_eq!(copied, len as u64);
        assert_eq!(fs::read(&sink_path)?, data);
    }

    Ok(())
}

#[test]
fn tiny_pipe_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let data = pattern(50_000);
    let sink = SharedSink::default();

    let report = Relay::with_capacity(3).run(Cursor::new(data.clone()), sink.clone())?;

    assert_eq!(report.written, data.len() as u64);
    assert_eq!(*sink.0.lock().unwrap(), data);

    Ok(())
}

#[test]
fn closes_streams_once_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let (source, source_drops) = Tracked::new(Cursor::new(pattern(PIPE_CAPACITY * 2)));
    let (sink, sink_drops) = Tracked::new(io::sink());

    relay(source, sink)?;

    // Both streams are gone by the time the relay returns.
    assert_eq!(source_drops.load(Ordering::SeqCst), 1);
    assert_eq!(sink_drops.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test]
fn source_failure_is_reported() {
    let (source, source_drops) = Tracked::new(FailingReader { left: 1000 });
    let sink = SharedSink::default();
    let (tracked_sink, sink_drops) = Tracked::new(sink.clone());

    let err = relay(source, tracked_sink).unwrap_err();

    assert!(err.failed(Stage::Source));
    assert!(!err.failed(Stage::Sink));
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].bytes, 1000);

    // The sink stage still delivered everything that made it through.
    assert_eq!(err.report(), RelayReport { read: 1000, written: 1000 });
    assert_eq!(sink.0.lock().unwrap().len(), 1000);

    assert_eq!(source_drops.load(Ordering::SeqCst), 1);
    assert_eq!(sink_drops.load(Ordering::SeqCst), 1);
}

#[test]
fn sink_failure_is_reported() {
    let (source, source_drops) = Tracked::new(Cursor::new(pattern(PIPE_CAPACITY * 4)));
    let (sink, sink_drops) = Tracked::new(FailingWriter { left: 100 });

    let err = relay(source, sink).unwrap_err();

    let sink_failure = err
        .failures()
        .iter()
        .find(|f| f.stage == Stage::Sink)
        .unwrap();
    assert_eq!(sink_failure.error.kind(), io::ErrorKind::WriteZero);
    assert!(err.report().written < err.report().read || err.failed(Stage::Source));
    assert!(err.to_string().contains("sink stage failed"));

    // The source stage was cut off by the dropped pipe reader rather
    // than left blocking on a full pipe.
    if let Some(source_failure) = err.failures().iter().find(|f| f.stage == Stage::Source) {
        assert_eq!(source_failure.error.kind(), io::ErrorKind::BrokenPipe);
    }

    assert_eq!(source_drops.load(Ordering::SeqCst), 1);
    assert_eq!(sink_drops.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_stage_is_reported() {
    struct Exploding;

    impl Read for Exploding {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            panic!("source exploded");
        }
    }

    let err = relay(Exploding, io::sink()).unwrap_err();
    assert!(err.failed(Stage::Source));
    assert!(!err.failed(Stage::Sink));
}

/// Blocks on every read until the test hands it a chunk.
struct Gated(mpsc::Receiver<Vec<u8>>, Vec<u8>);

impl Read for Gated {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.1.is_empty() {
            match self.0.recv() {
                Ok(chunk) => self.1 = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.1.len());
        buf[..n].copy_from_slice(&self.1[..n]);
        self.1 = self.1.split_off(n);
        Ok(n)
    }
}

#[test]
fn waits_for_a_stalled_source() {
    let (chunks, gate) = mpsc::channel();
    let sink = SharedSink::default();
    let (done_tx, done_rx) = mpsc::channel();

    let coordinator = {
        let sink = sink.clone();
        thread::spawn(move || {
            let result = relay(Gated(gate, Vec::new()), sink);
            done_tx.send(()).unwrap();
            result
        })
    };

    chunks.send(b"first".to_vec()).unwrap();

    // The source never reaches its end on its own; there is no timeout,
    // so the relay must not claim completion.
    assert_eq!(
        done_rx.recv_timeout(Duration::from_millis(150)),
        Err(mpsc::RecvTimeoutError::Timeout)
    );

    chunks.send(b" second".to_vec()).unwrap();
    drop(chunks);

    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let report = coordinator.join().unwrap().unwrap();

    assert_eq!(report.written, 12);
    assert_eq!(*sink.0.lock().unwrap(), b"first second");
}
