//! In-memory byte source that is filled while it is being read
//!
//! A [`ProgressiveWriter`] appends bytes (a download in progress) and a
//! [`ProgressiveSource`] reads them. Blocking reads wait on a condition
//! variable until the requested range has arrived or the writer is done.

use super::ByteSource;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Default)]
struct State {
    data: Vec<u8>,
    finished: bool,
    failed: Option<String>,
}

struct Inner {
    state: Mutex<State>,
    arrived: Condvar,
}

/// Write half of a progressive stream
#[derive(Clone)]
pub struct ProgressiveWriter {
    inner: Arc<Inner>,
}

impl ProgressiveWriter {
    /// Append freshly downloaded bytes
    pub fn append(&self, bytes: &[u8]) {
        let mut state = self.inner.state.lock();
        if state.finished {
            return;
        }
        state.data.extend_from_slice(bytes);
        self.inner.arrived.notify_all();
    }

    /// Mark the stream complete; its size becomes known
    pub fn finish(&self) {
        let mut state = self.inner.state.lock();
        state.finished = true;
        self.inner.arrived.notify_all();
    }

    /// Abort the stream; pending and future reads fail
    pub fn fail<S: Into<String>>(&self, reason: S) {
        let mut state = self.inner.state.lock();
        state.failed = Some(reason.into());
        state.finished = true;
        self.inner.arrived.notify_all();
    }

    /// Bytes received so far
    pub fn len(&self) -> usize {
        self.inner.state.lock().data.len()
    }

    /// Whether nothing has been received yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read half of a progressive stream
pub struct ProgressiveSource {
    inner: Arc<Inner>,
    pos: u64,
    eof: bool,
    bad: bool,
}

impl ProgressiveSource {
    /// Create an empty stream and its writer
    pub fn new() -> (Self, ProgressiveWriter) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            arrived: Condvar::new(),
        });
        let writer = ProgressiveWriter {
            inner: Arc::clone(&inner),
        };
        (
            ProgressiveSource {
                inner,
                pos: 0,
                eof: false,
                bad: false,
            },
            writer,
        )
    }

    fn copy_available(&mut self, state: &State, buf: &mut [u8]) -> Result<usize> {
        if let Some(reason) = &state.failed {
            self.bad = true;
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                reason.clone(),
            )));
        }
        let start = (self.pos as usize).min(state.data.len());
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        self.pos += n as u64;
        if n < buf.len() && state.finished {
            self.eof = true;
        }
        Ok(n)
    }
}

impl ByteSource for ProgressiveSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inner = Arc::clone(&self.inner);
        let mut state = inner.state.lock();
        let wanted = self.pos as usize + buf.len();
        while state.data.len() < wanted && !state.finished {
            inner.arrived.wait(&mut state);
        }
        self.copy_available(&state, buf)
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inner = Arc::clone(&self.inner);
        let state = inner.state.lock();
        self.copy_available(&state, buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        let state = self.inner.state.lock();
        if state.finished && pos > state.data.len() as u64 {
            return Err(Error::EndOfStream);
        }
        self.pos = pos;
        self.eof = false;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn bad(&self) -> bool {
        self.bad
    }

    fn size(&self) -> Option<u64> {
        let state = self.inner.state.lock();
        state.finished.then_some(state.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_blocking_read_waits_for_data() {
        let (mut src, writer) = ProgressiveSource::new();
        let feeder = thread::spawn(move || {
            writer.append(b"FL");
            thread::sleep(Duration::from_millis(20));
            writer.append(b"V!");
            writer.finish();
        });

        let mut buf = [0u8; 3];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"FLV");
        feeder.join().unwrap();
        assert_eq!(src.size(), Some(4));
    }

    #[test]
    fn test_nonblocking_read_returns_available() {
        let (mut src, writer) = ProgressiveSource::new();
        writer.append(&[1, 2]);
        let mut buf = [0u8; 4];
        assert_eq!(src.read_nonblocking(&mut buf).unwrap(), 2);
        assert!(!src.eof());
        assert_eq!(src.size(), None);
    }

    #[test]
    fn test_short_read_after_finish() {
        let (mut src, writer) = ProgressiveSource::new();
        writer.append(&[9; 5]);
        writer.finish();
        let mut buf = [0u8; 8];
        assert_eq!(src.read(&mut buf).unwrap(), 5);
        assert!(src.eof());
        assert!(src.seek(6).is_err());
    }

    #[test]
    fn test_failed_stream_reports_io_error() {
        let (mut src, writer) = ProgressiveSource::new();
        writer.fail("connection reset");
        let mut buf = [0u8; 1];
        assert!(matches!(src.read(&mut buf), Err(Error::Io(_))));
        assert!(src.bad());
    }
}
