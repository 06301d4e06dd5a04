//! In-process duplex byte channel.
//!
//! Each direction is a bounded-by-memory byte pipe. A read on an empty pipe
//! returns `WouldBlock` unless a read timeout is set, in which case it waits
//! up to that long for the peer to write. Closing either end (or dropping its
//! last handle) closes both directions: the peer drains what is buffered and
//! then reads EOF, and its writes fail with `BrokenPipe`.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

struct End {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    read_timeout: Mutex<Option<Duration>>,
}

impl End {
    fn close(&self) {
        self.rx.close();
        self.tx.close();
    }
}

impl Drop for End {
    fn drop(&mut self) {
        self.close();
    }
}

/// One end of an in-process duplex channel. Clones share the same end.
#[derive(Clone)]
pub struct MemoryChannel {
    end: Arc<End>,
}

impl MemoryChannel {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let a = End {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            read_timeout: Mutex::new(None),
        };
        let b = End {
            rx: a_to_b,
            tx: b_to_a,
            read_timeout: Mutex::new(None),
        };
        (Self { end: Arc::new(a) }, Self { end: Arc::new(b) })
    }

    /// Wait up to `timeout` for input on reads; `None` makes reads non-blocking.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self
            .end
            .read_timeout
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = timeout;
    }

    /// Close both directions.
    pub fn close(&self) {
        self.end.close();
    }

    /// Bytes written by the peer and not yet read.
    pub fn pending(&self) -> usize {
        self.end.rx.lock().bytes.len()
    }

    fn read_timeout(&self) -> Option<Duration> {
        *self
            .end
            .read_timeout
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = self.read_timeout().map(|timeout| Instant::now() + timeout);
        let pipe = &self.end.rx;
        let mut state = pipe.lock();
        loop {
            if !state.bytes.is_empty() {
                let n = buf.len().min(state.bytes.len());
                for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            let Some(deadline) = deadline else {
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            };
            let now = Instant::now();
            if now >= deadline {
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            state = pipe
                .ready
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let pipe = &self.end.tx;
        let mut state = pipe.lock();
        if state.closed {
            return Err(std::io::Error::from(ErrorKind::BrokenPipe));
        }
        state.bytes.extend(buf.iter().copied());
        drop(state);
        pipe.ready.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("pending", &self.pending())
            .finish()
    }
}
