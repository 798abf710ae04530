//! Read-ahead buffering over raw streams, and the pool that recycles it.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{CodecError, Result};

/// Read-ahead storage detached from any stream.
///
/// This is what [`ReaderPool`] recycles between connections.
#[derive(Debug, Default)]
pub struct ReadAhead {
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl ReadAhead {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    fn clear(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    /// Size of the read-ahead window.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// A raw stream wrapped with a fixed-size read-ahead buffer.
///
/// Short payloads usually arrive within one read-ahead fill, so the decoder
/// can [`peek`](Self::peek) them in place instead of copying.
#[derive(Debug)]
pub struct BufferedReader<R> {
    inner: R,
    ahead: ReadAhead,
}

impl<R: Read> BufferedReader<R> {
    /// Wrap `inner` with a fresh `capacity`-byte read-ahead buffer.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self::from_parts(inner, ReadAhead::with_capacity(capacity))
    }

    fn from_parts(inner: R, mut ahead: ReadAhead) -> Self {
        ahead.clear();
        Self { inner, ahead }
    }

    /// Number of unread bytes held in the read-ahead buffer.
    pub fn buffered(&self) -> usize {
        self.ahead.filled - self.ahead.pos
    }

    /// Size of the read-ahead window.
    pub fn capacity(&self) -> usize {
        self.ahead.capacity()
    }

    /// Borrow the next `n` unread bytes without consuming them.
    ///
    /// Returns `None` unless all `n` bytes are already buffered; this never
    /// touches the stream. The slice borrows the reader, so it is gone before
    /// the next [`consume`](Self::consume) or read.
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        (self.buffered() >= n).then(|| &self.ahead.buf[self.ahead.pos..self.ahead.pos + n])
    }

    /// Discard `n` buffered bytes.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` bytes are buffered.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.buffered(),
            "consume({n}) with only {} bytes buffered",
            self.buffered()
        );
        self.ahead.pos += n;
        if self.ahead.pos == self.ahead.filled {
            self.ahead.clear();
        }
    }

    /// Fill `dst` completely, from the buffer first and then the stream.
    ///
    /// Reads at least as large as the read-ahead window bypass it when the
    /// buffer is empty. End of stream before `dst` is full is reported as
    /// [`CodecError::ConnectionClosed`].
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut done = 0usize;
        while done < dst.len() {
            if self.buffered() == 0 {
                let remaining = dst.len() - done;
                if remaining >= self.capacity() {
                    done += read_some(&mut self.inner, &mut dst[done..])?;
                    continue;
                }
                self.fill()?;
            }

            let n = self.buffered().min(dst.len() - done);
            let start = self.ahead.pos;
            dst[done..done + n].copy_from_slice(&self.ahead.buf[start..start + n]);
            self.consume(n);
            done += n;
        }
        Ok(())
    }

    // Refill an empty buffer with a single read from the stream.
    fn fill(&mut self) -> Result<()> {
        debug_assert_eq!(self.buffered(), 0);
        self.ahead.clear();
        self.ahead.filled = read_some(&mut self.inner, &mut self.ahead.buf)?;
        Ok(())
    }

    /// Rebind to a new stream, dropping any buffered bytes.
    ///
    /// Returns the previous stream.
    pub fn reset(&mut self, inner: R) -> R {
        self.ahead.clear();
        std::mem::replace(&mut self.inner, inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Reading from it directly desynchronizes the buffered bytes.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Split into the stream and its read-ahead storage.
    pub fn into_parts(self) -> (R, ReadAhead) {
        (self.inner, self.ahead)
    }

    pub(crate) fn take_ahead(&mut self) -> ReadAhead {
        std::mem::take(&mut self.ahead)
    }
}

// One successful read of at least one byte.
fn read_some<R: Read>(inner: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match inner.read(buf) {
            Ok(0) => return Err(CodecError::ConnectionClosed),
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(CodecError::Io(err)),
        }
    }
}

/// Default number of idle read-ahead buffers kept by a [`ReaderPool`].
pub const DEFAULT_MAX_IDLE_READERS: usize = 64;

/// Counters describing reader pool activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderPoolStats {
    /// Read-ahead buffers allocated because the pool was empty.
    pub created: u64,
    /// Acquisitions served from an idle buffer.
    pub reused: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
}

/// Concurrent pool of read-ahead buffers of one fixed size.
#[derive(Debug)]
pub struct ReaderPool {
    buffer_size: usize,
    max_idle: usize,
    idle: Mutex<Vec<ReadAhead>>,
    created: AtomicU64,
    reused: AtomicU64,
}

impl ReaderPool {
    /// Create a pool handing out `buffer_size`-byte read-ahead buffers.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            buffer_size,
            max_idle,
            idle: Mutex::new(Vec::new()),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Read-ahead size of every buffer this pool hands out.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Wrap `inner` with a pooled read-ahead buffer, creating one if none is idle.
    pub fn acquire<R: Read>(&self, inner: R) -> BufferedReader<R> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match recycled {
            Some(ahead) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(size = self.buffer_size, "reusing pooled reader");
                BufferedReader::from_parts(inner, ahead)
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                BufferedReader::with_capacity(self.buffer_size, inner)
            }
        }
    }

    /// Detach `reader` from its stream and keep its buffer for reuse.
    ///
    /// Returns the stream.
    pub fn release<R: Read>(&self, reader: BufferedReader<R>) -> R {
        let (inner, ahead) = reader.into_parts();
        self.put(ahead);
        inner
    }

    pub(crate) fn put(&self, mut ahead: ReadAhead) {
        if ahead.capacity() != self.buffer_size {
            return;
        }
        ahead.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(ahead);
        }
    }

    /// Snapshot of pool counters.
    pub fn stats(&self) -> ReaderPoolStats {
        ReaderPoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}
