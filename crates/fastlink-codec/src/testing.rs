//! Shared test doubles.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;

use crate::alloc::{Allocator, HeapAllocator};
use crate::codec::{Codec, CodecConfig};
use crate::error::{CodecError, Result};
use crate::service::{Message, ServiceTable};

/// Handler context recording what was processed.
#[derive(Debug, Default)]
pub struct Trace {
    pub entries: Vec<String>,
}

impl Trace {
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }
}

/// Service 1, message 1: UTF-8 text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Note {
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Message for Note {
    fn service_id(&self) -> u8 {
        1
    }

    fn message_id(&self) -> u8 {
        1
    }

    fn binary_size(&self) -> usize {
        self.text.len()
    }

    fn marshal(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self.text.as_bytes());
    }

    fn unmarshal(&mut self, buf: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(buf).map_err(|err| CodecError::malformed(err.to_string()))?;
        self.text = text.to_owned();
        Ok(())
    }
}

/// Service 1, message 2: raw bytes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Message for Blob {
    fn service_id(&self) -> u8 {
        1
    }

    fn message_id(&self) -> u8 {
        2
    }

    fn binary_size(&self) -> usize {
        self.data.len()
    }

    fn marshal(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.data);
    }

    fn unmarshal(&mut self, buf: &[u8]) -> Result<()> {
        self.data = buf.to_vec();
        Ok(())
    }
}

/// Reports an arbitrary size without holding the bytes.
pub struct Oversized(pub usize);

impl Message for Oversized {
    fn service_id(&self) -> u8 {
        1
    }

    fn message_id(&self) -> u8 {
        2
    }

    fn binary_size(&self) -> usize {
        self.0
    }

    fn marshal(&self, buf: &mut [u8]) {
        buf.fill(0);
    }

    fn unmarshal(&mut self, buf: &[u8]) -> Result<()> {
        self.0 = buf.len();
        Ok(())
    }
}

pub fn sample_service() -> ServiceTable<Trace> {
    ServiceTable::new(1)
        .route(|trace: &mut Trace, msg: Note| trace.push(format!("note {}", msg.text)))
        .route(|trace: &mut Trace, msg: Blob| trace.push(format!("blob {:?}", msg.data)))
}

pub fn with_sample_service(mut codec: Codec<Trace>) -> Arc<Codec<Trace>> {
    codec.register(sample_service());
    Arc::new(codec)
}

pub fn sample_codec(read_buffer_size: usize) -> Arc<Codec<Trace>> {
    let config = CodecConfig {
        read_buffer_size,
        ..CodecConfig::default()
    };
    with_sample_service(Codec::new(config).expect("valid test config"))
}

/// Allocator wrapper counting every alloc and free.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocs: AtomicUsize,
    frees: AtomicUsize,
}

impl CountingAllocator {
    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.allocs() - self.frees()
    }
}

impl Allocator for CountingAllocator {
    fn alloc(&self, size: usize) -> BytesMut {
        self.allocs.fetch_add(1, Ordering::SeqCst);
        HeapAllocator.alloc(size)
    }

    fn free(&self, buf: BytesMut) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        HeapAllocator.free(buf)
    }
}

#[derive(Debug)]
pub struct ByteByByteReader {
    pub bytes: Vec<u8>,
    pub pos: usize,
}

impl Read for ByteByByteReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.bytes.len() || buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.bytes[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

pub struct InterruptedThenData {
    pub state: u8,
    pub bytes: Vec<u8>,
    pub pos: usize,
}

impl Read for InterruptedThenData {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.state == 0 {
            self.state = 1;
            return Err(std::io::Error::from(ErrorKind::Interrupted));
        }
        let n = (self.bytes.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Yields its bytes, then fails with a connection reset instead of EOF.
pub struct FailAfter {
    bytes: Vec<u8>,
    pos: usize,
}

impl FailAfter {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl Read for FailAfter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.bytes.len() {
            return Err(std::io::Error::from(ErrorKind::ConnectionReset));
        }
        let n = (self.bytes.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::from(ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct ZeroWriter;

impl Write for ZeroWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Ok(0)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InterruptedWriteThenFlush {
    wrote_once: bool,
    flush_interrupted: bool,
    pub data: Vec<u8>,
}

impl Write for InterruptedWriteThenFlush {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !self.wrote_once {
            self.wrote_once = true;
            return Err(std::io::Error::from(ErrorKind::Interrupted));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.flush_interrupted {
            self.flush_interrupted = true;
            return Err(std::io::Error::from(ErrorKind::Interrupted));
        }
        Ok(())
    }
}

/// Counts `write` calls.
#[derive(Default)]
pub struct WriteCounter {
    pub writes: usize,
    pub data: Vec<u8>,
}

impl Write for WriteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writes += 1;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
