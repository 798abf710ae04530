use std::io::{ErrorKind, Write};
use std::sync::Arc;

use crate::alloc::{Allocator, PooledBuf};
use crate::codec::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{CodecError, Result};
use crate::service::Message;

/// Writes one frame per message to any `Write` stream.
pub struct Encoder<W> {
    inner: W,
    allocator: Arc<dyn Allocator>,
}

impl<W: Write> Encoder<W> {
    pub(crate) fn new(inner: W, allocator: Arc<dyn Allocator>) -> Self {
        Self { inner, allocator }
    }

    /// Frame `message` and write it out (blocking).
    ///
    /// Payloads over [`MAX_PAYLOAD`] are rejected before anything is
    /// allocated or written.
    pub fn encode(&mut self, message: &dyn Message) -> Result<()> {
        let size = message.binary_size();
        if size > MAX_PAYLOAD {
            return Err(CodecError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD,
            });
        }

        let header = FrameHeader {
            len: size as u16,
            service_id: message.service_id(),
            message_id: message.message_id(),
        };
        let mut buf = PooledBuf::new(self.allocator.as_ref(), header.wire_size());
        header.encode_into(&mut buf);
        message.marshal(&mut buf[HEADER_SIZE..]);

        tracing::trace!(
            service = header.service_id,
            message = header.message_id,
            size,
            "encoding frame"
        );

        write_all(&mut self.inner, &buf)?;
        flush(&mut self.inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the encoder and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn write_all<W: Write>(inner: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(CodecError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(CodecError::Io(err)),
        }
    }
    Ok(())
}

fn flush<W: Write>(inner: &mut W) -> Result<()> {
    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(CodecError::Io(err)),
        }
    }
}
