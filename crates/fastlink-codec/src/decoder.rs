use std::io::Read;
use std::sync::Arc;

use crate::alloc::PooledBuf;
use crate::codec::{Codec, FrameHeader, HEADER_SIZE};
use crate::error::Result;
use crate::reader::BufferedReader;
use crate::registry::ServiceRegistry;
use crate::request::Request;

/// Reads frames from a buffered stream and resolves them into requests.
///
/// The read-ahead buffer is borrowed from the codec's reader pool and handed
/// back by [`Decoder::dispose`] or on drop.
pub struct Decoder<R: Read, C> {
    codec: Arc<Codec<C>>,
    head: [u8; HEADER_SIZE],
    reader: BufferedReader<R>,
}

impl<R: Read, C> Decoder<R, C> {
    pub(crate) fn new(codec: Arc<Codec<C>>, reader: BufferedReader<R>) -> Self {
        Self {
            codec,
            head: [0u8; HEADER_SIZE],
            reader,
        }
    }

    /// Read the next frame and resolve it (blocking).
    ///
    /// Returns `Err(CodecError::ConnectionClosed)` when the stream ends, and
    /// `UnknownService`/`UnknownMessage` when the frame addresses something
    /// the registry does not know. The offending payload is consumed either
    /// way, so the stream stays aligned on frame boundaries.
    pub fn decode(&mut self) -> Result<Request<C>> {
        self.reader.read_exact(&mut self.head)?;
        let header = FrameHeader::parse(&self.head);
        let len = usize::from(header.len);
        let registry = self.codec.registry();

        if let Some(payload) = self.reader.peek(len) {
            let result = dispatch(registry, header, payload, true);
            self.reader.consume(len);
            return result;
        }

        let mut buf = PooledBuf::new(self.codec.allocator(), len);
        self.reader.read_exact(&mut buf)?;
        dispatch(registry, header, &buf, false)
    }

    /// Number of bytes already buffered past the last decoded frame.
    pub fn buffered(&self) -> usize {
        self.reader.buffered()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    /// End this decoder and return its read-ahead buffer to the pool.
    ///
    /// Equivalent to dropping it.
    pub fn dispose(self) {}
}

impl<R: Read, C> Drop for Decoder<R, C> {
    fn drop(&mut self) {
        self.codec.readers().put(self.reader.take_ahead());
    }
}

fn dispatch<C>(
    registry: &ServiceRegistry<C>,
    header: FrameHeader,
    payload: &[u8],
    zero_copy: bool,
) -> Result<Request<C>> {
    let (mut message, handler) = registry
        .lookup(header.service_id, header.message_id)
        .inspect_err(|err| {
            tracing::warn!(
                service = header.service_id,
                message = header.message_id,
                error = %err,
                "rejecting frame"
            )
        })?;
    message.unmarshal(payload)?;

    tracing::trace!(
        service = header.service_id,
        message = header.message_id,
        size = payload.len(),
        zero_copy,
        "decoded frame"
    );
    Ok(Request::new(message, handler))
}
