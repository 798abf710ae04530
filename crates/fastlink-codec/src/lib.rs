//! Length-prefixed binary framing with service/message dispatch.
//!
//! Every frame carries:
//! - A 2-byte little-endian payload length (at most 65535)
//! - A 1-byte service ID, selecting one of 256 registered services
//! - A 1-byte message ID within that service
//!
//! Decoding resolves each frame into a [`Request`] pairing a fresh message
//! with its handler. Payloads already sitting in the read-ahead buffer are
//! decoded in place; larger ones go through the pluggable [`Allocator`].

pub mod alloc;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod reader;
pub mod registry;
pub mod request;
pub mod service;

#[cfg(test)]
mod testing;

pub use alloc::{Allocator, HeapAllocator, PoolAllocator, PooledBuf};
pub use codec::{
    Codec, CodecConfig, FrameHeader, DEFAULT_READ_BUFFER_SIZE, HEADER_SIZE, MAX_PAYLOAD,
};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, Result};
pub use reader::{BufferedReader, ReadAhead, ReaderPool, ReaderPoolStats};
pub use registry::ServiceRegistry;
pub use request::Request;
pub use service::{handler_fn, AsAny, Handler, Message, Service, ServiceTable};
