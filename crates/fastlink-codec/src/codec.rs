use std::io::{Read, Write};
use std::sync::Arc;

use crate::alloc::{Allocator, HeapAllocator};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, Result};
use crate::reader::{ReaderPool, ReaderPoolStats, DEFAULT_MAX_IDLE_READERS};
use crate::registry::ServiceRegistry;
use crate::service::Service;

/// Frame header: length (2) + service (1) + message (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Default read-ahead window per decoder: 4 KiB.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Parsed frame header.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────┬─────────┬──────────────────┐
/// │ Length       │ Service │ Message │ Payload          │
/// │ (2B LE)      │ (1B)    │ (1B)    │ (Length bytes)   │
/// └──────────────┴─────────┴─────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub len: u16,
    pub service_id: u8,
    pub message_id: u8,
}

impl FrameHeader {
    /// Parse the first [`HEADER_SIZE`] bytes of a frame.
    pub fn parse(head: &[u8; HEADER_SIZE]) -> Self {
        Self {
            len: u16::from_le_bytes([head[0], head[1]]),
            service_id: head[2],
            message_id: head[3],
        }
    }

    /// Write the header into the first [`HEADER_SIZE`] bytes of `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than [`HEADER_SIZE`].
    pub fn encode_into(&self, dst: &mut [u8]) {
        dst[..2].copy_from_slice(&self.len.to_le_bytes());
        dst[2] = self.service_id;
        dst[3] = self.message_id;
    }

    /// Total wire size of the frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + usize::from(self.len)
    }
}

/// Configuration for a [`Codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Read-ahead window of every decoder. Default: 4 KiB.
    ///
    /// Payloads that fit in the window are usually decoded in place.
    pub read_buffer_size: usize,
    /// Maximum number of idle read-ahead buffers kept for reuse.
    pub max_idle_readers: usize,
}

impl CodecConfig {
    /// Reject configurations the codec cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(CodecError::InvalidConfig(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_idle_readers: DEFAULT_MAX_IDLE_READERS,
        }
    }
}

/// Codec factory shared by all connections.
///
/// Owns the allocator, the service registry and the reader pool. Register
/// every service first, then wrap the codec in an [`Arc`] and create one
/// [`Encoder`] and one [`Decoder`] per connection. `C` is the context handed
/// to message handlers.
pub struct Codec<C> {
    config: CodecConfig,
    allocator: Arc<dyn Allocator>,
    registry: ServiceRegistry<C>,
    readers: ReaderPool,
}

impl<C> Codec<C> {
    /// Create a codec backed by [`HeapAllocator`].
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            allocator: Arc::new(HeapAllocator),
            registry: ServiceRegistry::new(),
            readers: ReaderPool::new(config.read_buffer_size, config.max_idle_readers),
        })
    }

    /// Use `allocator` for every frame buffer.
    pub fn with_allocator(mut self, allocator: Arc<dyn Allocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Register a service.
    ///
    /// # Panics
    ///
    /// Panics if the service ID is already registered.
    pub fn register(&mut self, service: impl Service<C> + 'static) {
        self.registry.register(service);
    }

    /// Register a service, reporting a duplicate ID as an error.
    pub fn try_register(&mut self, service: impl Service<C> + 'static) -> Result<()> {
        self.registry.try_register(service)
    }

    /// Create an encoder writing frames to `writer`.
    pub fn new_encoder<W: Write>(&self, writer: W) -> Encoder<W> {
        Encoder::new(writer, Arc::clone(&self.allocator))
    }

    /// Create a decoder reading frames from `reader`.
    ///
    /// The read-ahead buffer comes from the reader pool and goes back to it
    /// when the decoder is disposed or dropped.
    pub fn new_decoder<R: Read>(self: &Arc<Self>, reader: R) -> Decoder<R, C> {
        let reader = self.readers.acquire(reader);
        Decoder::new(Arc::clone(self), reader)
    }

    /// Configuration this codec was built with.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Registered services.
    pub fn registry(&self) -> &ServiceRegistry<C> {
        &self.registry
    }

    pub(crate) fn allocator(&self) -> &dyn Allocator {
        self.allocator.as_ref()
    }

    pub(crate) fn readers(&self) -> &ReaderPool {
        &self.readers
    }

    /// Reader pool counters.
    pub fn reader_pool_stats(&self) -> ReaderPoolStats {
        self.readers.stats()
    }
}
