/// Errors that can occur while encoding, decoding or dispatching frames.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Two services claimed the same service ID.
    #[error("duplicate service ID: {service}")]
    DuplicateService { service: u8 },

    /// The codec configuration is unusable.
    #[error("invalid codec config: {0}")]
    InvalidConfig(String),

    /// The message payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A frame addressed a service that is not registered.
    #[error("unknown service ID: {service}")]
    UnknownService { service: u8 },

    /// A frame addressed a message the service does not define.
    #[error("unknown message ID {message} for service {service}")]
    UnknownMessage { service: u8, message: u8 },

    /// The message rejected its payload.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Build a [`CodecError::Malformed`] from anything printable.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    /// True for errors caused by the peer violating the framing protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownService { .. } | Self::UnknownMessage { .. } | Self::Malformed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
