//! Demo service used by the `fastlink` CLI.
//!
//! Service [`DEMO_SERVICE`] defines two messages: [`Text`] (UTF-8) and
//! [`Raw`] (opaque bytes). Both marshal their content verbatim.

use fastlink_codec::{CodecError, Message, Result, ServiceTable};

/// Service ID of the demo service.
pub const DEMO_SERVICE: u8 = 1;
/// Message ID of [`Text`].
pub const TEXT_MESSAGE: u8 = 1;
/// Message ID of [`Raw`].
pub const RAW_MESSAGE: u8 = 2;

/// UTF-8 text message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Message for Text {
    fn service_id(&self) -> u8 {
        DEMO_SERVICE
    }

    fn message_id(&self) -> u8 {
        TEXT_MESSAGE
    }

    fn binary_size(&self) -> usize {
        self.text.len()
    }

    fn marshal(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self.text.as_bytes());
    }

    fn unmarshal(&mut self, buf: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(buf)
            .map_err(|err| CodecError::malformed(format!("text is not UTF-8: {err}")))?;
        self.text.clear();
        self.text.push_str(text);
        Ok(())
    }
}

/// Opaque byte message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Raw {
    pub data: Vec<u8>,
}

impl Raw {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl Message for Raw {
    fn service_id(&self) -> u8 {
        DEMO_SERVICE
    }

    fn message_id(&self) -> u8 {
        RAW_MESSAGE
    }

    fn binary_size(&self) -> usize {
        self.data.len()
    }

    fn marshal(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.data);
    }

    fn unmarshal(&mut self, buf: &[u8]) -> Result<()> {
        self.data.clear();
        self.data.extend_from_slice(buf);
        Ok(())
    }
}

/// Build the demo service with one handler per message.
pub fn demo_service<C, T, R>(on_text: T, on_raw: R) -> ServiceTable<C>
where
    C: 'static,
    T: Fn(&mut C, Text) + Send + Sync + 'static,
    R: Fn(&mut C, Raw) + Send + Sync + 'static,
{
    ServiceTable::new(DEMO_SERVICE)
        .route::<Text, T>(on_text)
        .route::<Raw, R>(on_raw)
}
