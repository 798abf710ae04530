//! Binary message framing and dispatch over byte streams.
//!
//! fastlink frames typed messages with a 4-byte header (length, service,
//! message), dispatches decoded frames to per-message handlers and keeps
//! allocation down with pooled buffers.
//!
//! # Crate Structure
//!
//! - [`codec`]: Frame encoder/decoder, service registry and pools
//! - [`demo`]: A two-message demo service used by the CLI

/// Re-export codec types.
pub mod codec {
    pub use fastlink_codec::*;
}

pub mod demo;
