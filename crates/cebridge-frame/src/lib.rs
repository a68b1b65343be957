//! Length-prefixed envelope framing for the cebridge relay.
//!
//! Every hop (client ↔ relay server over TCP, relay server ↔ instrument over
//! the local channel) carries the same envelope:
//! - A 4-byte little-endian body length
//! - Exactly that many bytes of UTF-8 JSON
//!
//! The codec itself never caps lengths; readers and writers apply the
//! configured cap (16 MiB by default) before touching a body.

pub mod codec;
pub mod error;
pub mod reader;
pub mod timeouts;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    check_length, decode_envelope, decode_header, encode, encode_into, Envelope, FrameConfig,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::EnvelopeReader;
pub use timeouts::StreamTimeouts;
pub use writer::EnvelopeWriter;

#[cfg(feature = "async")]
pub use async_codec::EnvelopeCodec;
