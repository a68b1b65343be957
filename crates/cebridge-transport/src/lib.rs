//! Transports for the cebridge relay.
//!
//! Two hops carry the same framed messages:
//! - TCP between the tool-calling machine and the instrument host
//! - A local channel from the relay server into the instrument
//!   (Unix domain socket on Unix, named pipe on Windows)
//!
//! This is the lowest layer of cebridge. Everything else builds on top of
//! the [`TcpRelayListener`], [`connect_tcp`] and [`LocalChannel`] types
//! provided here.

pub mod channel;
pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod pipe;

#[cfg(feature = "async")]
pub mod async_io;

pub use channel::{LocalChannel, DEFAULT_CHANNEL_NAME};
pub use error::{Result, TransportError};
pub use stream::ChannelStream;
pub use tcp::{connect_tcp, TcpRelayListener, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
