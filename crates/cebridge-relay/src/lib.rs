//! Request/response relay between a tool-calling client and the instrument.
//!
//! This is the "just works" layer. [`RelayClient`] turns a method call into a
//! framed request with retry and reconnect; [`RelayServer`] accepts network
//! connections and pairs each with its own instrument handle.

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod message;
pub mod server;
pub mod session;

#[cfg(feature = "async")]
pub mod server_async;

pub use client::{RelayClient, SharedRelayClient};
pub use config::{
    ClientConfig, ServerConfig, DEFAULT_BIND_HOST, DEFAULT_MAX_ATTEMPTS, DEFAULT_REMOTE_HOST,
    ENV_REMOTE_HOST, ENV_REMOTE_PORT,
};
pub use connector::{FnConnector, InstrumentConnector};
pub use error::{RelayError, Result};
pub use message::{error_text, failure_value, Reply, Request, RequestIds, JSONRPC_VERSION};
pub use server::{serve, RelayServer, ShutdownHandle};
pub use session::{Session, SessionEnd, SessionSummary};

#[cfg(feature = "async")]
pub use server_async::{serve_async, AsyncInstrumentConnector, AsyncRelayServer};
