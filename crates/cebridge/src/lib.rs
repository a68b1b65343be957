//! Framed request/response relay from a tool-calling client to a remote
//! instrument.
//!
//! cebridge carries structured commands (memory reads and writes, scans,
//! disassembly) from a tool-calling process to a debugger-like instrument on
//! another machine: client → TCP → relay server → local channel → instrument.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and local-channel transports (UDS, named pipes)
//! - [`frame`]: Length-prefixed envelope framing with a payload cap
//! - [`relay`]: Relay client with retry/reconnect, thread-per-session server
//! - [`tools`]: The command surface exposed to the calling framework

/// Re-export transport types.
pub mod transport {
    pub use cebridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cebridge_frame::*;
}

/// Re-export relay types.
pub mod relay {
    pub use cebridge_relay::*;
}

/// Re-export command surface types.
pub mod tools {
    pub use cebridge_tools::*;
}

pub use cebridge_relay::{ClientConfig, RelayClient, RelayError, RelayServer, ServerConfig};
pub use cebridge_tools::CommandSurface;
