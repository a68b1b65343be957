use std::time::Duration;

use cebridge_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use cebridge_transport::{DEFAULT_CHANNEL_NAME, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};

use crate::error::{RelayError, Result};

/// Remote relay server host.
pub const ENV_REMOTE_HOST: &str = "CE_REMOTE_HOST";
/// Remote relay server port.
pub const ENV_REMOTE_PORT: &str = "CE_REMOTE_PORT";

/// Default client target.
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";
/// Default server bind address (all interfaces).
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
/// Connection attempts per call, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Relay client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Per-read/per-write timeout once connected. `None` blocks forever.
    pub io_timeout: Option<Duration>,
    pub max_attempts: u32,
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REMOTE_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Read `CE_REMOTE_HOST` / `CE_REMOTE_PORT`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_REMOTE_HOST).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup(ENV_REMOTE_PORT) {
            config.port = parse_port(ENV_REMOTE_PORT, &port)?;
        }
        Ok(config)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// `host:port` as shown in logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.io_timeout,
            write_timeout: self.io_timeout,
        }
    }
}

/// Relay server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    /// Local channel name or path.
    pub channel: String,
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_PORT,
            channel: DEFAULT_CHANNEL_NAME.to_string(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_host: impl Into<String>, bind_port: u16) -> Self {
        Self {
            bind_host: bind_host.into(),
            bind_port,
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            ..FrameConfig::default()
        }
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|e| RelayError::Config(format!("{key}={raw:?}: {e}")))
}
