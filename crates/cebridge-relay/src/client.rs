use std::net::TcpStream;
use std::sync::{Arc, Mutex, PoisonError};

use cebridge_frame::{EnvelopeReader, EnvelopeWriter};
use cebridge_transport::connect_tcp;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{RelayError, Result};
use crate::message::{Reply, Request, RequestIds};

/// Issues framed requests to a relay server.
///
/// Holds at most one connection and one in-flight request. A failed
/// exchange drops the connection; the next attempt reconnects from scratch.
pub struct RelayClient {
    config: ClientConfig,
    connection: Option<TcpStream>,
    ids: RequestIds,
}

impl RelayClient {
    /// Create a client. No connection is made until the first call.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            ids: RequestIds::new(),
        }
    }

    /// Create a client configured from `CE_REMOTE_HOST` / `CE_REMOTE_PORT`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drop the current connection, if any.
    pub fn close(&mut self) {
        if let Some(stream) = self.connection.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!(endpoint = %self.config.endpoint(), "connection closed");
        }
    }

    /// Invoke `method` and return the caller-facing value.
    ///
    /// A remote `{"error": ...}` is a value (`{"success": false, ...}`), not
    /// an `Err`. `Err` means the relay itself failed.
    pub fn call(&mut self, method: &str, params: Map<String, Value>) -> Result<Value> {
        self.call_reply(method, params).map(Reply::into_value)
    }

    /// Invoke `method`, retrying transport failures up to the attempt budget.
    pub fn call_reply(&mut self, method: &str, params: Map<String, Value>) -> Result<Reply> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.try_call(method, &params) {
                Ok(reply) => return Ok(reply),
                Err(err) => err,
            };
            self.close();

            if !err.is_retryable() {
                warn!(method, attempt, error = %err, "relay call aborted");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(method, attempt, error = %err, "relay server unreachable");
                return Err(RelayError::Unreachable {
                    endpoint: self.config.endpoint(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            warn!(method, attempt, error = %err, "relay call failed, reconnecting");
        }
    }

    /// One attempt: connect if needed, send the request, read the response.
    ///
    /// The connection is left in place on error; callers decide whether to
    /// close it.
    pub fn try_call(&mut self, method: &str, params: &Map<String, Value>) -> Result<Reply> {
        let id = self.ids.next_id();
        let body = Request::new(method, params.clone(), id).to_body()?;
        let frame_config = self.config.frame_config();

        let stream = self.ensure_connected()?;
        EnvelopeWriter::with_config(&mut *stream, frame_config.clone()).send(&body)?;
        let response = EnvelopeReader::with_config(&mut *stream, frame_config).read_envelope()?;

        debug!(method, id, len = response.len(), "received response");
        Ok(Reply::parse(response.body())?)
    }

    fn ensure_connected(&mut self) -> Result<&mut TcpStream> {
        let stream = match self.connection.take() {
            Some(stream) => stream,
            None => self.open()?,
        };
        Ok(self.connection.insert(stream))
    }

    fn open(&self) -> Result<TcpStream> {
        let stream = connect_tcp(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout,
        )?;
        self.config.frame_config().apply_timeouts(&stream)?;
        info!(endpoint = %self.config.endpoint(), "connected to relay server");
        Ok(stream)
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("endpoint", &self.config.endpoint())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// A [`RelayClient`] behind a mutex, for callers on several threads.
///
/// The lock spans the whole exchange, so requests and responses on the
/// shared connection strictly alternate.
#[derive(Clone, Debug)]
pub struct SharedRelayClient {
    inner: Arc<Mutex<RelayClient>>,
}

impl SharedRelayClient {
    pub fn new(client: RelayClient) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    pub fn call(&self, method: &str, params: Map<String, Value>) -> Result<Value> {
        self.lock().call(method, params)
    }

    pub fn call_reply(&self, method: &str, params: Map<String, Value>) -> Result<Reply> {
        self.lock().call_reply(method, params)
    }

    pub fn close(&self) {
        self.lock().close();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RelayClient> {
        // A panic mid-call leaves at worst a half-used connection, which the
        // next failing attempt replaces.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<RelayClient> for SharedRelayClient {
    fn from(client: RelayClient) -> Self {
        Self::new(client)
    }
}
