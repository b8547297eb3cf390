//! Client for sending commands to a running daemon.

use std::io::ErrorKind;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use democast_core::protocol::{Command, Response, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Default time to wait for a response. Recordings can take minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long to wait for the TCP connection itself.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for communicating with the daemon.
///
/// Every command uses its own connection, matching the daemon's
/// one-request-per-connection protocol.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

impl DaemonClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<TcpStream> {
        let address = self.address();
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => bail!(
                "Connection refused by {} (is 'democast daemon' running in the guest?)",
                address
            ),
            Ok(Err(e)) => Err(e).with_context(|| format!("Failed to connect to {}", address)),
            Err(_) => bail!(
                "Timed out connecting to {} after {:?}",
                address,
                CONNECT_TIMEOUT
            ),
        }
    }

    /// Send one command and wait for its response.
    pub async fn send(&self, command: &Command) -> Result<Response> {
        let mut stream = self.connect().await?;

        let request_json = serde_json::to_string(command).context("Failed to serialize request")?;
        debug!("Sending: {}", request_json);

        stream
            .write_all(request_json.as_bytes())
            .await
            .context("Failed to write request")?;
        stream
            .write_all(b"\n")
            .await
            .context("Failed to write newline")?;
        stream.flush().await.context("Failed to flush")?;

        let (reader, _writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut response_line = String::new();

        let bytes_read = match timeout(self.timeout, reader.read_line(&mut response_line)).await {
            Ok(read) => read.context("Failed to read response")?,
            Err(_) => bail!(
                "Timed out after {:?} waiting for '{}' response from {}",
                self.timeout,
                command.action(),
                self.address()
            ),
        };

        if bytes_read == 0 {
            bail!("Daemon closed connection without a response");
        }

        debug!("Received: {}", response_line.trim());

        serde_json::from_str(&response_line).context("Failed to parse response")
    }
}
