//! TCP command server for the daemon process.
//!
//! Each connection carries exactly one JSON command line and receives one
//! JSON response line before the daemon closes it.

use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use democast_core::error::ApiError;
use democast_core::protocol::{Command, RecordRequest, Response};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::daemon::recording::{options_from_json, RecordingSession};
use crate::daemon::scenario::{ScenarioContext, ScenarioSource};
use crate::input::{ElementLocator, InputEngine};

/// Maximum number of concurrent client connections to prevent resource exhaustion.
const MAX_CONNECTIONS: usize = 100;

/// Maximum request size in bytes.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// How long to wait for in-flight connections to complete during shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a command handler can reach.
///
/// One instance is owned by the server and shared with every connection.
pub struct DaemonContext {
    pub recorder: Arc<RecordingSession>,
    pub scenarios: Arc<dyn ScenarioSource>,
    pub input: Arc<InputEngine>,
    pub locator: Arc<dyn ElementLocator>,
}

impl DaemonContext {
    /// Run one `record` command to completion. Blocks.
    ///
    /// The scenario is loaded before recording starts, so a missing or broken
    /// scenario never touches the screencast service. Once started, the
    /// recording is stopped exactly once whatever the scenario does.
    pub fn record(&self, request: &RecordRequest) -> Result<Response, ApiError> {
        let scenario = self.scenarios.load(&request.scenario)?;
        let options = request
            .options
            .as_ref()
            .map(options_from_json)
            .unwrap_or_default();

        let active = self.recorder.begin(&request.output, &options)?;
        info!(
            "Recording scenario {} to {}",
            request.scenario,
            request.output.display()
        );
        thread::sleep(delay(request.pre_delay));

        let ctx = ScenarioContext {
            input: &self.input,
            locator: self.locator.as_ref(),
        };
        let outcome = scenario.run(&ctx).map_err(|e| {
            warn!("Scenario {} failed: {:#}", request.scenario, e);
            ApiError::scenario_failed(format!("{:#}", e))
        });
        if outcome.is_ok() {
            thread::sleep(delay(request.post_delay));
        }

        let stopped = active.finish();
        outcome?;
        stopped?;
        Ok(Response::recorded(request.output.display().to_string()))
    }

    /// Scenario names for `list_scenarios`.
    pub fn list_scenarios(&self) -> Result<Response, ApiError> {
        Ok(Response::scenarios(self.scenarios.list()?))
    }

    /// Best-effort stop of a recording left running at shutdown.
    pub fn stop_active_recording(&self) {
        if !self.recorder.is_recording() {
            return;
        }
        info!("Stopping active recording before exit");
        if let Err(e) = self.recorder.stop() {
            warn!("Failed to stop recording on shutdown: {}", e);
        }
    }
}

fn delay(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or_default()
}

/// The daemon server that listens for client connections.
pub struct DaemonServer {
    listener: TcpListener,
    ctx: Arc<DaemonContext>,
    /// Semaphore to limit concurrent connections and prevent resource exhaustion.
    connection_semaphore: Arc<Semaphore>,
    shutdown: Notify,
}

impl DaemonServer {
    /// Bind the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs, ctx: DaemonContext) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind command port")?;
        info!("Daemon listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Notify::new(),
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> Arc<DaemonContext> {
        self.ctx.clone()
    }

    /// Serve until `signal` completes, then drain in-flight connections.
    ///
    /// Returns early only if the accept loop itself fails.
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let run = self.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = signal => {}
        }

        // notify_one keeps a permit if the accept loop is between iterations
        self.shutdown.notify_one();
        run.await
    }

    /// Accept connections until shutdown is signaled.
    ///
    /// On shutdown, waits for in-flight connections to complete (with timeout).
    pub(crate) async fn run(&self) -> Result<()> {
        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting {}",
                                        MAX_CONNECTIONS, peer
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted connection from {}", peer);
                            let ctx = self.ctx.clone();
                            connection_tasks.spawn(async move {
                                // Permit is held for the lifetime of the connection handler
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, ctx).await {
                                    error!("Connection error from {}: {:#}", peer, e);
                                }
                                debug!("Closed connection from {}", peer);
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                // Reap completed connection tasks to prevent unbounded growth
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {}
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received, waiting for in-flight connections");
                    break;
                }
            }
        }

        if !connection_tasks.is_empty() {
            info!(
                "Waiting for {} in-flight connection(s) to complete",
                connection_tasks.len()
            );

            let drained = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, async {
                while connection_tasks.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} connection(s)",
                    GRACEFUL_SHUTDOWN_TIMEOUT,
                    connection_tasks.len()
                );
                connection_tasks.abort_all();
            }
        }

        Ok(())
    }
}

/// Why a request line could not be read.
#[derive(Debug, Error)]
enum RequestError {
    #[error("Request too large: exceeded {0} byte limit")]
    TooLarge(usize),

    #[error("Invalid UTF-8 in request")]
    InvalidUtf8,

    #[error("Failed to read from client: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a line with a maximum size limit to prevent memory DoS.
///
/// Returns the number of bytes read (0 means EOF before any data).
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_size: usize,
) -> Result<usize, RequestError> {
    use tokio::io::AsyncBufReadExt;

    let mut bytes = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }

        let newline_pos = available.iter().position(|&b| b == b'\n');
        let bytes_to_consume = newline_pos.map(|p| p + 1).unwrap_or(available.len());

        if bytes.len() + bytes_to_consume > max_size {
            return Err(RequestError::TooLarge(max_size));
        }

        // Validate UTF-8 once at the end; a chunk may split a character
        bytes.extend_from_slice(&available[..bytes_to_consume]);
        reader.consume(bytes_to_consume);

        if newline_pos.is_some() {
            break;
        }
    }

    let line = std::str::from_utf8(&bytes).map_err(|_| RequestError::InvalidUtf8)?;
    buf.push_str(line);
    Ok(bytes.len())
}

/// Handle a single client connection: one request, one response.
async fn handle_connection(stream: TcpStream, ctx: Arc<DaemonContext>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let response = match read_line_bounded(&mut reader, &mut line, MAX_REQUEST_SIZE).await {
        Ok(0) => {
            debug!("Client disconnected without a request");
            return Ok(());
        }
        Ok(n) => {
            debug!("Received: {} bytes", n);
            handle_request(&line, ctx).await
        }
        Err(RequestError::Io(e)) => return Err(e).context("Failed to read request"),
        Err(e) => {
            warn!("Rejecting request: {}", e);
            Response::error(&ApiError::invalid_request(e.to_string()))
        }
    };

    let response_json = serde_json::to_string(&response).context("Failed to serialize response")?;
    debug!("Sending: {}", response_json);

    writer
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush")?;
    writer.shutdown().await.context("Failed to close connection")?;

    Ok(())
}

/// Parse and dispatch one request line.
async fn handle_request(line: &str, ctx: Arc<DaemonContext>) -> Response {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            warn!("Invalid request: {}", e);
            return Response::error(&e);
        }
    };

    let action = command.action();
    info!("Handling command: {}", action);

    let result = match command {
        Command::Ping => Ok(Response::pong()),
        Command::ListScenarios => run_blocking(ctx, |ctx| ctx.list_scenarios()).await,
        Command::Record(request) => run_blocking(ctx, move |ctx| ctx.record(&request)).await,
    };

    result.unwrap_or_else(|e| {
        warn!("Command {} failed: {}", action, e);
        Response::error(&e)
    })
}

/// Run a blocking handler off the async workers.
///
/// A panicking handler becomes an internal error; any recording it started
/// has already been stopped while unwinding.
async fn run_blocking<F>(ctx: Arc<DaemonContext>, f: F) -> Result<Response, ApiError>
where
    F: FnOnce(&DaemonContext) -> Result<Response, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&ctx))
        .await
        .map_err(|e| ApiError::internal(format!("Command handler failed: {}", e)))?
}
