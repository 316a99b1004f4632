//! TCP control server speaking a line-delimited JSON protocol.
//!
//! Each connection carries one JSON request object per line and receives one
//! JSON response object per line, in order. Authentication is per request:
//! the shared secret is checked before the action is even parsed, so an
//! unauthorized caller learns nothing about the action vocabulary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::action::{Action, Response};
use crate::capture::CaptureManager;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::{nlog, nlog_debug, nlog_warn, Error, Result};

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    api_key: Arc<String>,
}

impl Server {
    /// Bind the control port. Port 0 asks the OS for a free port; the actual
    /// address is available from [`Server::local_addr`].
    pub async fn bind(config: Config, capture: Arc<CaptureManager>) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        let api_key = Arc::new(config.api_key.clone());
        let dispatcher = Arc::new(Dispatcher::new(config, capture));
        Ok(Self {
            listener,
            dispatcher,
            api_key,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the token is cancelled; each connection gets
    /// its own task and handles its requests sequentially.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        nlog!("Listening on {}", self.local_addr()?);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    nlog!("Shutdown requested, closing listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            nlog_debug!("Connection from {}", peer);
                            let dispatcher = self.dispatcher.clone();
                            let api_key = self.api_key.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, dispatcher, api_key, shutdown).await
                                {
                                    nlog_warn!("Connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => nlog_warn!("Accept failed: {}", e),
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    api_key: Arc<String>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            // Peer closed the connection
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(&line, &api_key) {
            Ok(action) => dispatcher.dispatch(action).await,
            Err(e) => Response::from(&e),
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        write_half.write_all(out.as_bytes()).await?;
    }
}

/// Validate the shared secret, then parse the action. The key check comes
/// first: a request with a bad key gets the uniform `Unauthorized` response
/// no matter how malformed the rest of it is.
fn parse_request(line: &str, api_key: &str) -> Result<Action> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| Error::InvalidAction(format!("Malformed request: {}", e)))?;

    let supplied = value.get("api_key").and_then(|v| v.as_str());
    if supplied != Some(api_key) {
        return Err(Error::Unauthorized);
    }

    serde_json::from_value(value).map_err(|e| Error::InvalidAction(e.to_string()))
}
