//! Test fixtures: a real server on a loopback port with throwaway storage.

use std::net::SocketAddr;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use nexusd::capture::CaptureManager;
use nexusd::config::Config;
use nexusd::server::Server;

pub const TEST_KEY: &str = "integration-test-key";

/// A running daemon bound to an ephemeral loopback port. Storage roots live
/// in a temporary directory that is removed when the fixture drops.
pub struct TestDaemon {
    pub addr: SocketAddr,
    pub capture: Arc<CaptureManager>,
    shutdown: CancellationToken,
    _storage: TempDir,
}

impl TestDaemon {
    pub async fn start() -> Self {
        let storage = TempDir::new().expect("Failed to create temp storage");
        let config = Config {
            api_key: TEST_KEY.to_string(),
            port: 0,
            storage_root: Some(storage.path().display().to_string()),
            ..Config::default()
        };
        config.ensure_dirs().expect("Failed to create storage dirs");

        let capture = Arc::new(CaptureManager::new());
        let server = Server::bind(config, capture.clone())
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr().expect("No local addr");

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = server.run(token).await;
        });

        Self {
            addr,
            capture,
            shutdown,
            _storage: storage,
        }
    }

    /// Send one raw line and read one response line.
    pub async fn request_raw(&self, line: &str) -> serde_json::Value {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect");
        stream
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("Failed to write request");

        let (read_half, _write_half) = stream.split();
        let mut lines = BufReader::new(read_half).lines();
        let line = lines
            .next_line()
            .await
            .expect("Failed to read response")
            .expect("Connection closed without response");
        serde_json::from_str(&line).expect("Response was not JSON")
    }

    /// Send one action carrying the fixture's API key.
    pub async fn request(&self, mut body: serde_json::Value) -> serde_json::Value {
        body.as_object_mut()
            .expect("Request body must be an object")
            .insert("api_key".to_string(), TEST_KEY.into());
        self.request_raw(&body.to_string()).await
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
