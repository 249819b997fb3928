//! Unix socket channel to the resident daemon
//!
//! Speaks newline-delimited JSON over the daemon's Unix socket. Each
//! exchange opens a fresh connection, sends one request frame and reads
//! one reply frame; the whole exchange runs under a single timeout.

use crate::channel::{DaemonChannel, DaemonReply, DaemonRequest};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

/// Default socket path of the resident daemon
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/socklrs";

/// Default per-exchange timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Channel over the daemon's Unix socket
#[derive(Debug, Clone)]
pub struct SocketChannel {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketChannel {
    pub fn new(socket_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn exchange(&self, request: &DaemonRequest) -> Result<DaemonReply> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| {
                Error::Communication(format!(
                    "cannot connect to daemon socket {}: {}",
                    self.socket_path.display(),
                    e
                ))
            })?;
        let (read_half, mut write_half) = stream.into_split();

        let mut frame = serde_json::to_vec(request)?;
        frame.push(b'\n');
        write_half.write_all(&frame).await.map_err(|e| {
            Error::Communication(format!("cannot send {} request: {}", request.op_name(), e))
        })?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.map_err(|e| {
            Error::Communication(format!("cannot read {} reply: {}", request.op_name(), e))
        })?;
        if n == 0 {
            return Err(Error::Communication(format!(
                "daemon closed the connection during {}",
                request.op_name()
            )));
        }

        trace!("daemon reply frame: {}", line.trim_end());
        let reply: DaemonReply = serde_json::from_str(line.trim_end()).map_err(|e| {
            Error::Communication(format!("cannot decode daemon reply: {}", e))
        })?;
        Ok(reply)
    }
}

#[async_trait]
impl DaemonChannel for SocketChannel {
    async fn send_request(&self, request: DaemonRequest) -> Result<DaemonReply> {
        debug!(
            "sending {} request to {}",
            request.op_name(),
            self.socket_path.display()
        );
        match tokio::time::timeout(self.timeout, self.exchange(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Communication(format!(
                "{} request timed out after {:?}",
                request.op_name(),
                self.timeout
            ))),
        }
    }

    async fn is_daemon_online(&self) -> bool {
        matches!(
            self.send_request(DaemonRequest::Ping).await,
            Ok(reply) if reply.status == super::STATUS_OK
        )
    }
}
