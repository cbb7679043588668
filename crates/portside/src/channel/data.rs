//! Unidirectional data channels for source and sink instances
//!
//! One channel instance per running source or sink, at an address derived
//! from `(ruleId, opId, instanceId)`. Closing a channel is the runtime's
//! only cancellation primitive: a blocked `recv` or `send` fails with
//! [`PluginError::ChannelClosed`] once `close` has run, and the serve loop
//! classifies that error against its running flag.

use crate::channel::framed::{read_frame, write_frame};
use crate::channel::retry::{dial_retry, listen_retry, RetryPolicy};
use crate::error::{PluginError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Plugin→host channel used by sources to emit tuples and errors.
/// Dials the host, which is expected to already be listening.
pub struct OutboundChannel {
    stream: Mutex<UnixStream>,
    path: PathBuf,
    closed: CancellationToken,
    send_timeout: Duration,
}

impl OutboundChannel {
    pub async fn open(path: &Path, policy: RetryPolicy, send_timeout: Duration) -> Result<Self> {
        let stream = dial_retry(path, policy).await?;
        Ok(Self {
            stream: Mutex::new(stream),
            path: path.to_path_buf(),
            closed: CancellationToken::new(),
            send_timeout,
        })
    }

    /// Write one message frame. No acknowledgement is expected.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(PluginError::ChannelClosed),
            written = tokio::time::timeout(self.send_timeout, write_frame(&mut *stream, payload)) => {
                match written {
                    Ok(result) => result,
                    Err(_elapsed) => Err(PluginError::Timeout(format!(
                        "send on {} exceeded {:?}",
                        self.path.display(),
                        self.send_timeout
                    ))),
                }
            }
        }
    }

    /// Release the channel. Any in-flight or later `send` fails with
    /// [`PluginError::ChannelClosed`]; the socket itself is released when
    /// the last reference drops.
    pub fn close(&self) {
        self.closed.cancel();
        debug!("outbound channel at {} closed", self.path.display());
    }
}

/// Host→plugin channel used by sinks to receive tuples to write.
/// Binds the derived address and accepts the host's single connection;
/// the plugin is expected to be ready before the host connects.
pub struct InboundChannel {
    stream: Mutex<UnixStream>,
    path: PathBuf,
    closed: CancellationToken,
}

impl InboundChannel {
    pub async fn open(path: &Path, policy: RetryPolicy) -> Result<Self> {
        let listener = listen_retry(path, policy).await?;
        let (stream, _addr) = listener.accept().await?;
        debug!("inbound channel at {} accepted host", path.display());
        Ok(Self {
            stream: Mutex::new(stream),
            path: path.to_path_buf(),
            closed: CancellationToken::new(),
        })
    }

    /// Block until one message arrives. Fails with
    /// [`PluginError::ChannelClosed`] once the channel is closed, locally
    /// or by the peer.
    pub async fn recv(&self) -> Result<Bytes> {
        let mut stream = self.stream.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(PluginError::ChannelClosed),
            frame = read_frame(&mut *stream) => frame,
        }
    }

    /// Release the channel and unlink its socket file. A blocked `recv`
    /// fails with [`PluginError::ChannelClosed`].
    pub fn close(&self) {
        self.closed.cancel();
        let _ = std::fs::remove_file(&self.path);
        debug!("inbound channel at {} closed", self.path.display());
    }
}

impl Drop for InboundChannel {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
