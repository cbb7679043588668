//! Control channel: the request/reply conversation with the host
//!
//! One control channel multiplexes every start/stop command for a plugin
//! process; function symbols open a second one of their own for
//! validate/exec traffic. Both roles dial a derived address and announce
//! themselves with a fixed handshake frame.
//!
//! The conversation is strict request/reply: the serve loop performs exactly
//! one send per received request. A bounded receive timeout only logs and
//! keeps waiting — after a timeout nothing was consumed, so nothing is sent,
//! and the pairing is preserved. Breaking that pairing desynchronizes the
//! host's view of the conversation.

use crate::channel::framed::{read_frame, write_frame};
use crate::channel::retry::{dial_retry, RetryPolicy};
use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use portside_protocol::HANDSHAKE;

/// A dialed request/reply socket, plus the token that stops its serve loop.
pub struct ControlChannel {
    stream: UnixStream,
    path: PathBuf,
    cancel: CancellationToken,
    recv_timeout: Option<Duration>,
}

impl ControlChannel {
    /// Dial the control socket at `path` with retry.
    pub async fn open(
        path: &Path,
        policy: RetryPolicy,
        recv_timeout: Option<Duration>,
    ) -> Result<Self> {
        let stream = dial_retry(path, policy).await?;
        Ok(Self {
            stream,
            path: path.to_path_buf(),
            cancel: CancellationToken::new(),
            recv_timeout,
        })
    }

    /// Token that makes [`run`](Self::run) exit silently. Cancelling it is
    /// the only way to stop the loop without an "unexpected" classification.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve the request/reply conversation until cancelled or failed.
    ///
    /// Sends the handshake frame first, then loops: receive one request,
    /// invoke `handler`, send its reply. The handler is infallible by
    /// construction — dispatch errors are rendered into diagnostic reply
    /// bytes before they reach this loop.
    ///
    /// Returns `Ok(())` both on cancellation and when the channel closes
    /// after cancellation; any other failure is returned for the owner to
    /// log as unexpected.
    pub async fn run<F, Fut>(mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(Bytes) -> Fut,
        Fut: Future<Output = Vec<u8>>,
    {
        write_frame(&mut self.stream, HANDSHAKE).await?;
        debug!("control channel at {} handshake sent", self.path.display());

        loop {
            let request = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("control channel at {} stopped", self.path.display());
                    return Ok(());
                }
                received = Self::recv_request(&mut self.stream, self.recv_timeout) => {
                    match received {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            // recv timeout: nothing consumed, nothing sent
                            warn!(
                                "control channel at {} receive timed out, still waiting",
                                self.path.display()
                            );
                            continue;
                        }
                        Err(e) if self.cancel.is_cancelled() => {
                            debug!(
                                "control channel at {} closed during stop: {}",
                                self.path.display(),
                                e
                            );
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            let reply = handler(request).await;

            if let Err(e) = write_frame(&mut self.stream, &reply).await {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                return Err(e);
            }
        }
    }

    async fn recv_request(
        stream: &mut UnixStream,
        recv_timeout: Option<Duration>,
    ) -> Result<Option<Bytes>> {
        match recv_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, read_frame(stream)).await {
                Ok(result) => result.map(Some),
                Err(_elapsed) => Ok(None),
            },
            None => read_frame(stream).await.map(Some),
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portside_protocol::REPLY_OK;
    use tokio::net::UnixListener;

    async fn frame_write(stream: &mut UnixStream, payload: &[u8]) {
        write_frame(stream, payload).await.unwrap();
    }

    async fn frame_read(stream: &mut UnixStream) -> Bytes {
        read_frame(stream).await.unwrap()
    }

    #[tokio::test]
    async fn test_handshake_then_request_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let channel = ControlChannel::open(&path, RetryPolicy::new(5, Duration::from_millis(10)), None)
            .await
            .unwrap();
        let serve = tokio::spawn(channel.run(|req| async move {
            assert_eq!(&req[..], b"ping");
            REPLY_OK.as_bytes().to_vec()
        }));

        let (mut host, _) = listener.accept().await.unwrap();
        assert_eq!(&frame_read(&mut host).await[..], HANDSHAKE);

        frame_write(&mut host, b"ping").await;
        assert_eq!(&frame_read(&mut host).await[..], REPLY_OK.as_bytes());

        drop(host);
        // loop exits with an error because nothing cancelled it
        let result = serve.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_exits_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let channel = ControlChannel::open(&path, RetryPolicy::new(5, Duration::from_millis(10)), None)
            .await
            .unwrap();
        let cancel = channel.cancel_token();
        let serve = tokio::spawn(channel.run(|_req| async move { Vec::new() }));

        let (mut host, _) = listener.accept().await.unwrap();
        assert_eq!(&frame_read(&mut host).await[..], HANDSHAKE);

        cancel.cancel();
        let result = serve.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_recv_timeout_keeps_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let channel = ControlChannel::open(
            &path,
            RetryPolicy::new(5, Duration::from_millis(10)),
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        let serve = tokio::spawn(channel.run(|req| async move { req.to_vec() }));

        let (mut host, _) = listener.accept().await.unwrap();
        assert_eq!(&frame_read(&mut host).await[..], HANDSHAKE);

        // let several receive timeouts elapse before the first real request
        tokio::time::sleep(Duration::from_millis(100)).await;
        frame_write(&mut host, b"still-here").await;
        assert_eq!(&frame_read(&mut host).await[..], b"still-here");

        drop(host);
        let _ = serve.await.unwrap();
    }
}
