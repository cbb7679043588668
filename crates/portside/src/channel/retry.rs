//! Bounded-retry connect and bind
//!
//! Both operations race the host: the plugin may come up before the host has
//! bound its end, and the host may push before the plugin has bound its end.
//! Every attempt failure sleeps a fixed interval and decrements the budget;
//! the last underlying error is surfaced once the budget is exhausted.

use crate::error::{PluginError, Result};
use std::path::Path;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

/// Attempt budget and fixed backoff interval for one connect/bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// Control sockets are bound by the host before it spawns the plugin,
    /// but spawn ordering is not guaranteed, so dialing waits the longest.
    pub const CONTROL_DIAL: Self = Self {
        max_attempts: 50,
        interval: Duration::from_millis(100),
    };

    /// Source data sockets: the host listens as part of starting the rule.
    pub const DATA_DIAL: Self = Self {
        max_attempts: 10,
        interval: Duration::from_millis(50),
    };

    /// Sink data sockets: the plugin binds before the host connects.
    pub const DATA_LISTEN: Self = Self {
        max_attempts: 10,
        interval: Duration::from_millis(50),
    };

    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Connect to `path`, retrying under `policy`.
pub async fn dial_retry(path: &Path, policy: RetryPolicy) -> Result<UnixStream> {
    let mut last_err = None;
    for attempt in 1..=policy.max_attempts {
        match UnixStream::connect(path).await {
            Ok(stream) => {
                debug!("dialed {} after {} attempts", path.display(), attempt);
                return Ok(stream);
            }
            Err(e) => {
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    Err(exhausted("dial", path, policy, last_err))
}

/// Bind a listener at `path`, retrying under `policy`.
///
/// A stale socket file left by a crashed previous instance would make every
/// bind fail, so an address-in-use whose socket accepts no connections is
/// unlinked and retried without consuming an attempt.
pub async fn listen_retry(path: &Path, policy: RetryPolicy) -> Result<UnixListener> {
    let mut last_err = None;
    for attempt in 1..=policy.max_attempts {
        match UnixListener::bind(path) {
            Ok(listener) => {
                debug!("listening at {} after {} attempts", path.display(), attempt);
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && is_stale(path) => {
                debug!("removing stale socket at {}", path.display());
                let _ = std::fs::remove_file(path);
                match UnixListener::bind(path) {
                    Ok(listener) => return Ok(listener),
                    Err(e) => last_err = Some(e),
                }
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
            Err(e) => {
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    Err(exhausted("listen", path, policy, last_err))
}

/// A path is stale when nothing accepts connections on it.
fn is_stale(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_err()
}

fn exhausted(
    op: &str,
    path: &Path,
    policy: RetryPolicy,
    last_err: Option<std::io::Error>,
) -> PluginError {
    PluginError::connection(format!(
        "can't {} {} after {} attempts: {}",
        op,
        path.display(),
        policy.max_attempts,
        last_err.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
    ))
}
