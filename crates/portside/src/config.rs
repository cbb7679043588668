//! Per-process runtime options
//!
//! The host supplies everything needed to derive socket addresses through
//! its start commands, so there is no file-based configuration here — just
//! the knobs the process fixes once at startup.

use crate::channel::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by every channel the plugin process opens.
///
/// The dial/listen asymmetry reflects which side is expected to be ready
/// first: the host binds the control socket and the source pull sockets
/// before spawning the plugin, so dialing those gets a generous budget;
/// the plugin binds its sink sockets before the host pushes, so listening
/// gets a short one.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Directory holding every derived socket path.
    pub base_dir: PathBuf,
    /// Deadline for one send on a data channel.
    pub send_timeout: Duration,
    /// Optional bounded receive on control conversations. Elapsing is not an
    /// error; the loop logs and keeps waiting.
    pub recv_timeout: Option<Duration>,
    /// Budget for dialing control and function sockets.
    pub control_dial: RetryPolicy,
    /// Budget for dialing source data sockets.
    pub data_dial: RetryPolicy,
    /// Budget for binding sink data sockets.
    pub data_listen: RetryPolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir(),
            send_timeout: Duration::from_secs(1),
            recv_timeout: None,
            control_dial: RetryPolicy::CONTROL_DIAL,
            data_dial: RetryPolicy::DATA_DIAL,
            data_listen: RetryPolicy::DATA_LISTEN,
        }
    }
}

impl RuntimeOptions {
    /// Options rooted at a specific socket directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}
