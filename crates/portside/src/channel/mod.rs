//! Socket channels between the plugin process and the host
//!
//! Three channel kinds, all JSON frames over Unix-domain sockets with a
//! 4-byte big-endian length prefix:
//!
//! - [`ControlChannel`] — bidirectional request/reply, one per plugin
//!   process (start/stop commands) or per function symbol (validate/exec).
//!   Always dials; the host binds first.
//! - [`OutboundChannel`] — unidirectional plugin→host, used by sources to
//!   emit tuples and errors. Dials; the host is already listening.
//! - [`InboundChannel`] — unidirectional host→plugin, used by sinks to
//!   receive tuples. Binds and accepts; the plugin is ready first.
//!
//! Connect and bind both go through bounded-retry with a fixed interval
//! ([`RetryPolicy`]) because process start ordering is not serialized by
//! the host.

mod control;
mod data;
mod framed;
mod retry;

pub use control::ControlChannel;
pub use data::{InboundChannel, OutboundChannel};
pub use framed::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use retry::{dial_retry, listen_retry, RetryPolicy};
