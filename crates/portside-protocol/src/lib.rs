//! portside-protocol - Wire types and addressing for the Portside plugin protocol
//!
//! A Portside plugin is a separate process that the host engine spawns and
//! drives over local Unix-domain sockets. This crate defines everything both
//! ends must agree on:
//!
//! - the control conversation ([`Command`], [`ControlRequest`], reply
//!   literals) carrying start/stop commands for plugin symbols,
//! - the function conversation ([`FuncData`], [`FuncMeta`], [`FuncReply`])
//!   carrying validate/exec/is-aggregate calls for function symbols,
//! - the data envelope ([`DataEnvelope`]) carrying tuples and errors on the
//!   unidirectional source/sink channels,
//! - the socket address scheme and instance-key derivation ([`endpoint`]).
//!
//! All frames are JSON. The runtime crate (`portside`) owns the transport;
//! this crate is pure types so the host side can depend on it as well.

pub mod command;
pub mod endpoint;
pub mod error;

pub use command::{
    Cmd, Command, ControlRequest, DataEnvelope, FuncData, FuncMeta, FuncReply, Meta, PluginType,
    HANDSHAKE, REPLY_OK,
};
pub use endpoint::{
    control_socket, data_socket, function_key, function_socket, instance_key,
};
pub use error::{ProtocolError, Result};
