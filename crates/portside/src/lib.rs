//! portside - Plugin runtime for out-of-process stream operators
//!
//! This crate provides both the SDK (traits for building plugin symbols) and
//! the runtime (channels and lifecycle engine) that lets a plugin process
//! serve sources, sinks and functions to a host stream-processing engine
//! over local Unix-domain sockets.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     host engine process                    │
//! │   start/stop commands        tuples          func calls    │
//! └───────┬──────────────────────┬────────────────────┬────────┘
//!         │ control socket       │ data sockets       │ func sockets
//! ┌───────┴──────────────────────┴────────────────────┴────────┐
//! │                   plugin process (portside)                │
//! │  PluginRuntime ── SymbolRegistry ── Source/Sink/Function   │
//! │                                        runtimes            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use portside::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let spec = PluginSpec::new("mirror")
//!         .with_source("random", Arc::new(|| Box::new(RandomSource::default()) as Box<dyn Source>))
//!         .with_sink("print", Arc::new(|| Box::new(PrintSink::default()) as Box<dyn Sink>));
//!
//!     let runtime = PluginRuntime::new(spec, RuntimeOptions::default());
//!     runtime.start().await?;
//!     runtime.wait().await;
//!     Ok(())
//! }
//! ```

// SDK traits and the registration table
pub mod traits;

// Runtime modules
pub mod channel;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod registry;
pub mod runtime;

// Re-export the wire types so plugin binaries need only one dependency
pub use portside_protocol as protocol;

pub use channel::{ControlChannel, InboundChannel, OutboundChannel};
pub use config::RuntimeOptions;
pub use context::InstanceContext;
pub use controller::PluginRuntime;
pub use error::{PluginError, Result};
pub use registry::SymbolRegistry;
pub use runtime::RunningSymbol;
pub use traits::{
    Function, FunctionFactory, PluginSpec, Sink, SinkFactory, Source, SourceFactory,
};

/// One-stop imports for plugin binaries.
pub mod prelude {
    pub use crate::config::RuntimeOptions;
    pub use crate::context::InstanceContext;
    pub use crate::controller::PluginRuntime;
    pub use crate::error::{PluginError, Result};
    pub use crate::traits::{
        Function, FunctionFactory, PluginSpec, Sink, SinkFactory, Source, SourceFactory,
    };
    pub use async_trait::async_trait;
    pub use serde_json::Value as JsonValue;
    pub use std::sync::Arc;
}
