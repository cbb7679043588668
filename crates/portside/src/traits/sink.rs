//! Sink capability trait

use crate::context::InstanceContext;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

/// A sink writes tuples received from the host to an external system.
///
/// Lifecycle guarantees from the runtime: `configure` is called exactly once
/// before `open`; `collect` is invoked once per received message while the
/// instance is running; `close` is called exactly once during shutdown.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Apply the start command's configuration. Called once, before `open`.
    async fn configure(&mut self, config: &Value) -> Result<()>;

    /// Prepare for writing (open connections, files). Called once after the
    /// inbound channel is bound.
    async fn open(&mut self, ctx: Arc<InstanceContext>) -> Result<()>;

    /// Write one received payload. The payload is the raw message body; its
    /// shape is an agreement between the host and the sink. A failure here
    /// stops the instance.
    async fn collect(&mut self, ctx: &InstanceContext, data: Bytes) -> Result<()>;

    /// Release resources. Called exactly once during shutdown.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for sink instances, registered under a symbol name.
pub trait SinkFactory: Send + Sync {
    fn create(&self) -> Box<dyn Sink>;
}

impl<F> SinkFactory for F
where
    F: Fn() -> Box<dyn Sink> + Send + Sync,
{
    fn create(&self) -> Box<dyn Sink> {
        self()
    }
}
