//! Source capability trait

use crate::context::InstanceContext;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A source reads from an external system and emits tuples through its
/// [`InstanceContext`].
///
/// Lifecycle guarantees from the runtime: `configure` is called exactly once
/// before `open`; `close` is called exactly once during shutdown. `open` is
/// expected to run until the source has no more data or its emit fails
/// because the channel was closed out from under it — that failure is the
/// stop signal.
///
/// # Example
///
/// ```rust,ignore
/// use portside::prelude::*;
///
/// struct CounterSource { limit: u64 }
///
/// #[async_trait]
/// impl Source for CounterSource {
///     async fn configure(&mut self, _datasource: Option<&str>, config: &JsonValue) -> Result<()> {
///         self.limit = config.get("limit").and_then(|v| v.as_u64()).unwrap_or(10);
///         Ok(())
///     }
///
///     async fn open(&mut self, ctx: Arc<InstanceContext>) -> Result<()> {
///         for i in 0..self.limit {
///             ctx.emit(serde_json::json!({"count": i}), JsonValue::Null).await?;
///         }
///         Ok(())
///     }
///
///     async fn close(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Apply the start command's datasource and configuration. Called once,
    /// before `open`; failing here aborts the start and is replied to the
    /// host as a diagnostic.
    async fn configure(&mut self, datasource: Option<&str>, config: &Value) -> Result<()>;

    /// Produce data until exhausted or interrupted, emitting through `ctx`.
    async fn open(&mut self, ctx: Arc<InstanceContext>) -> Result<()>;

    /// Release resources. Called exactly once during shutdown.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for source instances, registered under a symbol name.
pub trait SourceFactory: Send + Sync {
    fn create(&self) -> Box<dyn Source>;
}

impl<F> SourceFactory for F
where
    F: Fn() -> Box<dyn Source> + Send + Sync,
{
    fn create(&self) -> Box<dyn Source> {
        self()
    }
}
