//! Function capability trait

use crate::context::InstanceContext;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A function answers validate/exec/is-aggregate invocations over the
/// function symbol's own control conversation.
///
/// One function symbol is a process-wide singleton serving every call site;
/// the runtime caches one [`InstanceContext`] per call site and passes the
/// matching one to `exec`.
#[async_trait]
pub trait Function: Send + Sync {
    /// Check an argument list for validity without executing.
    async fn validate(&self, args: &[Value]) -> Result<()>;

    /// Execute with the given arguments. Errors are returned to the host as
    /// a failed reply; they do not stop the symbol.
    async fn exec(&self, args: &[Value], ctx: Arc<InstanceContext>) -> Result<Value>;

    /// Whether this function aggregates over groups of tuples.
    fn is_aggregate(&self) -> bool;
}

/// Factory for function instances, registered under a symbol name.
pub trait FunctionFactory: Send + Sync {
    fn create(&self) -> Box<dyn Function>;
}

impl<F> FunctionFactory for F
where
    F: Fn() -> Box<dyn Function> + Send + Sync,
{
    fn create(&self) -> Box<dyn Function> {
        self()
    }
}
