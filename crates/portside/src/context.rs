//! Per-instance context handed to user plugin code
//!
//! An [`InstanceContext`] carries the identity of one running operator
//! instance (rule, operator, instance) and, for sources, the bound outbound
//! channel used to emit. Function symbols get one context per call site,
//! cached by the function runtime and reused across invocations.

use crate::channel::OutboundChannel;
use crate::error::{PluginError, Result};
use portside_protocol::{DataEnvelope, Meta};
use serde_json::Value;
use std::sync::Arc;

/// Identity plus emit capability for one running instance.
#[derive(Clone)]
pub struct InstanceContext {
    meta: Meta,
    func_id: Option<i32>,
    outbound: Option<Arc<OutboundChannel>>,
}

impl InstanceContext {
    /// Context for a source instance, bound to its outbound channel.
    pub fn for_source(meta: Meta, outbound: Arc<OutboundChannel>) -> Self {
        Self {
            meta,
            func_id: None,
            outbound: Some(outbound),
        }
    }

    /// Context for a sink instance. Sinks receive data through the runtime,
    /// so the context carries identity only.
    pub fn for_sink(meta: Meta) -> Self {
        Self {
            meta,
            func_id: None,
            outbound: None,
        }
    }

    /// Context for one function call site.
    pub fn for_function(meta: Meta, func_id: i32) -> Self {
        Self {
            meta,
            func_id: Some(func_id),
            outbound: None,
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.meta.rule_id
    }

    pub fn op_id(&self) -> &str {
        &self.meta.op_id
    }

    pub fn instance_id(&self) -> i32 {
        self.meta.instance_id
    }

    /// Call-site id, present only on function contexts.
    pub fn func_id(&self) -> Option<i32> {
        self.func_id
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Emit one tuple onto the outbound channel as
    /// `{"message": <tuple>, "meta": <routing meta>}`.
    pub async fn emit(&self, message: Value, meta: Value) -> Result<()> {
        self.send(&DataEnvelope::Tuple { message, meta }).await
    }

    /// Emit an error onto the outbound channel as `{"error": "<text>"}`.
    pub async fn emit_error(&self, error: impl Into<String>) -> Result<()> {
        self.send(&DataEnvelope::Error {
            error: error.into(),
        })
        .await
    }

    async fn send(&self, envelope: &DataEnvelope) -> Result<()> {
        let outbound = self.outbound.as_ref().ok_or_else(|| {
            PluginError::config("context has no outbound channel; only sources emit")
        })?;
        let payload = serde_json::to_vec(envelope)?;
        outbound.send(&payload).await
    }
}

impl std::fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceContext")
            .field("meta", &self.meta)
            .field("func_id", &self.func_id)
            .field("emits", &self.outbound.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Meta {
        Meta {
            rule_id: "r1".to_string(),
            op_id: "op1".to_string(),
            instance_id: 0,
        }
    }

    #[tokio::test]
    async fn test_emit_without_channel_is_config_error() {
        let ctx = InstanceContext::for_sink(meta());
        let err = ctx.emit(serde_json::json!({"a": 1}), Value::Null).await;
        assert!(matches!(err, Err(PluginError::Config(_))));
    }

    #[test]
    fn test_function_context_identity() {
        let ctx = InstanceContext::for_function(meta(), 3);
        assert_eq!(ctx.rule_id(), "r1");
        assert_eq!(ctx.func_id(), Some(3));
    }
}
