//! Function symbol runtime
//!
//! A function symbol is a process-wide singleton: the host starts it once
//! and routes every call site's traffic through one request/reply
//! conversation on the symbol's own control socket. The runtime caches one
//! [`InstanceContext`] per call site (`ruleId_opId_instanceId_funcId`),
//! created lazily on first `Exec` and reused for the life of the runtime.

use crate::channel::ControlChannel;
use crate::config::RuntimeOptions;
use crate::context::InstanceContext;
use crate::error::{PluginError, Result};
use crate::registry::SymbolRegistry;
use crate::runtime::{RunningSymbol, SymbolState};
use crate::traits::Function;
use async_trait::async_trait;
use bytes::Bytes;
use portside_protocol::{function_socket, FuncData, FuncMeta, FuncReply};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runtime for one function symbol, serving Validate/Exec/IsAggregate.
pub struct FunctionRuntime {
    state: SymbolState,
    symbol_name: String,
    plugin: Box<dyn Function>,
    contexts: Mutex<HashMap<String, Arc<InstanceContext>>>,
    cancel: OnceLock<CancellationToken>,
    options: Arc<RuntimeOptions>,
}

impl FunctionRuntime {
    pub(crate) fn new(
        key: String,
        symbol_name: String,
        plugin: Box<dyn Function>,
        options: Arc<RuntimeOptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: SymbolState::new(key),
            symbol_name,
            plugin,
            contexts: Mutex::new(HashMap::new()),
            cancel: OnceLock::new(),
            options,
        })
    }

    pub(crate) async fn run(self: Arc<Self>, registry: Arc<SymbolRegistry>) {
        if let Err(e) = self.serve(&registry).await {
            if self.state.is_running() {
                error!(
                    "function '{}' failed unexpectedly: {}",
                    self.state.key(),
                    e
                );
            } else {
                debug!("function '{}' closed during stop: {}", self.state.key(), e);
            }
        }
        self.finish(&registry).await;
    }

    async fn serve(self: &Arc<Self>, registry: &Arc<SymbolRegistry>) -> Result<()> {
        // Opening: functions have no data channel, only their own control
        // conversation on a symbol-derived address.
        let path = function_socket(&self.options.base_dir, &self.symbol_name);
        let channel =
            ControlChannel::open(&path, self.options.control_dial, self.options.recv_timeout)
                .await?;
        let _ = self.cancel.set(channel.cancel_token());

        // Running
        registry
            .set(self.state.key(), self.clone() as Arc<dyn RunningSymbol>)
            .await;
        self.state.set_running(true);
        info!("function '{}' running", self.state.key());

        let runtime = self.clone();
        channel
            .run(move |request| {
                let runtime = runtime.clone();
                async move { runtime.handle(request).await }
            })
            .await
    }

    async fn finish(self: &Arc<Self>, registry: &SymbolRegistry) {
        self.state.set_running(false);
        if let Some(cancel) = self.cancel.get() {
            cancel.cancel();
        }
        // a worker that failed before registering (or whose key was retaken)
        // must not evict another runtime's entry
        let this = self.clone() as Arc<dyn RunningSymbol>;
        registry.delete_if_same(self.state.key(), &this).await;
        info!("function '{}' stopped", self.state.key());
    }

    /// Answer one request. Never fails: every error becomes a
    /// `{state: false, result: <diagnostic>}` reply.
    async fn handle(&self, request: Bytes) -> Vec<u8> {
        let reply = self.dispatch(&request).await;
        serde_json::to_vec(&reply)
            .unwrap_or_else(|_| br#"{"state":false,"result":"reply encoding failed"}"#.to_vec())
    }

    async fn dispatch(&self, request: &[u8]) -> FuncReply {
        let data: FuncData = match serde_json::from_slice(request) {
            Ok(data) => data,
            Err(e) => return FuncReply::error(format!("malformed function request: {e}")),
        };
        match data.func.as_str() {
            "Validate" => match self.plugin.validate(&data.arg).await {
                Ok(()) => FuncReply::ok(None),
                Err(e) => failed(e),
            },
            "Exec" => self.exec(&data.arg).await,
            "IsAggregate" => FuncReply::ok(Some(Value::Bool(self.plugin.is_aggregate()))),
            other => FuncReply::error(format!("invalid function command: {other}")),
        }
    }

    async fn exec(&self, arg: &[Value]) -> FuncReply {
        // The call-site identity rides as the last argument, JSON-encoded
        // into a string by the host.
        let (raw_meta, args) = match arg.split_last() {
            Some((Value::String(raw), args)) => (raw, args),
            _ => return FuncReply::error("exec request missing call-site context"),
        };
        let func_meta: FuncMeta = match serde_json::from_str(raw_meta) {
            Ok(meta) => meta,
            Err(e) => return FuncReply::error(format!("malformed call-site context: {e}")),
        };
        let ctx = self.context_for(&func_meta).await;
        match self.plugin.exec(args, ctx).await {
            Ok(result) => FuncReply::ok(Some(result)),
            Err(e) => failed(e),
        }
    }

    /// Resolve or lazily create the cached context for a call site.
    /// Entries live for the lifetime of the runtime; there is no eviction.
    async fn context_for(&self, func_meta: &FuncMeta) -> Arc<InstanceContext> {
        let mut contexts = self.contexts.lock().await;
        contexts
            .entry(func_meta.call_site_key())
            .or_insert_with(|| {
                Arc::new(InstanceContext::for_function(
                    func_meta.meta.clone(),
                    func_meta.func_id,
                ))
            })
            .clone()
    }
}

/// Render a failed call. User plugin errors travel verbatim; runtime errors
/// keep their full rendering.
fn failed(e: PluginError) -> FuncReply {
    match e {
        PluginError::Plugin(msg) => FuncReply::error(msg),
        other => FuncReply::error(other.to_string()),
    }
}

#[async_trait]
impl RunningSymbol for FunctionRuntime {
    fn key(&self) -> &str {
        self.state.key()
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }

    async fn stop(&self) {
        self.state.set_running(false);
        if let Some(cancel) = self.cancel.get() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portside_protocol::{function_key, Meta};
    use serde_json::json;

    struct Revert;

    #[async_trait]
    impl Function for Revert {
        async fn validate(&self, args: &[Value]) -> Result<()> {
            if args.len() == 1 {
                Ok(())
            } else {
                Err(PluginError::plugin("revert takes exactly one argument"))
            }
        }

        async fn exec(&self, args: &[Value], _ctx: Arc<InstanceContext>) -> Result<Value> {
            let s = args[0]
                .as_str()
                .ok_or_else(|| PluginError::plugin("argument must be a string"))?;
            Ok(Value::String(s.chars().rev().collect()))
        }

        fn is_aggregate(&self) -> bool {
            false
        }
    }

    fn runtime() -> Arc<FunctionRuntime> {
        FunctionRuntime::new(
            function_key("revert"),
            "revert".to_string(),
            Box::new(Revert),
            Arc::new(RuntimeOptions::default()),
        )
    }

    fn exec_request(arg: &str, func_id: i32) -> Vec<u8> {
        let meta = serde_json::to_string(&FuncMeta {
            meta: Meta {
                rule_id: "rule1".to_string(),
                op_id: "op1".to_string(),
                instance_id: 1,
            },
            func_id,
        })
        .unwrap();
        serde_json::to_vec(&FuncData {
            func: "Exec".to_string(),
            arg: vec![json!(arg), json!(meta)],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_validate_and_is_aggregate() {
        let rt = runtime();

        let ok = rt
            .dispatch(br#"{"func":"Validate","arg":["x"]}"#)
            .await;
        assert!(ok.state);
        assert_eq!(ok.result, None);

        let bad = rt
            .dispatch(br#"{"func":"Validate","arg":["x","y"]}"#)
            .await;
        assert!(!bad.state);
        // the user's message goes out verbatim, without the error-type prefix
        assert_eq!(
            bad.result,
            Some(json!("revert takes exactly one argument"))
        );

        let agg = rt.dispatch(br#"{"func":"IsAggregate"}"#).await;
        assert_eq!(agg.result, Some(Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_exec_round_trip() {
        let rt = runtime();
        let reply = rt.dispatch(&exec_request("twelve", 1)).await;
        assert!(reply.state);
        assert_eq!(reply.result, Some(json!("evlewt")));
    }

    #[tokio::test]
    async fn test_exec_context_cached_per_call_site() {
        let rt = runtime();
        let _ = rt.dispatch(&exec_request("a", 1)).await;
        let _ = rt.dispatch(&exec_request("b", 1)).await;
        let _ = rt.dispatch(&exec_request("c", 2)).await;

        let contexts = rt.contexts.lock().await;
        assert_eq!(contexts.len(), 2);
        let first = contexts.get("rule1_op1_1_1").unwrap();
        let second = contexts.get("rule1_op1_1_2").unwrap();
        assert!(!Arc::ptr_eq(first, second));
    }

    #[tokio::test]
    async fn test_exec_reuses_same_context_object() {
        let rt = runtime();
        let meta = FuncMeta {
            meta: Meta {
                rule_id: "rule1".to_string(),
                op_id: "op1".to_string(),
                instance_id: 1,
            },
            func_id: 7,
        };
        let a = rt.context_for(&meta).await;
        let b = rt.context_for(&meta).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_requests() {
        let rt = runtime();

        let garbage = rt.dispatch(b"not json").await;
        assert!(!garbage.state);

        let unknown = rt.dispatch(br#"{"func":"Explode","arg":[]}"#).await;
        assert!(!unknown.state);
        assert_eq!(
            unknown.result,
            Some(json!("invalid function command: Explode"))
        );

        let missing_ctx = rt.dispatch(br#"{"func":"Exec","arg":[1]}"#).await;
        assert!(!missing_ctx.state);
    }
}
