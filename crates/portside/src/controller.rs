//! Process-level runtime controller
//!
//! One controller per plugin process. It dials the control channel, serves
//! the host's start/stop commands, owns the instance registry and retains a
//! handle for every spawned symbol worker so `shutdown` can join them
//! deterministically. (The original design never joined workers on process
//! exit; keeping the handles makes that a choice instead of an accident —
//! callers that simply exit after `wait` get the old behavior.)
//!
//! Start commands are fire-and-forget: the acknowledgement is sent before
//! the new worker finishes opening its channels, so a stop issued in that
//! narrow window may not find the instance yet and is answered with a
//! warning rather than strict ordering.

use crate::channel::ControlChannel;
use crate::config::RuntimeOptions;
use crate::error::{PluginError, Result};
use crate::registry::SymbolRegistry;
use crate::runtime::{FunctionRuntime, SinkRuntime, SourceRuntime};
use crate::traits::PluginSpec;
use bytes::Bytes;
use portside_protocol::{
    control_socket, function_key, instance_key, Cmd, Command, ControlRequest, PluginType,
    REPLY_OK,
};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime controller for one plugin process.
pub struct PluginRuntime {
    spec: PluginSpec,
    options: Arc<RuntimeOptions>,
    registry: Arc<SymbolRegistry>,
    workers: Mutex<JoinSet<()>>,
    control_cancel: OnceLock<CancellationToken>,
    control_task: Mutex<Option<JoinHandle<()>>>,
}

impl PluginRuntime {
    pub fn new(spec: PluginSpec, options: RuntimeOptions) -> Arc<Self> {
        Arc::new(Self {
            spec,
            options: Arc::new(options),
            registry: Arc::new(SymbolRegistry::new()),
            workers: Mutex::new(JoinSet::new()),
            control_cancel: OnceLock::new(),
            control_task: Mutex::new(None),
        })
    }

    /// Registry of currently running symbol instances.
    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    /// Dial the control socket and start serving commands on a dedicated
    /// worker. Returns once the handshake is on its way; commands are
    /// dispatched in the background until [`shutdown`](Self::shutdown).
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let path = control_socket(&self.options.base_dir, self.spec.name());
        let channel =
            ControlChannel::open(&path, self.options.control_dial, self.options.recv_timeout)
                .await?;
        let _ = self.control_cancel.set(channel.cancel_token());
        info!(
            "plugin '{}' control channel connected at {}",
            self.spec.name(),
            path.display()
        );

        let controller = self.clone();
        let task = tokio::spawn(async move {
            let handler = {
                let controller = controller.clone();
                move |request: Bytes| {
                    let controller = controller.clone();
                    async move { controller.dispatch(request).await }
                }
            };
            match channel.run(handler).await {
                Ok(()) => debug!("control channel loop exited"),
                Err(e) => error!("control channel failed unexpectedly: {}", e),
            }
        });
        *self.control_task.lock().await = Some(task);
        Ok(())
    }

    /// Wait for the control loop to end (host closed the channel or
    /// [`shutdown`](Self::shutdown) ran).
    pub async fn wait(&self) {
        let task = self.control_task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Stop every running symbol, close the control channel and join all
    /// workers.
    pub async fn shutdown(&self) {
        info!("plugin '{}' shutting down", self.spec.name());
        for runtime in self.registry.drain().await {
            if runtime.is_running() {
                runtime.stop().await;
            }
        }
        if let Some(cancel) = self.control_cancel.get() {
            cancel.cancel();
        }
        let mut workers = self.workers.lock().await;
        while workers.join_next().await.is_some() {}
        drop(workers);
        self.wait().await;
    }

    /// Answer one control request. Never fails: errors become diagnostic
    /// reply bytes so the host always hears back.
    async fn dispatch(self: Arc<Self>, request: Bytes) -> Vec<u8> {
        match self.handle_command(&request).await {
            Ok(reply) => reply.into_bytes(),
            Err(e) => e.to_string().into_bytes(),
        }
    }

    async fn handle_command(&self, frame: &[u8]) -> Result<String> {
        let command = Command::from_bytes(frame)?;
        let request = command.request()?;
        info!(
            "received {:?} command for symbol '{}'",
            command.cmd, request.symbol_name
        );
        match command.cmd {
            Cmd::Start => self.handle_start(request).await,
            Cmd::Stop => self.handle_stop(request).await,
        }
    }

    async fn handle_start(&self, request: ControlRequest) -> Result<String> {
        let plugin_type = request
            .plugin_type
            .ok_or_else(|| PluginError::config("start command missing pluginType"))?;
        match plugin_type {
            PluginType::Source => {
                let factory = self
                    .spec
                    .source(&request.symbol_name)
                    .ok_or_else(|| PluginError::symbol("symbol not found"))?
                    .clone();
                let key = instance_key(&request.meta, &request.symbol_name);
                self.ensure_not_running(&key).await?;

                let mut plugin = factory.create();
                plugin
                    .configure(request.datasource.as_deref(), &request.config)
                    .await?;
                let runtime =
                    SourceRuntime::new(key, request.meta, plugin, self.options.clone());
                self.spawn(runtime.run(self.registry.clone())).await;
                info!("running source '{}'", request.symbol_name);
            }
            PluginType::Sink => {
                let factory = self
                    .spec
                    .sink(&request.symbol_name)
                    .ok_or_else(|| PluginError::symbol("symbol not found"))?
                    .clone();
                let key = instance_key(&request.meta, &request.symbol_name);
                self.ensure_not_running(&key).await?;

                let mut plugin = factory.create();
                plugin.configure(&request.config).await?;
                let runtime = SinkRuntime::new(key, request.meta, plugin, self.options.clone());
                self.spawn(runtime.run(self.registry.clone())).await;
                info!("running sink '{}'", request.symbol_name);
            }
            PluginType::Func => {
                // Function symbols are singletons: a second start reuses the
                // running instance instead of spawning another.
                let key = function_key(&request.symbol_name);
                if let Some(existing) = self.registry.get(&key).await {
                    if existing.is_running() {
                        info!(
                            "function '{}' already running, reusing",
                            request.symbol_name
                        );
                        return Ok(REPLY_OK.to_string());
                    }
                }
                let factory = self
                    .spec
                    .function(&request.symbol_name)
                    .ok_or_else(|| PluginError::symbol("symbol not found"))?
                    .clone();
                let runtime = FunctionRuntime::new(
                    key,
                    request.symbol_name.clone(),
                    factory.create(),
                    self.options.clone(),
                );
                self.spawn(runtime.run(self.registry.clone())).await;
                info!("running function '{}'", request.symbol_name);
            }
        }
        Ok(REPLY_OK.to_string())
    }

    async fn handle_stop(&self, request: ControlRequest) -> Result<String> {
        let key = instance_key(&request.meta, &request.symbol_name);
        match self.registry.get(&key).await {
            Some(runtime) if runtime.is_running() => {
                info!("stopping '{}'", key);
                runtime.stop().await;
            }
            Some(_) => debug!("'{}' is already stopping", key),
            // Stop is idempotent from the caller's perspective; a missing
            // key is only worth a warning.
            None => warn!("stop for unregistered symbol '{}'", key),
        }
        Ok(REPLY_OK.to_string())
    }

    /// A start for a key that is registered and still running is a defined
    /// error, not a silent registry overwrite.
    async fn ensure_not_running(&self, key: &str) -> Result<()> {
        if let Some(existing) = self.registry.get(key).await {
            if existing.is_running() {
                return Err(PluginError::symbol(format!("symbol {key} already running")));
            }
        }
        Ok(())
    }

    async fn spawn(&self, worker: impl Future<Output = ()> + Send + 'static) {
        let mut workers = self.workers.lock().await;
        // reap workers that have already finished
        while workers.try_join_next().is_some() {}
        workers.spawn(worker);
    }
}
