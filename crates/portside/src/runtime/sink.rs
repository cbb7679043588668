//! Sink symbol runtime

use crate::channel::InboundChannel;
use crate::config::RuntimeOptions;
use crate::context::InstanceContext;
use crate::error::Result;
use crate::registry::SymbolRegistry;
use crate::runtime::{RunningSymbol, SymbolState};
use crate::traits::Sink;
use async_trait::async_trait;
use portside_protocol::{data_socket, Meta};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Runtime for one running sink instance. Owns the inbound data channel and
/// the user sink; the serve loop forwards every received message to the
/// sink's `collect`.
pub struct SinkRuntime {
    state: SymbolState,
    meta: Meta,
    plugin: Mutex<Box<dyn Sink>>,
    inbound: OnceLock<Arc<InboundChannel>>,
    options: Arc<RuntimeOptions>,
}

impl SinkRuntime {
    /// Wrap an already-configured sink.
    pub(crate) fn new(
        key: String,
        meta: Meta,
        plugin: Box<dyn Sink>,
        options: Arc<RuntimeOptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: SymbolState::new(key),
            meta,
            plugin: Mutex::new(plugin),
            inbound: OnceLock::new(),
            options,
        })
    }

    pub(crate) async fn run(self: Arc<Self>, registry: Arc<SymbolRegistry>) {
        if let Err(e) = self.serve(&registry).await {
            if self.state.is_running() {
                error!("sink '{}' failed unexpectedly: {}", self.state.key(), e);
            } else {
                debug!("sink '{}' closed during stop: {}", self.state.key(), e);
            }
        }
        self.finish(&registry).await;
    }

    async fn serve(self: &Arc<Self>, registry: &Arc<SymbolRegistry>) -> Result<()> {
        // Opening: the plugin binds first, the host connects to push
        let path = data_socket(&self.options.base_dir, &self.meta);
        let channel = Arc::new(InboundChannel::open(&path, self.options.data_listen).await?);
        let _ = self.inbound.set(channel.clone());
        let ctx = Arc::new(InstanceContext::for_sink(self.meta.clone()));

        // Running
        registry
            .set(self.state.key(), self.clone() as Arc<dyn RunningSymbol>)
            .await;
        self.state.set_running(true);
        info!("sink '{}' running", self.state.key());

        let mut plugin = self.plugin.lock().await;
        plugin.open(ctx.clone()).await?;

        loop {
            let data = channel.recv().await?;
            plugin.collect(&ctx, data).await?;
        }
    }

    async fn finish(self: &Arc<Self>, registry: &SymbolRegistry) {
        self.state.set_running(false);
        {
            let mut plugin = self.plugin.lock().await;
            if let Err(e) = plugin.close().await {
                warn!("sink '{}' close failed: {}", self.state.key(), e);
            }
        }
        if let Some(channel) = self.inbound.get() {
            channel.close();
        }
        // a worker that failed before registering (or whose key was retaken)
        // must not evict another runtime's entry
        let this = self.clone() as Arc<dyn RunningSymbol>;
        registry.delete_if_same(self.state.key(), &this).await;
        info!("sink '{}' stopped", self.state.key());
    }
}

#[async_trait]
impl RunningSymbol for SinkRuntime {
    fn key(&self) -> &str {
        self.state.key()
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }

    async fn stop(&self) {
        // Flag first, then close: the blocked recv fails and the serve loop
        // reads the cleared flag as expected shutdown.
        self.state.set_running(false);
        if let Some(channel) = self.inbound.get() {
            channel.close();
        }
    }
}
