//! Source symbol runtime

use crate::channel::OutboundChannel;
use crate::config::RuntimeOptions;
use crate::context::InstanceContext;
use crate::error::Result;
use crate::registry::SymbolRegistry;
use crate::runtime::{RunningSymbol, SymbolState};
use crate::traits::Source;
use async_trait::async_trait;
use portside_protocol::{data_socket, Meta};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Runtime for one running source instance. Owns the outbound data channel
/// and the user source; the user's `open` drives emission through the
/// instance context until it is done or the channel is closed under it.
pub struct SourceRuntime {
    state: SymbolState,
    meta: Meta,
    plugin: Mutex<Box<dyn Source>>,
    outbound: OnceLock<Arc<OutboundChannel>>,
    options: Arc<RuntimeOptions>,
}

impl SourceRuntime {
    /// Wrap an already-configured source. `configure` happens before
    /// construction so a bad start payload is rejected synchronously.
    pub(crate) fn new(
        key: String,
        meta: Meta,
        plugin: Box<dyn Source>,
        options: Arc<RuntimeOptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: SymbolState::new(key),
            meta,
            plugin: Mutex::new(plugin),
            outbound: OnceLock::new(),
            options,
        })
    }

    /// Drive the full lifecycle on the current worker: open the channel,
    /// register, serve, then tear down whatever happened.
    pub(crate) async fn run(self: Arc<Self>, registry: Arc<SymbolRegistry>) {
        if let Err(e) = self.serve(&registry).await {
            if self.state.is_running() {
                error!("source '{}' failed unexpectedly: {}", self.state.key(), e);
            } else {
                debug!("source '{}' closed during stop: {}", self.state.key(), e);
            }
        }
        self.finish(&registry).await;
    }

    async fn serve(self: &Arc<Self>, registry: &Arc<SymbolRegistry>) -> Result<()> {
        // Opening: bind the emit path before anything is visible to stop
        let path = data_socket(&self.options.base_dir, &self.meta);
        let channel = Arc::new(
            OutboundChannel::open(&path, self.options.data_dial, self.options.send_timeout)
                .await?,
        );
        let _ = self.outbound.set(channel.clone());
        let ctx = Arc::new(InstanceContext::for_source(self.meta.clone(), channel));

        // Running
        registry
            .set(self.state.key(), self.clone() as Arc<dyn RunningSymbol>)
            .await;
        self.state.set_running(true);
        info!("source '{}' running", self.state.key());

        let mut plugin = self.plugin.lock().await;
        plugin.open(ctx).await
    }

    /// Stopping → Stopped: always runs exactly once, on the serve worker.
    async fn finish(self: &Arc<Self>, registry: &SymbolRegistry) {
        self.state.set_running(false);
        {
            let mut plugin = self.plugin.lock().await;
            if let Err(e) = plugin.close().await {
                warn!("source '{}' close failed: {}", self.state.key(), e);
            }
        }
        if let Some(channel) = self.outbound.get() {
            channel.close();
        }
        // a worker that failed before registering (or whose key was retaken)
        // must not evict another runtime's entry
        let this = self.clone() as Arc<dyn RunningSymbol>;
        registry.delete_if_same(self.state.key(), &this).await;
        info!("source '{}' stopped", self.state.key());
    }
}

#[async_trait]
impl RunningSymbol for SourceRuntime {
    fn key(&self) -> &str {
        self.state.key()
    }

    fn is_running(&self) -> bool {
        self.state.is_running()
    }

    async fn stop(&self) {
        // Flag first, then close: the serve loop classifies its channel
        // error by this flag.
        self.state.set_running(false);
        if let Some(channel) = self.outbound.get() {
            channel.close();
        }
    }
}
