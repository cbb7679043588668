//! Symbol runtimes: one concurrent worker per started plugin symbol
//!
//! A symbol runtime owns its channel(s), the user plugin object and a
//! running flag, and drives open → serve-loop → close. The three variants
//! share that shape and differ in their serve loop:
//!
//! - [`SourceRuntime`] runs the user source's `open` until exhaustion,
//! - [`SinkRuntime`] loops `recv` → `collect`,
//! - [`FunctionRuntime`] serves validate/exec requests on its own control
//!   conversation.
//!
//! # Shutdown disambiguation
//!
//! Closing a channel makes a blocked receive or send fail, and that is the
//! only cancellation primitive available, so the serve loop cannot tell
//! "closed because we were asked to stop" from "failed" by the error alone.
//! The contract: `stop` clears the running flag strictly before closing the
//! channel, and the loop classifies any error by re-checking the flag. A
//! cleared flag means expected shutdown noise; a set flag means a real
//! failure. Reordering those two phases breaks the classification.

mod function;
mod sink;
mod source;

pub use function::FunctionRuntime;
pub use sink::SinkRuntime;
pub use source::SourceRuntime;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle the registry keeps for each started symbol.
#[async_trait]
pub trait RunningSymbol: Send + Sync {
    /// Instance key this runtime is registered under.
    fn key(&self) -> &str;

    /// True between registration and the start of shutdown.
    fn is_running(&self) -> bool;

    /// Two-phase stop: clear the running flag, then close the channel(s) so
    /// a blocked serve loop unwinds. Idempotent; the serve-loop worker does
    /// the actual teardown (user `close`, deregistration).
    async fn stop(&self);
}

/// Identity and running flag shared by all runtime variants.
pub(crate) struct SymbolState {
    key: String,
    running: AtomicBool,
}

impl SymbolState {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}
