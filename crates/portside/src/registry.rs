//! Instance registry
//!
//! Process-wide mapping from instance key to the running symbol runtime,
//! consulted by stop commands. Concurrent starts, stops and runtime
//! self-deregistration on failure all mutate it, so every operation holds
//! the lock. No eviction beyond explicit delete: an entry leaked by a
//! runtime that crashed without deregistering stays visible for diagnosis.
//!
//! The registry is owned by the controller and passed explicitly to whoever
//! needs it — there is no process-global instance.

use crate::runtime::RunningSymbol;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Synchronized map of currently running symbol runtimes.
#[derive(Default)]
pub struct SymbolRegistry {
    inner: RwLock<HashMap<String, Arc<dyn RunningSymbol>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.inner.read().await.contains_key(key)
    }

    pub async fn get(&self, key: &str) -> Option<Arc<dyn RunningSymbol>> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, runtime: Arc<dyn RunningSymbol>) {
        self.inner.write().await.insert(key.into(), runtime);
    }

    pub async fn delete(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    /// Remove the entry under `key` only if it still points at `runtime`.
    /// A worker deregistering itself must not evict a newer runtime that was
    /// registered under the same key after it failed.
    pub async fn delete_if_same(&self, key: &str, runtime: &Arc<dyn RunningSymbol>) {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.get(key) {
            if Arc::ptr_eq(existing, runtime) {
                inner.remove(key);
            }
        }
    }

    /// Snapshot of every registered runtime, used for process shutdown.
    pub async fn drain(&self) -> Vec<Arc<dyn RunningSymbol>> {
        let mut inner = self.inner.write().await;
        inner.drain().map(|(_, rt)| rt).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeSymbol {
        key: String,
        running: AtomicBool,
    }

    #[async_trait]
    impl RunningSymbol for FakeSymbol {
        fn key(&self) -> &str {
            &self.key
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        async fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn fake(key: &str) -> Arc<FakeSymbol> {
        Arc::new(FakeSymbol {
            key: key.to_string(),
            running: AtomicBool::new(true),
        })
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let registry = SymbolRegistry::new();
        registry.set("r1_op1_0_print", fake("r1_op1_0_print")).await;

        assert!(registry.has("r1_op1_0_print").await);
        let entry = registry.get("r1_op1_0_print").await.unwrap();
        assert!(entry.is_running());

        registry.delete("r1_op1_0_print").await;
        assert!(!registry.has("r1_op1_0_print").await);
        assert!(registry.get("r1_op1_0_print").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_mutation() {
        let registry = Arc::new(SymbolRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("r1_op1_{i}_s");
                registry.set(key.clone(), fake(&key)).await;
                assert!(registry.has(&key).await);
                registry.delete(&key).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_if_same_spares_replacement_entry() {
        let registry = SymbolRegistry::new();
        let first = fake("k");
        let second = fake("k");
        registry.set("k", first.clone()).await;

        // a worker that was never the registered entry must not evict it
        let second: Arc<dyn RunningSymbol> = second;
        registry.delete_if_same("k", &second).await;
        assert!(registry.has("k").await);

        let first: Arc<dyn RunningSymbol> = first;
        registry.delete_if_same("k", &first).await;
        assert!(!registry.has("k").await);
    }

    #[tokio::test]
    async fn test_drain_empties_registry() {
        let registry = SymbolRegistry::new();
        registry.set("a", fake("a")).await;
        registry.set("b", fake("b")).await;
        let drained = registry.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.len().await, 0);
    }
}
