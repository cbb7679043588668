//! Plugin registration table
//!
//! The host addresses symbols by `(pluginType, symbolName)`; the plugin
//! binary declares what it exports by building a [`PluginSpec`] at startup.
//! Unknown lookups are the "symbol not found" failure replied to the host.

use crate::traits::{FunctionFactory, SinkFactory, SourceFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Name and factory table for everything one plugin process exports.
///
/// # Example
///
/// ```rust,ignore
/// let spec = PluginSpec::new("mirror")
///     .with_source("random", Arc::new(|| Box::new(RandomSource::default()) as Box<dyn Source>))
///     .with_sink("print", Arc::new(|| Box::new(PrintSink::default()) as Box<dyn Sink>));
/// ```
pub struct PluginSpec {
    name: String,
    sources: HashMap<String, Arc<dyn SourceFactory>>,
    sinks: HashMap<String, Arc<dyn SinkFactory>>,
    functions: HashMap<String, Arc<dyn FunctionFactory>>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: HashMap::new(),
            sinks: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Plugin name; also keys the control socket address.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_source(mut self, name: impl Into<String>, factory: Arc<dyn SourceFactory>) -> Self {
        self.sources.insert(name.into(), factory);
        self
    }

    pub fn with_sink(mut self, name: impl Into<String>, factory: Arc<dyn SinkFactory>) -> Self {
        self.sinks.insert(name.into(), factory);
        self
    }

    pub fn with_function(
        mut self,
        name: impl Into<String>,
        factory: Arc<dyn FunctionFactory>,
    ) -> Self {
        self.functions.insert(name.into(), factory);
        self
    }

    pub fn source(&self, name: &str) -> Option<&Arc<dyn SourceFactory>> {
        self.sources.get(name)
    }

    pub fn sink(&self, name: &str) -> Option<&Arc<dyn SinkFactory>> {
        self.sinks.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn FunctionFactory>> {
        self.functions.get(name)
    }
}

impl std::fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSpec")
            .field("name", &self.name)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
