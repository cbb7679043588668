//! Capability traits implemented by user plugin code
//!
//! The runtime treats plugin behavior as opaque capabilities: a [`Source`]
//! produces tuples, a [`Sink`] consumes them, a [`Function`] answers
//! invocations. Factories for each are registered in a [`PluginSpec`] at
//! startup; the control channel resolves start commands against that table.

mod function;
mod sink;
mod source;
mod spec;

pub use function::{Function, FunctionFactory};
pub use sink::{Sink, SinkFactory};
pub use source::{Source, SourceFactory};
pub use spec::PluginSpec;
