//! Socket address scheme and instance-key derivation
//!
//! Every socket address is derived deterministically from identity fields so
//! both processes can compute it without negotiation:
//!
//! - plugin control: `plugin_<pluginName>.sock`
//! - function control: `func_<symbolName>.sock`
//! - data (source/sink): `<ruleId>_<opId>_<instanceId>.sock`
//!
//! Addresses are unique per `(ruleId, opId, instanceId)` triple and per
//! plugin name. Colliding identities are a host configuration error, not
//! something this layer detects.

use crate::command::Meta;
use std::path::{Path, PathBuf};

/// Control socket for a whole plugin process, keyed by plugin name.
pub fn control_socket(base_dir: &Path, plugin_name: &str) -> PathBuf {
    base_dir.join(format!("plugin_{plugin_name}.sock"))
}

/// Control socket for a single function symbol, keyed by symbol name.
pub fn function_socket(base_dir: &Path, symbol_name: &str) -> PathBuf {
    base_dir.join(format!("func_{symbol_name}.sock"))
}

/// Data socket for one source or sink instance.
pub fn data_socket(base_dir: &Path, meta: &Meta) -> PathBuf {
    base_dir.join(format!(
        "{}_{}_{}.sock",
        meta.rule_id, meta.op_id, meta.instance_id
    ))
}

/// Registry key for one running source or sink instance:
/// `ruleId_opId_instanceId_symbolName`.
pub fn instance_key(meta: &Meta, symbol_name: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        meta.rule_id, meta.op_id, meta.instance_id, symbol_name
    )
}

/// Registry key for a function symbol. Function symbols are process-wide
/// singletons, so the key carries no instance identity.
pub fn function_key(symbol_name: &str) -> String {
    format!("func_{symbol_name}")
}
