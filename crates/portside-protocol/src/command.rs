//! Control, function and data message types
//!
//! The control channel carries a strict request/reply conversation. Requests
//! are a two-layer envelope: an outer [`Command`] naming the verb, whose
//! `arg` field is a *JSON document encoded as a string* holding the
//! [`ControlRequest`]. Replies are raw UTF-8 bytes — the literal
//! [`REPLY_OK`] on success, or a diagnostic string.
//!
//! Function symbols run their own request/reply conversation with the same
//! framing: [`FuncData`] requests answered by [`FuncReply`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed acknowledgement literal sent as the control reply on success.
pub const REPLY_OK: &str = "ok";

/// First frame a plugin sends after a control or function channel connects.
/// Signals readiness to the host; carries no payload and is never replied to.
pub const HANDSHAKE: &[u8] = b"handshake";

/// Control verbs the host may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cmd {
    Start,
    Stop,
}

/// Outer control envelope: `{"cmd": "start", "arg": "<json string>"}`.
///
/// The nested argument stays string-encoded on the wire so the outer envelope
/// can always be parsed (and replied to) even when the argument is garbage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: Cmd,
    pub arg: String,
}

impl Command {
    /// Build a command with the given request as its string-encoded argument.
    pub fn new(cmd: Cmd, request: &ControlRequest) -> Result<Self> {
        Ok(Self {
            cmd,
            arg: serde_json::to_string(request)?,
        })
    }

    /// Decode the nested control request.
    pub fn request(&self) -> Result<ControlRequest> {
        Ok(serde_json::from_str(&self.arg)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Kind of symbol a start command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Source,
    Sink,
    Func,
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Sink => write!(f, "sink"),
            Self::Func => write!(f, "func"),
        }
    }
}

/// Identity of one operator instance inside the host's execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    #[serde(rename = "opId")]
    pub op_id: String,
    #[serde(rename = "instanceId")]
    pub instance_id: i32,
}

/// Nested argument of a start or stop command.
///
/// Start carries every field; stop carries only `symbolName` and `meta`, so
/// the type-specific fields are optional when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(rename = "symbolName")]
    pub symbol_name: String,
    #[serde(rename = "pluginType", default, skip_serializing_if = "Option::is_none")]
    pub plugin_type: Option<PluginType>,
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

/// One request on a function symbol's control conversation.
///
/// For `Exec`, the last element of `arg` is the call-site identity as a
/// JSON-encoded string (see [`FuncMeta`]); the preceding elements are the
/// user-visible function arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncData {
    pub func: String,
    #[serde(default)]
    pub arg: Vec<Value>,
}

/// Call-site identity attached to every `Exec` request. Instances of the
/// same function at the same call site share a cached context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncMeta {
    #[serde(flatten)]
    pub meta: Meta,
    #[serde(rename = "funcId")]
    pub func_id: i32,
}

impl FuncMeta {
    /// Cache key for the call site: `ruleId_opId_instanceId_funcId`.
    pub fn call_site_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.meta.rule_id, self.meta.op_id, self.meta.instance_id, self.func_id
        )
    }
}

/// Reply to a function request: `{"state": bool, "result": <value>}`.
/// A failed call carries the diagnostic string in `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncReply {
    pub state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl FuncReply {
    pub fn ok(result: impl Into<Option<Value>>) -> Self {
        Self {
            state: true,
            result: result.into(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            state: false,
            result: Some(Value::String(msg.into())),
        }
    }
}

/// Envelope on the unidirectional data channels.
///
/// Sources emit `Tuple` for normal data and `Error` for error propagation;
/// sinks receive the payload verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataEnvelope {
    Tuple { message: Value, meta: Value },
    Error { error: String },
}
