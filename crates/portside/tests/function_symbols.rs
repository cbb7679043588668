//! Function symbol conversation against a host-side test double
//!
//! Functions get their own framed request/reply socket, separate from the
//! process control channel. The double binds both, starts the symbol over
//! the control conversation, then speaks Validate/Exec/IsAggregate on the
//! function socket.

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use portside::protocol::{
    control_socket, function_key, function_socket, Cmd, Command, ControlRequest, FuncData,
    FuncMeta, FuncReply, Meta, PluginType, HANDSHAKE, REPLY_OK,
};
use portside::{Function, InstanceContext, PluginError, PluginRuntime, PluginSpec, RuntimeOptions};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::sleep;

async fn send_frame(stream: &mut UnixStream, payload: &[u8]) -> Result<()> {
    stream
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

async fn recv_frame(stream: &mut UnixStream) -> Result<Vec<u8>> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await?;
    let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

async fn accept_with_handshake(listener: &UnixListener) -> Result<UnixStream> {
    let (mut stream, _) = listener.accept().await?;
    let first = recv_frame(&mut stream).await?;
    ensure!(first == HANDSHAKE, "expected handshake, got {first:?}");
    Ok(stream)
}

async fn call(stream: &mut UnixStream, data: &FuncData) -> Result<FuncReply> {
    send_frame(stream, &serde_json::to_vec(data)?).await?;
    let reply = recv_frame(stream).await?;
    Ok(serde_json::from_slice(&reply)?)
}

fn exec_args(arg: Value) -> Vec<Value> {
    let site = serde_json::to_string(&FuncMeta {
        meta: Meta {
            rule_id: "r1".to_string(),
            op_id: "op1".to_string(),
            instance_id: 0,
        },
        func_id: 1,
    })
    .unwrap();
    vec![arg, json!(site)]
}

struct Revert;

#[async_trait]
impl Function for Revert {
    async fn validate(&self, args: &[Value]) -> portside::Result<()> {
        if args.len() == 1 {
            Ok(())
        } else {
            Err(PluginError::plugin("revert takes exactly one argument"))
        }
    }

    async fn exec(&self, args: &[Value], _ctx: Arc<InstanceContext>) -> portside::Result<Value> {
        let s = args[0]
            .as_str()
            .ok_or_else(|| PluginError::plugin("argument must be a string"))?;
        Ok(Value::String(s.chars().rev().collect()))
    }

    fn is_aggregate(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_function_conversation_and_singleton_reuse() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let dir = tempfile::tempdir()?;
    let base = dir.path().to_path_buf();

    let spec = PluginSpec::new("mirror")
        .with_function("revert", Arc::new(|| Box::new(Revert) as Box<dyn Function>));
    let control_listener = UnixListener::bind(control_socket(&base, "mirror"))?;
    let func_listener = UnixListener::bind(function_socket(&base, "revert"))?;

    let runtime = PluginRuntime::new(spec, RuntimeOptions::with_base_dir(&base));
    runtime.start().await.context("control dial failed")?;
    let mut control = accept_with_handshake(&control_listener).await?;

    let start = ControlRequest {
        symbol_name: "revert".to_string(),
        plugin_type: Some(PluginType::Func),
        meta: Meta {
            rule_id: "r1".to_string(),
            op_id: "op1".to_string(),
            instance_id: 0,
        },
        datasource: None,
        config: Value::Null,
    };
    let bytes = Command::new(Cmd::Start, &start)?.to_bytes()?;
    send_frame(&mut control, &bytes).await?;
    let reply = recv_frame(&mut control).await?;
    assert_eq!(reply, REPLY_OK.as_bytes());

    let mut func = accept_with_handshake(&func_listener).await?;
    let key = function_key("revert");
    for _ in 0..100 {
        if runtime.registry().has(&key).await {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(runtime.registry().has(&key).await);

    let ok = call(
        &mut func,
        &FuncData {
            func: "Validate".to_string(),
            arg: vec![json!("x")],
        },
    )
    .await?;
    assert!(ok.state);

    let bad = call(
        &mut func,
        &FuncData {
            func: "Validate".to_string(),
            arg: vec![json!("x"), json!("y")],
        },
    )
    .await?;
    assert!(!bad.state);
    assert_eq!(bad.result, Some(json!("revert takes exactly one argument")));

    let exec = call(
        &mut func,
        &FuncData {
            func: "Exec".to_string(),
            arg: exec_args(json!("twelve")),
        },
    )
    .await?;
    assert!(exec.state);
    assert_eq!(exec.result, Some(json!("evlewt")));

    let agg = call(
        &mut func,
        &FuncData {
            func: "IsAggregate".to_string(),
            arg: vec![],
        },
    )
    .await?;
    assert_eq!(agg.result, Some(Value::Bool(false)));

    // Second start for a running function reuses the singleton: it acks
    // without opening another function connection.
    let bytes = Command::new(Cmd::Start, &start)?.to_bytes()?;
    send_frame(&mut control, &bytes).await?;
    let reply = recv_frame(&mut control).await?;
    assert_eq!(reply, REPLY_OK.as_bytes());
    assert_eq!(runtime.registry().len().await, 1);

    // The running instance still answers afterwards.
    let exec = call(
        &mut func,
        &FuncData {
            func: "Exec".to_string(),
            arg: exec_args(json!("ab")),
        },
    )
    .await?;
    assert_eq!(exec.result, Some(json!("ba")));

    runtime.shutdown().await;
    assert!(runtime.registry().is_empty().await);

    // Both conversations are gone; the host's next reads see EOF.
    let mut buf = [0u8; 4];
    assert_eq!(func.read(&mut buf).await?, 0);
    assert_eq!(control.read(&mut buf).await?, 0);
    Ok(())
}
