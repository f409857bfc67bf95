//! Minimal MCP tool server speaking newline-delimited JSON-RPC on stdio.
//!
//! Used as the built-in default server and as the integration test fixture.
//! Set `MCP_ECHO_LIST_DELAY_MS` to make `tools/list` answer slowly,
//! `MCP_ECHO_ENDLESS_PAGES` to make every listing page point at another, and
//! `MCP_ECHO_REJECT_INIT` to make `initialize` fail.

use mcp_agent::constants::PROTOCOL_VERSION;
use mcp_agent::rpc::{RpcRequest, RpcResponse};
use serde_json::{Value, json};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

const SERVER_NAME: &str = "mcp-echo-server";
const LIST_DELAY_ENV: &str = "MCP_ECHO_LIST_DELAY_MS";
const REJECT_INIT_ENV: &str = "MCP_ECHO_REJECT_INIT";
const ENDLESS_PAGES_ENV: &str = "MCP_ECHO_ENDLESS_PAGES";
// Implementation-defined server error.
const INIT_REJECTED: i64 = -32000;
// 1x1 transparent PNG
const PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

type SharedStdout = Arc<Mutex<Stdout>>;

#[tokio::main]
async fn main() -> io::Result<()> {
    init_tracing();
    let stdout: SharedStdout = Arc::new(Mutex::new(io::stdout()));
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "Unparseable request");
                send(&stdout, &RpcResponse::parse_error(err.to_string())).await?;
                continue;
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            continue;
        }

        // Each request runs on its own task so a slow call does not hold up
        // the ones behind it.
        let stdout = Arc::clone(&stdout);
        tokio::spawn(async move {
            let response = handle(request).await;
            if let Err(err) = send(&stdout, &response).await {
                warn!(%err, "Failed to write response");
            }
        });
    }

    Ok(())
}

async fn handle(request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::invalid_request(id, "expected jsonrpc 2.0");
    }

    match request.method.as_str() {
        "initialize" if env::var_os(REJECT_INIT_ENV).is_some() => {
            RpcResponse::error(id, INIT_REJECTED, "initialization refused")
        }
        "initialize" => RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
                "instructions": "Test server: echo, slow_echo, get_env, snapshot, fail, raw."
            }),
        ),
        "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => {
            if let Some(delay) = list_delay() {
                tokio::time::sleep(delay).await;
            }
            let mut page = json!({ "tools": tool_definitions() });
            if env::var_os(ENDLESS_PAGES_ENV).is_some() {
                page["nextCursor"] = json!("more");
            }
            RpcResponse::success(id, page)
        }
        "tools/call" => call_tool(&request).await,
        other => RpcResponse::method_not_found(id, other),
    }
}

fn list_delay() -> Option<Duration> {
    env::var(LIST_DELAY_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn tool_definitions() -> Value {
    let text_schema = json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    });
    json!([
        {
            "name": "echo",
            "description": "Return the given text unchanged.",
            "inputSchema": text_schema
        },
        {
            "name": "slow_echo",
            "description": "Return the given text after waiting delay_ms milliseconds.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "delay_ms": { "type": "integer", "minimum": 0 }
                },
                "required": ["text"]
            }
        },
        {
            "name": "get_env",
            "description": "Read an environment variable of the server process.",
            "inputSchema": {
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }
        },
        {
            "name": "snapshot",
            "description": "Return a caption followed by a tiny PNG image.",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "fail",
            "description": "Always report a tool-level error.",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "raw",
            "description": "Answer with the given result value exactly as passed.",
            "inputSchema": {
                "type": "object",
                "properties": { "result": {} }
            }
        }
    ])
}

async fn call_tool(request: &RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let Some(name) = request.param("name").and_then(Value::as_str) else {
        return RpcResponse::invalid_params(id, "params.name must be a string");
    };
    let empty = json!({});
    let arguments = request.param("arguments").unwrap_or(&empty);
    let text_arg = |key: &str| {
        arguments
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let result = match name {
        "echo" => text_result(&text_arg("text")),
        "slow_echo" => {
            let delay = arguments
                .get("delay_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            text_result(&text_arg("text"))
        }
        "get_env" => text_result(&env::var(text_arg("name")).unwrap_or_default()),
        "snapshot" => json!({
            "content": [
                { "type": "text", "text": "snapshot:" },
                { "type": "image", "data": PIXEL_PNG, "mimeType": "image/png" }
            ],
            "isError": false
        }),
        "fail" => json!({
            "content": [{ "type": "text", "text": "requested failure" }],
            "isError": true
        }),
        "raw" => arguments.get("result").cloned().unwrap_or(Value::Null),
        other => return RpcResponse::invalid_params(id, format!("Unknown tool: {other}")),
    };

    RpcResponse::success(id, result)
}

fn text_result(text: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false
    })
}

async fn send(stdout: &SharedStdout, response: &RpcResponse) -> io::Result<()> {
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    let mut stdout = stdout.lock().await;
    stdout.write_all(&encoded).await?;
    stdout.flush().await
}

/// Stderr only; stdout carries the protocol.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
