use super::error::ToolInvokeError;
use crate::config::ServerConfig;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

/// Grace period for a server to exit after its stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type Responder = oneshot::Sender<Result<Value, ToolInvokeError>>;

/// Newline-delimited JSON-RPC channel to one MCP server subprocess.
#[derive(Clone)]
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: String,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: Mutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    alive: AtomicBool,
}

/// Drops the pending slot of a request that was abandoned (e.g. timed out).
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<String, Responder>>,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

impl McpProcess {
    /// Launch the server process and start reading its stdout.
    ///
    /// The child inherits the agent's environment with the descriptor's
    /// overrides applied on top; overrides win on key collision.
    pub fn spawn(config: &ServerConfig) -> Result<Self, ToolInvokeError> {
        let mut command = Command::new(&config.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.workdir {
            command.current_dir(dir);
        }
        if !config.args.is_empty() {
            command.args(&config.args);
        }
        command.envs(config.resolved_env());

        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: config.name.clone(),
            source,
        })?;

        let transport_error = |message: &str| ToolInvokeError::Transport {
            server: config.name.clone(),
            message: message.to_string(),
        };
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdout"))?;

        let inner = Arc::new(McpProcessInner {
            server: config.name.clone(),
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: Mutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        });

        let weak = Arc::downgrade(&inner);
        let server = config.name.clone();
        tokio::spawn(async move {
            reader_loop(weak, server, stdout).await;
        });

        Ok(Self { inner })
    }

    pub fn server(&self) -> &str {
        &self.inner.server
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Send a request and wait for the matching response's `result`.
    ///
    /// Dropping the returned future (for instance through a timeout) only
    /// abandons this request; the channel stays usable.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        self.inner.send_request(method, params).await
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        self.inner.send_notification(method, params).await
    }

    /// Close stdin, give the server a moment to exit, then kill and reap it.
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

impl McpProcessInner {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(self.terminated());
        }

        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| self.transport_error("pending request table poisoned"))?;
            pending.insert(id.clone(), tx);
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id: id.clone(),
        };

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        debug!(server = %self.server, method, request_id = %id, "Sending request");
        self.write_message(&payload).await?;

        match rx.await {
            Ok(Ok(mut response)) => match response.get_mut("result") {
                Some(result) => Ok(result.take()),
                None => Err(self.transport_error(format!(
                    "response to '{method}' carried no result"
                ))),
            },
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.server.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| self.terminated())?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), ToolInvokeError> {
        match (value.get("id").cloned(), value.get("method").is_some()) {
            (Some(id), true) => self.handle_server_request(id, value).await,
            (Some(id), false) => {
                self.handle_response(id, value);
                Ok(())
            }
            (None, true) => {
                self.handle_notification(&value);
                Ok(())
            }
            (None, false) => Ok(()),
        }
    }

    fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };

        let responder = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&key),
            Err(_) => None,
        };

        let Some(sender) = responder else {
            debug!(
                server = %self.server,
                response_id = key,
                "received response for unknown or abandoned request"
            );
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                Err(ToolInvokeError::Rpc {
                    server: self.server.clone(),
                    code,
                    message,
                })
            }
            None => Ok(value),
        };
        let _ = sender.send(outcome);
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(
                    server = %self.server,
                    method = other,
                    "server sent unsupported request"
                );
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    fn handle_notification(&self, value: &Value) {
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return;
        };
        if method == "notifications/tools/list_changed" {
            info!(server = %self.server, "Server reported a changed tool list");
        } else {
            debug!(server = %self.server, method, "received notification from server");
        }
    }

    /// Marks the channel dead after the server's stdout closed.
    async fn mark_closed(&self) {
        self.alive.store(false, Ordering::Release);
        self.writer.lock().await.take();
        self.fail_all_pending();
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        let mut child = self.child.lock().await;
        if let Some(mut running) = child.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, running.wait())
                .await
                .is_err()
            {
                if let Err(err) = running.kill().await {
                    debug!(
                        server = %self.server,
                        %err,
                        "failed to kill MCP server process (may have already exited)"
                    );
                }
            }
            debug!(server = %self.server, "MCP server process stopped");
        }
        drop(child);

        self.fail_all_pending();
    }

    fn fail_all_pending(&self) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(self.terminated()));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn terminated(&self) -> ToolInvokeError {
        ToolInvokeError::Terminated {
            server: self.server.clone(),
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.clone(),
            message: message.into(),
        }
    }
}

async fn reader_loop(inner: Weak<McpProcessInner>, server: String, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let raw = match lines.next_line().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(err) => {
                warn!(server = %server, %err, "failed to read from MCP server");
                break;
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('\u{1b}') {
            debug!(
                server = %server,
                line = trimmed,
                "skipping non-JSON ANSI log line from MCP server"
            );
            continue;
        }

        let Some(channel) = inner.upgrade() else {
            return;
        };
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                if let Err(err) = channel.process_inbound_message(value).await {
                    warn!(server = %server, %err, "failed to process message from MCP server");
                }
            }
            Err(source) => {
                warn!(
                    server = %server,
                    line = trimmed,
                    %source,
                    "received invalid JSON from MCP server"
                );
            }
        }
    }

    debug!(server = %server, "MCP server closed its output");
    if let Some(channel) = inner.upgrade() {
        channel.mark_closed().await;
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
