//! Startup and teardown of the whole agent: connect every configured
//! server, hand the live sessions to the conversation engine, and close
//! them again on the way out.

use super::agent::{AgentError, ConversationEngine};
use super::stdio::{self, ExitReason, write_line};
use super::tooling::{McpSession, ToolSession};
use crate::config::{AppConfig, ServerConfig};
use crate::infrastructure::model::ModelProvider;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncBufRead, AsyncWrite};
use tracing::{error, info};

/// Connect to every server concurrently, writing one status line per server
/// to `output`.
///
/// Successful sessions are returned in configuration order; failures are
/// logged and reported but never abort startup.
pub async fn connect_reporting<W: AsyncWrite + Unpin>(
    servers: &[ServerConfig],
    init_timeout: Duration,
    output: &mut W,
) -> io::Result<Vec<Arc<dyn ToolSession>>> {
    let attempts = servers
        .iter()
        .map(|server| McpSession::connect(server, init_timeout));
    let results = join_all(attempts).await;

    let mut sessions: Vec<Arc<dyn ToolSession>> = Vec::with_capacity(servers.len());
    for (server, result) in servers.iter().zip(results) {
        match result {
            Ok(session) => {
                write_line(output, &format!("Connected to MCP server: {}", server.name)).await?;
                sessions.push(Arc::new(session));
            }
            Err(err) => {
                error!(server = %server.name, error = %err, "Failed to connect to MCP server");
                write_line(
                    output,
                    &format!("Failed to connect to MCP server {}: {err}", server.name),
                )
                .await?;
            }
        }
    }

    info!(
        connected = sessions.len(),
        configured = servers.len(),
        "MCP server startup finished"
    );
    Ok(sessions)
}

/// [`connect_reporting`] without status lines.
pub async fn connect_all(
    servers: &[ServerConfig],
    init_timeout: Duration,
) -> Vec<Arc<dyn ToolSession>> {
    // writing to a sink cannot fail
    connect_reporting(servers, init_timeout, &mut io::sink())
        .await
        .unwrap_or_default()
}

pub struct Orchestrator<P: ModelProvider> {
    engine: ConversationEngine<P>,
    system_prompt: Option<String>,
}

impl<P: ModelProvider> Orchestrator<P> {
    /// Connect, run the interactive loop and shut down, with `interrupt`
    /// raced against every stage. Sessions are closed on every exit path
    /// once startup completed.
    pub async fn launch<R, W, I>(
        config: &AppConfig,
        provider: Arc<P>,
        input: R,
        output: &mut W,
        interrupt: I,
    ) -> Result<ExitReason, AgentError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        I: Future,
    {
        tokio::pin!(interrupt);
        let started = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            started = Self::start(config, provider, output) => Some(started),
        };
        let Some(started) = started else {
            info!("Interrupted during startup");
            return stdio::interrupted(output).await;
        };

        let mut orchestrator = started?;
        let result = orchestrator.run_with(input, output, interrupt).await;
        orchestrator.shutdown().await;
        result
    }

    /// Connect every configured server and build the engine.
    ///
    /// Fails with [`AgentError::NoActiveSessions`] when nothing connected.
    pub async fn start<W: AsyncWrite + Unpin>(
        config: &AppConfig,
        provider: Arc<P>,
        output: &mut W,
    ) -> Result<Self, AgentError> {
        let sessions = connect_reporting(&config.servers, config.init_timeout, output).await?;
        Self::with_sessions(config, provider, sessions)
    }

    pub fn with_sessions(
        config: &AppConfig,
        provider: Arc<P>,
        sessions: Vec<Arc<dyn ToolSession>>,
    ) -> Result<Self, AgentError> {
        if sessions.is_empty() {
            return Err(AgentError::NoActiveSessions);
        }

        let engine = ConversationEngine::new(provider, sessions, config.model.clone())
            .with_list_timeout(config.list_timeout)
            .with_call_timeout(config.call_timeout);
        Ok(Self {
            engine,
            system_prompt: config.system_prompt.clone(),
        })
    }

    pub fn engine(&self) -> &ConversationEngine<P> {
        &self.engine
    }

    /// Prime the conversation, announce readiness and run the interactive
    /// loop until it stops.
    pub async fn run_with<R, W, I>(
        &mut self,
        input: R,
        output: &mut W,
        interrupt: I,
    ) -> Result<ExitReason, AgentError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        I: Future,
    {
        tokio::pin!(interrupt);
        let primed = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            tools = self.engine.prime(self.system_prompt.as_deref()) => Some(tools),
        };
        let Some(tools) = primed else {
            return stdio::interrupted(output).await;
        };

        let ready = format!(
            "Ready: {} server(s), {tools} tool(s), model {}. Type 'exit' to quit.",
            self.engine.sessions().len(),
            self.engine.model()
        );
        write_line(output, &ready).await?;
        let reason = stdio::run_loop(&mut self.engine, input, output, interrupt).await?;
        info!(?reason, "Interactive loop finished");
        Ok(reason)
    }

    /// Close every session concurrently.
    pub async fn shutdown(self) {
        let sessions = self.engine.sessions();
        join_all(sessions.iter().map(|session| session.shutdown())).await;
        info!(sessions = sessions.len(), "All MCP sessions closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::testing::StubSession;
    use crate::infrastructure::model::{ModelError, ModelRequest, ModelResponse};
    use crate::types::ChatMessage;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    struct FixedReply(&'static str);

    #[async_trait]
    impl ModelProvider for FixedReply {
        async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            Ok(ModelResponse::new(ChatMessage::assistant(self.0, Vec::new())))
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl ModelProvider for BrokenModel {
        async fn chat(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            Err(ModelError::invalid_response("broken", "missing message"))
        }
    }

    fn stub_sessions(stubs: &[StubSession]) -> Vec<Arc<dyn ToolSession>> {
        stubs
            .iter()
            .cloned()
            .map(|stub| Arc::new(stub) as Arc<dyn ToolSession>)
            .collect()
    }

    #[tokio::test]
    async fn empty_session_set_is_rejected() {
        let result =
            Orchestrator::with_sessions(&AppConfig::default(), Arc::new(FixedReply("hi")), Vec::new());
        assert!(matches!(result, Err(AgentError::NoActiveSessions)));
    }

    #[tokio::test]
    async fn start_with_no_servers_reports_no_active_sessions() {
        let config = AppConfig {
            servers: Vec::new(),
            ..AppConfig::default()
        };
        let mut output = Vec::new();
        let result = Orchestrator::start(&config, Arc::new(FixedReply("hi")), &mut output).await;
        assert!(matches!(result, Err(AgentError::NoActiveSessions)));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn interrupt_before_startup_connects_nothing() {
        let config = AppConfig {
            servers: vec![ServerConfig::new("ghost", "/definitely/not/a/real/mcp-server")],
            ..AppConfig::default()
        };

        let mut output = Vec::new();
        let reason = Orchestrator::launch(
            &config,
            Arc::new(FixedReply("hi")),
            &b"hello\n"[..],
            &mut output,
            std::future::ready(()),
        )
        .await
        .expect("interrupt is not an error");

        assert_eq!(reason, ExitReason::Interrupted);
        let printed = String::from_utf8(output).expect("utf8 output");
        assert!(printed.contains("Interrupted."));
        assert!(!printed.contains("ghost"));
    }

    #[tokio::test]
    async fn ready_line_goes_to_the_output_writer() {
        let stubs = [
            StubSession::new("a").with_tools(&["echo", "read"]),
            StubSession::new("b").with_tools(&["search"]),
        ];
        let config = AppConfig {
            model: "tiny-model".into(),
            ..AppConfig::default()
        };
        let mut orchestrator =
            Orchestrator::with_sessions(&config, Arc::new(FixedReply("ok")), stub_sessions(&stubs))
                .expect("sessions available");

        let mut output = Vec::new();
        orchestrator
            .run_with(&b"exit\n"[..], &mut output, std::future::pending::<()>())
            .await
            .expect("loop runs");

        let printed = String::from_utf8(output).expect("utf8 output");
        assert!(
            printed.starts_with("Ready: 2 server(s), 3 tool(s), model tiny-model."),
            "unexpected output: {printed}"
        );
    }

    #[tokio::test]
    async fn user_exit_then_shutdown_closes_every_session() {
        let stubs = [
            StubSession::new("a").with_tools(&["echo"]),
            StubSession::new("b").with_tools(&["search"]),
        ];
        let counters: Vec<_> = stubs.iter().map(StubSession::shutdown_counter).collect();
        let mut orchestrator = Orchestrator::with_sessions(
            &AppConfig::default(),
            Arc::new(FixedReply("Hello there")),
            stub_sessions(&stubs),
        )
        .expect("sessions available");

        let mut output = Vec::new();
        let reason = orchestrator
            .run_with(&b"hi\n\n/tools\nquit\n"[..], &mut output, std::future::pending::<()>())
            .await
            .expect("loop runs");

        assert_eq!(reason, ExitReason::UserExit);
        let printed = String::from_utf8(output).expect("utf8 output");
        assert!(printed.contains("Assistant: Hello there"));
        assert!(printed.contains("- echo (a)"));
        assert!(printed.contains("- search (b)"));

        orchestrator.shutdown().await;
        for counter in counters {
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn end_of_input_stops_the_loop() {
        let stubs = [StubSession::new("a").with_tools(&["echo"])];
        let mut orchestrator = Orchestrator::with_sessions(
            &AppConfig::default(),
            Arc::new(FixedReply("ok")),
            stub_sessions(&stubs),
        )
        .expect("sessions available");

        let mut output = Vec::new();
        let reason = orchestrator
            .run_with(&b""[..], &mut output, std::future::pending::<()>())
            .await
            .expect("loop runs");

        assert_eq!(reason, ExitReason::EndOfInput);
    }

    #[tokio::test]
    async fn interrupt_ends_the_loop() {
        let stubs = [StubSession::new("a").with_tools(&["echo"])];
        let mut orchestrator = Orchestrator::with_sessions(
            &AppConfig::default(),
            Arc::new(FixedReply("ok")),
            stub_sessions(&stubs),
        )
        .expect("sessions available");

        let mut output = Vec::new();
        let reason = orchestrator
            .run_with(&b"hello\n"[..], &mut output, std::future::ready(()))
            .await
            .expect("loop runs");

        assert_eq!(reason, ExitReason::Interrupted);
    }

    #[tokio::test]
    async fn model_failure_prints_error_and_terminates() {
        let stubs = [StubSession::new("a").with_tools(&["echo"])];
        let counter = stubs[0].shutdown_counter();
        let mut orchestrator = Orchestrator::with_sessions(
            &AppConfig::default(),
            Arc::new(BrokenModel),
            stub_sessions(&stubs),
        )
        .expect("sessions available");

        let mut output = Vec::new();
        let reason = orchestrator
            .run_with(&b"hi\nsecond\n"[..], &mut output, std::future::pending::<()>())
            .await
            .expect("loop runs");

        assert_eq!(reason, ExitReason::TurnFailed);
        let printed = String::from_utf8(output).expect("utf8 output");
        assert!(printed.contains("Error: Response from 'broken' was malformed"));
        assert!(!printed.contains("second"));

        orchestrator.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
