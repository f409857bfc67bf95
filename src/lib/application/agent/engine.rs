use super::errors::AgentError;
use crate::application::tooling::{
    Dispatcher, ToolCatalog, ToolResult, ToolSession, cancelled_message,
};
use crate::config::defaults::{DEFAULT_LIST_TIMEOUT, DEFAULT_SYSTEM_PROMPT};
use crate::infrastructure::model::{ModelProvider, ModelRequest};
use crate::types::{ChatMessage, Transcript};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the engine currently is in the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    AwaitingUserInput,
    AwaitingModelResponse,
    ExecutingTools,
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text of the final assistant message (the one without tool calls).
    pub reply: String,
    /// Number of tool batches executed before the final reply.
    pub tool_rounds: usize,
    pub tool_calls: usize,
}

pub struct ConversationEngine<P: ModelProvider> {
    provider: Arc<P>,
    sessions: Vec<Arc<dyn ToolSession>>,
    model: String,
    list_timeout: Duration,
    dispatcher: Dispatcher,
    transcript: Transcript,
    phase: EnginePhase,
}

impl<P: ModelProvider> ConversationEngine<P> {
    pub fn new(
        provider: Arc<P>,
        sessions: Vec<Arc<dyn ToolSession>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            sessions,
            model: model.into(),
            list_timeout: DEFAULT_LIST_TIMEOUT,
            dispatcher: Dispatcher::default(),
            transcript: Transcript::new(),
            phase: EnginePhase::AwaitingUserInput,
        }
    }

    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dispatcher = Dispatcher::new(timeout);
        self
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sessions(&self) -> &[Arc<dyn ToolSession>] {
        &self.sessions
    }

    /// Take a catalog snapshot with the configured per-session list timeout.
    pub async fn catalog(&self) -> ToolCatalog {
        ToolCatalog::snapshot(&self.sessions, self.list_timeout).await
    }

    /// Seed the transcript with the system message. Returns the number of
    /// tools visible at startup. Does nothing once the conversation started.
    pub async fn prime(&mut self, system_prompt: Option<&str>) -> usize {
        let catalog = self.catalog().await;
        if !self.transcript.is_empty() {
            return catalog.len();
        }

        let base = system_prompt
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let content = if catalog.is_empty() {
            base.to_string()
        } else {
            format!("{base}\n\nAvailable tools: {}", catalog.names().join(", "))
        };
        self.transcript.push(ChatMessage::system(content));
        info!(tools = catalog.len(), "Conversation primed");
        catalog.len()
    }

    /// Run one user turn to completion.
    ///
    /// A model failure ends the turn with an error; the transcript keeps
    /// everything appended up to that point. Dropping the returned future is
    /// allowed: the next call settles whatever the dropped turn left open.
    pub async fn submit(&mut self, user_input: &str) -> Result<TurnOutcome, AgentError> {
        self.settle_abandoned_turn();
        self.transcript.push(ChatMessage::user(user_input));
        let mut tool_rounds = 0;
        let mut tool_calls = 0;

        loop {
            self.phase = EnginePhase::AwaitingModelResponse;
            let catalog = self.catalog().await;

            let request = ModelRequest {
                model: self.model.clone(),
                messages: self.transcript.messages().to_vec(),
                tools: catalog.specs(),
            };
            debug!(
                messages = request.messages.len(),
                tools = request.tools.len(),
                "Requesting model response"
            );

            let response = match self.provider.chat(request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "Model exchange failed");
                    self.phase = EnginePhase::AwaitingUserInput;
                    return Err(err.into());
                }
            };

            let message = response.message;
            let calls = message.tool_calls.clone();
            let reply = message.content.clone();
            self.transcript
                .push(ChatMessage::assistant(message.content, message.tool_calls));

            if calls.is_empty() {
                self.phase = EnginePhase::AwaitingUserInput;
                info!(tool_rounds, tool_calls, "Turn completed");
                return Ok(TurnOutcome {
                    reply,
                    tool_rounds,
                    tool_calls,
                });
            }

            self.phase = EnginePhase::ExecutingTools;
            tool_rounds += 1;
            tool_calls += calls.len();
            info!(round = tool_rounds, calls = calls.len(), "Executing tool calls");

            let dispatcher = self.dispatcher;
            let results = join_all(calls.iter().map(|call| dispatcher.invoke(&catalog, call))).await;
            self.transcript
                .extend(results.into_iter().map(ToolResult::into_message));
        }
    }

    /// Answer every tool call of an interrupted turn so each call keeps
    /// exactly one result, then return to waiting for input.
    pub fn settle_abandoned_turn(&mut self) {
        let cancelled: Vec<ChatMessage> = self
            .transcript
            .pending_calls()
            .into_iter()
            .map(|call| {
                ChatMessage::tool_result(&call.id, &call.name, cancelled_message(&call.id))
            })
            .collect();
        if !cancelled.is_empty() {
            warn!(calls = cancelled.len(), "Settling tool calls of an abandoned turn");
            self.transcript.extend(cancelled);
        }
        self.phase = EnginePhase::AwaitingUserInput;
    }
}
