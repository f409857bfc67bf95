use super::*;
use crate::application::tooling::testing::StubSession;
use crate::application::tooling::{ToolSession, cancelled_message, not_found_message};
use crate::infrastructure::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use crate::types::{ChatMessage, MessageRole, ToolCall};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Mutex;

enum Scripted {
    Reply(ChatMessage),
    Fail(&'static str),
}

#[derive(Clone)]
struct ScriptedProvider {
    responses: Arc<Mutex<Vec<Scripted>>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn requests(&self) -> Vec<ModelRequest> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.recordings.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            return Err(ModelError::invalid_response("scripted", "script exhausted"));
        }
        match responses.remove(0) {
            Scripted::Reply(message) => Ok(ModelResponse::new(message)),
            Scripted::Fail(reason) => Err(ModelError::invalid_response("scripted", reason)),
        }
    }
}

fn say(text: &str) -> Scripted {
    Scripted::Reply(ChatMessage::assistant(text, Vec::new()))
}

fn call_tools(calls: Vec<ToolCall>) -> Scripted {
    Scripted::Reply(ChatMessage::assistant("", calls))
}

fn echo_call(id: &str, tool: &str, text: &str) -> ToolCall {
    ToolCall::new(id, tool, json!({ "text": text }))
}

fn engine_with(
    provider: &ScriptedProvider,
    sessions: Vec<StubSession>,
) -> ConversationEngine<ScriptedProvider> {
    let sessions = sessions
        .into_iter()
        .map(|session| Arc::new(session) as Arc<dyn ToolSession>)
        .collect();
    ConversationEngine::new(Arc::new(provider.clone()), sessions, "test-model")
}

#[tokio::test]
async fn plain_reply_returns_without_tools() {
    let provider = ScriptedProvider::new(vec![say("Hello!")]);
    let mut engine = engine_with(&provider, vec![StubSession::new("s1").with_tools(&["echo"])]);

    let outcome = engine.submit("hi").await.expect("turn succeeds");

    assert_eq!(outcome.reply, "Hello!");
    assert_eq!(outcome.tool_rounds, 0);
    assert_eq!(engine.phase(), EnginePhase::AwaitingUserInput);

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test-model");
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "echo");
}

#[tokio::test]
async fn prime_lists_tool_names_in_system_message() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut engine = engine_with(
        &provider,
        vec![
            StubSession::new("s1").with_tools(&["echo", "read_file"]),
            StubSession::new("s2").with_tools(&["search"]),
        ],
    );

    let count = engine.prime(Some("Be brief.")).await;

    assert_eq!(count, 3);
    let messages = engine.transcript().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::System);
    assert!(messages[0].content.starts_with("Be brief."));
    assert!(messages[0].content.contains("echo, read_file, search"));

    engine.prime(None).await;
    assert_eq!(engine.transcript().len(), 1);
}

#[tokio::test]
async fn echo_turn_produces_expected_transcript_shape() {
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("call_1", "echo", "hello")]),
        say("The server said hello."),
    ]);
    let mut engine = engine_with(&provider, vec![StubSession::new("echo").with_tools(&["echo"])]);

    let outcome = engine.submit("Please echo hello").await.expect("turn succeeds");

    assert_eq!(outcome.reply, "The server said hello.");
    assert_eq!(outcome.tool_rounds, 1);
    assert_eq!(outcome.tool_calls, 1);

    let roles: Vec<_> = engine
        .transcript()
        .messages()
        .iter()
        .map(|msg| msg.role)
        .collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );

    let tool_message = &engine.transcript().messages()[2];
    assert_eq!(tool_message.content, "hello");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.tool_name.as_deref(), Some("echo"));

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert!(engine.transcript().pending_call_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn results_keep_request_order_when_first_call_is_slow() {
    let session = StubSession::new("mixed")
        .with_tools(&["slow", "fast"])
        .with_call_delay("slow", Duration::from_secs(3));
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![
            echo_call("a", "slow", "first"),
            echo_call("b", "fast", "second"),
        ]),
        say("done"),
    ]);
    let mut engine = engine_with(&provider, vec![session]);

    engine.submit("go").await.expect("turn succeeds");

    let messages = engine.transcript().messages();
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("a"));
    assert_eq!(messages[2].content, "first");
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("b"));
    assert_eq!(messages[3].content, "second");
}

#[tokio::test(start_paused = true)]
async fn tool_calls_in_one_batch_run_concurrently() {
    let session = StubSession::new("slow")
        .with_tools(&["one", "two"])
        .with_call_delay("one", Duration::from_secs(2))
        .with_call_delay("two", Duration::from_secs(2));
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("1", "one", "x"), echo_call("2", "two", "y")]),
        say("ok"),
    ]);
    let mut engine = engine_with(&provider, vec![session]);

    let started = tokio::time::Instant::now();
    engine.submit("go").await.expect("turn succeeds");

    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn unknown_tool_becomes_error_result_and_conversation_continues() {
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![ToolCall::new("c1", "nonexistent_tool", json!({}))]),
        say("That tool does not exist."),
    ]);
    let mut engine = engine_with(&provider, vec![StubSession::new("s1").with_tools(&["echo"])]);

    let outcome = engine.submit("use it").await.expect("turn succeeds");

    assert_eq!(outcome.reply, "That tool does not exist.");
    let tool_message = &engine.transcript().messages()[2];
    assert_eq!(tool_message.content, not_found_message("nonexistent_tool"));
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn colliding_tool_name_routes_to_first_session() {
    let first = StubSession::new("first").with_tools(&["search"]);
    let second = StubSession::new("second").with_tools(&["search"]);
    let first_calls = first.calls();
    let second_calls = second.calls();
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("c1", "search", "rust")]),
        say("found"),
    ]);
    let mut engine = engine_with(&provider, vec![first, second]);

    engine.submit("search").await.expect("turn succeeds");

    assert_eq!(first_calls.lock().await.len(), 1);
    assert!(second_calls.lock().await.is_empty());
    assert_eq!(provider.requests().await[0].tools.len(), 1);
}

#[tokio::test]
async fn multiple_tool_rounds_in_one_turn() {
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("r1", "echo", "one")]),
        call_tools(vec![echo_call("r2", "echo", "two")]),
        say("finished"),
    ]);
    let mut engine = engine_with(&provider, vec![StubSession::new("s").with_tools(&["echo"])]);

    let outcome = engine.submit("twice").await.expect("turn succeeds");

    assert_eq!(outcome.tool_rounds, 2);
    assert_eq!(outcome.tool_calls, 2);
    assert_eq!(engine.transcript().len(), 6);
}

#[tokio::test]
async fn failing_session_call_is_absorbed() {
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("c1", "echo", "x")]),
        say("the tool broke"),
    ]);
    let mut engine = engine_with(
        &provider,
        vec![StubSession::new("flaky").with_tools(&["echo"]).failing_calls()],
    );

    let outcome = engine.submit("try").await.expect("turn succeeds");

    assert_eq!(outcome.reply, "the tool broke");
    let tool_message = &engine.transcript().messages()[2];
    assert!(tool_message.content.starts_with("Error: Tool echo failed"));
}

#[tokio::test]
async fn model_failure_propagates_and_resets_phase() {
    let provider = ScriptedProvider::new(vec![Scripted::Fail("missing message")]);
    let mut engine = engine_with(&provider, vec![StubSession::new("s").with_tools(&["echo"])]);

    let err = engine.submit("hi").await.expect_err("model failure");

    assert!(matches!(err, AgentError::Model(ModelError::InvalidResponse { .. })));
    assert_eq!(engine.phase(), EnginePhase::AwaitingUserInput);
    assert_eq!(engine.transcript().len(), 1);
}

#[tokio::test]
async fn catalog_is_refreshed_for_every_model_request() {
    let session = StubSession::new("s").with_tools(&["echo"]);
    let listings = session.list_counter();
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("c1", "echo", "x")]),
        say("done"),
    ]);
    let mut engine = engine_with(&provider, vec![session]);

    engine.prime(None).await;
    engine.submit("go").await.expect("turn succeeds");

    assert_eq!(listings.load(Ordering::SeqCst), 3);
    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
}

#[tokio::test(start_paused = true)]
async fn dropped_turn_is_settled_before_the_next_one() {
    let session = StubSession::new("s")
        .with_tools(&["slow", "echo"])
        .with_call_delay("slow", Duration::from_secs(60));
    let provider = ScriptedProvider::new(vec![
        call_tools(vec![echo_call("c1", "slow", "late"), echo_call("c2", "echo", "x")]),
        say("recovered"),
    ]);
    let mut engine = engine_with(&provider, vec![session]);

    let first = tokio::time::timeout(Duration::from_secs(1), engine.submit("first")).await;
    assert!(first.is_err());
    assert_eq!(engine.phase(), EnginePhase::ExecutingTools);
    assert_eq!(engine.transcript().pending_call_ids(), vec!["c1", "c2"]);

    let outcome = engine.submit("again").await.expect("turn succeeds");

    assert_eq!(outcome.reply, "recovered");
    assert_eq!(engine.phase(), EnginePhase::AwaitingUserInput);
    let messages = engine.transcript().messages();
    let roles: Vec<_> = messages.iter().map(|msg| msg.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Tool,
            MessageRole::User,
            MessageRole::Assistant,
        ]
    );
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(messages[2].content, cancelled_message("c1"));
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("c2"));
    assert_eq!(messages[3].tool_name.as_deref(), Some("echo"));

    // the request after the dropped turn carries a result for every call
    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 5);
}

#[test]
fn settling_without_open_calls_changes_nothing() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut engine = engine_with(&provider, vec![StubSession::new("s")]);

    engine.settle_abandoned_turn();

    assert!(engine.transcript().is_empty());
    assert_eq!(engine.phase(), EnginePhase::AwaitingUserInput);
}
