//! End-to-end tests for the foliobot chat pipeline.
//!
//! These exercise the full path from an inbound chat body to the terminal
//! session: config loading, the retrieval tool against a real store, both
//! generation phases, SSE encoding, and the client-side state machine.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use foliobot_agent::{ConfigLoader, OrchestratorSettings, StreamSink, TwoPhaseOrchestrator};
use foliobot_config::{AssistantConfig, Environment, GatewayConfig};
use foliobot_core::conversation::ConversationMessage;
use foliobot_core::error::ProviderError;
use foliobot_core::message::{Message, MessageToolCall, Role};
use foliobot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use foliobot_core::request::LogContext;
use foliobot_core::store::{Collection, ConfigStore, ContentStore};
use foliobot_core::stream::{FinishReason, StreamEvent};
use foliobot_gateway::{GatewayState, build_orchestrator, build_router};
use foliobot_stores::{InMemoryConfigStore, InMemoryContentStore, UnavailableStore};
use foliobot_terminal::client::SseDecoder;
use foliobot_terminal::{MemorySessionStore, Mode, SessionController, Submission};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and records
/// every request it sees.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ProviderResponse>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        requests.push(request);
        responses
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(format!("no scripted response #{index}")))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "mock-model".into(),
        finish_reason: FinishReason::Stop,
    }
}

fn tool_response(id: &str, args: serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        message: Message {
            tool_calls: vec![MessageToolCall {
                id: id.into(),
                name: "query_portfolio".into(),
                arguments: args.to_string(),
            }],
            ..Message::assistant("")
        },
        usage: None,
        model: "mock-model".into(),
        finish_reason: FinishReason::ToolCalls,
    }
}

async fn portfolio() -> Arc<dyn ContentStore> {
    let store = InMemoryContentStore::new();
    store
        .insert_json(
            Collection::Projects,
            serde_json::json!({"id": 1, "title": "Toy Compiler", "description": "A compiler for a small Rust subset"}),
        )
        .await;
    store
        .insert_json(
            Collection::Projects,
            serde_json::json!({"id": 2, "title": "Photo Gallery", "description": "Static site generator for photos"}),
        )
        .await;
    Arc::new(store)
}

fn orchestrator(
    provider: Arc<ScriptedProvider>,
    content: Arc<dyn ContentStore>,
    config: Arc<dyn ConfigStore>,
) -> Arc<TwoPhaseOrchestrator> {
    build_orchestrator(provider, content, config, &AssistantConfig::default())
}

async fn run(orch: &TwoPhaseOrchestrator, question: &str) -> Vec<StreamEvent> {
    let (sink, mut rx) = StreamSink::channel(256);
    orch.run(
        &[ConversationMessage::user(question)],
        &LogContext::generate(),
        sink,
    )
    .await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

fn finishes(events: &[StreamEvent]) -> Vec<FinishReason> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Finish { finish_reason } => Some(*finish_reason),
            _ => None,
        })
        .collect()
}

// ── Pipeline scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn projects_question_retrieves_then_answers() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("call_1", serde_json::json!({"table": "projects"})),
        text_response(""),
        text_response("I built a Toy Compiler and a Photo Gallery."),
    ]));
    let orch = orchestrator(
        provider.clone(),
        portfolio().await,
        Arc::new(InMemoryConfigStore::new()),
    );

    let events = run(&orch, "what projects have you built?").await;

    // Phase 1 had tools, phase 2 did not
    assert_eq!(provider.calls(), 3);
    assert!(!provider.request(0).tools.is_empty());
    assert!(provider.request(2).tools.is_empty());

    // Phase 2 prompt carries the retrieved rows
    let answer_prompt = provider.request(2);
    assert_eq!(answer_prompt.messages[1].role, Role::User);
    assert!(answer_prompt.messages[1].content.contains("Toy Compiler"));
    assert!(answer_prompt.messages[1].content.contains("what projects have you built?"));

    // Stream relays the tool call and ends with one stop
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolCall { input, .. } if input["table"] == "projects"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolResult { output, .. } if output.contains("Photo Gallery")
    )));
    assert_eq!(text_of(&events), "I built a Toy Compiler and a Photo Gallery.");
    assert_eq!(finishes(&events), vec![FinishReason::Stop]);
}

#[tokio::test]
async fn greeting_is_answered_in_one_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response(
        "Hi! Ask me about my projects.",
    )]));
    let orch = orchestrator(
        provider.clone(),
        portfolio().await,
        Arc::new(InMemoryConfigStore::new()),
    );

    let events = run(&orch, "hello").await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(finishes(&events), vec![FinishReason::Stop]);
}

#[tokio::test]
async fn database_outage_still_produces_a_terminated_answer() {
    let outage = Arc::new(UnavailableStore::new("connection refused"));
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("call_1", serde_json::json!({"table": "education"})),
        text_response(""),
        text_response("I can't reach my education details right now."),
    ]));
    let orch = orchestrator(provider.clone(), outage.clone(), outage);

    let events = run(&orch, "where did you study?").await;

    // Fallback config was used and the tool error reached phase 2 as text
    assert_eq!(provider.request(0).model, foliobot_agent::config_loader::FALLBACK_MODEL);
    let answer_prompt = &provider.request(2).messages[1].content;
    assert!(answer_prompt.contains("Error"));
    assert!(answer_prompt.contains("education"));
    assert_eq!(finishes(&events), vec![FinishReason::Stop]);
}

#[tokio::test]
async fn provider_outage_ends_with_error_and_fallback_text() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let orch = TwoPhaseOrchestrator::new(
        provider,
        Arc::new(foliobot_tools::default_registry(portfolio().await, 5)),
        Arc::new(ConfigLoader::fallback_only()),
        OrchestratorSettings::default(),
    );

    let events = run(&orch, "hello").await;
    assert_eq!(finishes(&events), vec![FinishReason::Error]);
    assert_eq!(text_of(&events), foliobot_agent::prompts::FALLBACK_TEXT);
}

// ── Gateway to terminal ─────────────────────────────────────────────────

#[tokio::test]
async fn terminal_session_consumes_gateway_stream() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("call_1", serde_json::json!({"table": "projects", "query": "compiler"})),
        text_response(""),
        text_response("My favourite is the Toy Compiler."),
    ]));
    let state = Arc::new(GatewayState {
        orchestrator: orchestrator(
            provider,
            portfolio().await,
            Arc::new(InMemoryConfigStore::new()),
        ),
        environment: Environment::Test,
    });
    let app = build_router(state, &GatewayConfig::default());

    let store = Arc::new(MemorySessionStore::new());
    let mut session = SessionController::new(store.clone(), 50);
    session.submit("ai");
    let Submission::SendChat(messages) = session.submit("which project is your favourite?") else {
        panic!("expected a chat submission");
    };

    let body = serde_json::json!({ "messages": messages, "sessionId": session.session_id() });
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    // Queue an exit while the answer is still "streaming"
    session.submit("quit");
    assert_eq!(session.mode(), Mode::Ai);

    let mut decoder = SseDecoder::default();
    for event in decoder.feed(&bytes) {
        session.apply_event(&event.unwrap());
    }
    assert!(decoder.is_done());

    assert!(!session.is_loading());
    assert_eq!(session.mode(), Mode::Standard);
    let answer = &session.conversation()[1];
    assert_eq!(answer.text(), "My favourite is the Toy Compiler.");
    assert_eq!(answer.parts.len(), 3);
    assert_eq!(
        foliobot_terminal::SessionStore::load_conversation(store.as_ref())
            .unwrap()
            .len(),
        2
    );
}
