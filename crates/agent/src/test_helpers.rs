//! Shared test helpers for the agent crate.

use async_trait::async_trait;
use chrono::Utc;
use foliobot_core::error::{ProviderError, StoreError};
use foliobot_core::message::MessageToolCall;
use foliobot_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use foliobot_core::store::{
    AssistantConfigRecord, Collection, ConfigStore, ContentStore, ContextBlock, SkillEntry,
};
use foliobot_core::stream::{FinishReason, StreamEvent};
use foliobot_stores::{InMemoryConfigStore, InMemoryContentStore};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What one `stream()` call of a [`ScriptedProvider`] does.
pub enum Script {
    /// Yield these chunks.
    Chunks(Vec<StreamChunk>),
    /// Fail the request before any chunk.
    Fail(ProviderError),
    /// Yield one text chunk, then break the stream.
    BrokenMidway(String),
}

/// A mock provider that replays one scripted stream per call.
///
/// Records every request; once the scripts run out, further calls fail with
/// `NotConfigured`.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(mut scripts: Vec<Script>) -> Self {
        scripts.reverse();
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted provider only streams".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop();

        let items: Vec<Result<StreamChunk, ProviderError>> = match script {
            None => return Err(ProviderError::NotConfigured("no more scripted streams".into())),
            Some(Script::Fail(e)) => return Err(e),
            Some(Script::Chunks(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(Script::BrokenMidway(text)) => vec![
                Ok(StreamChunk {
                    content: Some(text),
                    ..StreamChunk::default()
                }),
                Err(ProviderError::StreamInterrupted("connection reset".into())),
            ],
        };

        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            let _ = tx.send(item).await;
        }
        Ok(rx)
    }
}

/// A step that streams `text` in two pieces and stops.
pub fn text_step(text: &str) -> Script {
    let mid = text
        .char_indices()
        .nth(text.chars().count() / 2)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (a, b) = text.split_at(mid);
    Script::Chunks(vec![
        StreamChunk {
            content: Some(a.to_string()),
            ..StreamChunk::default()
        },
        StreamChunk {
            content: Some(b.to_string()),
            ..StreamChunk::default()
        },
        StreamChunk {
            done: true,
            finish_reason: Some(FinishReason::Stop),
            ..StreamChunk::default()
        },
    ])
}

/// A step that requests `calls` and produces no text.
pub fn tool_step(calls: Vec<MessageToolCall>) -> Script {
    Script::Chunks(vec![StreamChunk {
        tool_calls: calls,
        done: true,
        finish_reason: Some(FinishReason::ToolCalls),
        ..StreamChunk::default()
    }])
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

pub async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Concatenated text deltas.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

pub fn finish_events(events: &[StreamEvent]) -> Vec<FinishReason> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Finish { finish_reason } => Some(*finish_reason),
            _ => None,
        })
        .collect()
}

pub async fn sample_content_store() -> Arc<dyn ContentStore> {
    let store = InMemoryContentStore::new();
    store
        .insert_json(
            Collection::Projects,
            serde_json::json!({"id": 1, "title": "Compiler", "description": "A toy Rust compiler"}),
        )
        .await;
    store
        .insert_json(
            Collection::Projects,
            serde_json::json!({"id": 2, "title": "Gallery", "description": "Static photo site"}),
        )
        .await;
    store
        .insert_json(Collection::Skills, serde_json::json!({"id": 1, "name": "Rust"}))
        .await;
    Arc::new(store)
}

/// A config store whose lists can be made to fail independently.
pub struct FlakyConfigStore {
    inner: InMemoryConfigStore,
    pub fail_blocks: bool,
    pub fail_skills: bool,
}

impl FlakyConfigStore {
    /// One enabled config with one context block and one skill.
    pub async fn seeded() -> Self {
        let inner = InMemoryConfigStore::new();
        inner
            .add_config(AssistantConfigRecord {
                id: "cfg-1".into(),
                model: "anthropic/claude-3.5-haiku".into(),
                base_prompt: "You answer questions about Ada's portfolio.".into(),
                temperature: Some(0.2),
                top_p: None,
                max_output_tokens: Some(800),
                enabled: true,
                updated_at: Utc::now(),
            })
            .await;
        inner
            .add_context_block(
                "cfg-1",
                ContextBlock {
                    title: "Availability".into(),
                    content: "Open to contract work.".into(),
                    sort_index: 0,
                },
                true,
            )
            .await;
        inner
            .add_skill(
                "cfg-1",
                SkillEntry {
                    name: "Recruiter mode".into(),
                    description: Some("for hiring managers".into()),
                    instructions: "Lead with impact.".into(),
                    sort_index: 0,
                },
                true,
            )
            .await;
        Self {
            inner,
            fail_blocks: false,
            fail_skills: false,
        }
    }
}

#[async_trait]
impl ConfigStore for FlakyConfigStore {
    async fn active_config(&self) -> Result<Option<AssistantConfigRecord>, StoreError> {
        self.inner.active_config().await
    }

    async fn context_blocks(&self, config_id: &str) -> Result<Vec<ContextBlock>, StoreError> {
        if self.fail_blocks {
            return Err(StoreError::QueryFailed {
                table: "assistant_context_blocks".into(),
                reason: "timeout".into(),
            });
        }
        self.inner.context_blocks(config_id).await
    }

    async fn skills(&self, config_id: &str) -> Result<Vec<SkillEntry>, StoreError> {
        if self.fail_skills {
            return Err(StoreError::QueryFailed {
                table: "assistant_skills".into(),
                reason: "timeout".into(),
            });
        }
        self.inner.skills(config_id).await
    }
}
