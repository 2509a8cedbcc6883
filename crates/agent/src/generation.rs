//! One streamed generation: a bounded loop of model steps.
//!
//! Each step streams the model's text into a [`PhaseWriter`]. If the model
//! asks for tools (and tools are enabled), the calls run one at a time, their
//! events are relayed, their results are appended to the transcript and the
//! next step starts. The loop ends on a step without tool calls or when the
//! step budget is spent.

use foliobot_core::error::ProviderError;
use foliobot_core::message::{Message, MessageToolCall};
use foliobot_core::provider::{Provider, ProviderRequest};
use foliobot_core::stream::FinishReason;
use foliobot_core::tool::{ToolCall, ToolInvocation, ToolRegistry};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config_loader::RuntimeConfig;
use crate::sink::PhaseWriter;

/// Model and sampling parameters for a generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&RuntimeConfig> for GenerationParams {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_output_tokens,
        }
    }
}

/// What one model step produced.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub text: String,
    pub invocations: Vec<ToolInvocation>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub steps: Vec<StepRecord>,
}

impl GenerationOutcome {
    /// Text of every step, concatenated.
    pub fn text(&self) -> String {
        self.steps.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn used_tools(&self) -> bool {
        self.steps.iter().any(|s| !s.invocations.is_empty())
    }

    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.steps.iter().flat_map(|s| s.invocations.iter())
    }

    /// Finish reason of the last step.
    pub fn finish_reason(&self) -> FinishReason {
        self.steps
            .last()
            .map(|s| s.finish_reason)
            .unwrap_or_default()
    }
}

pub struct Generation<'a> {
    provider: &'a dyn Provider,
    tools: Option<&'a ToolRegistry>,
    max_steps: u32,
}

impl<'a> Generation<'a> {
    /// A single-step generation with tools disabled.
    pub fn text_only(provider: &'a dyn Provider) -> Self {
        Self {
            provider,
            tools: None,
            max_steps: 1,
        }
    }

    /// A generation that may call `tools` for up to `max_steps` model steps.
    pub fn with_tools(provider: &'a dyn Provider, tools: &'a ToolRegistry, max_steps: u32) -> Self {
        Self {
            provider,
            tools: Some(tools),
            max_steps: max_steps.max(1),
        }
    }

    pub async fn run(
        &self,
        params: &GenerationParams,
        mut transcript: Vec<Message>,
        writer: &mut PhaseWriter<'_>,
    ) -> Result<GenerationOutcome, ProviderError> {
        let definitions = self.tools.map(|t| t.definitions()).unwrap_or_default();
        let mut steps = Vec::new();

        for step in 0..self.max_steps {
            let request = ProviderRequest {
                model: params.model.clone(),
                messages: transcript.clone(),
                temperature: params.temperature,
                top_p: params.top_p,
                max_tokens: params.max_tokens,
                tools: definitions.clone(),
                stream: true,
            };

            let mut rx = self.provider.stream(request).await.inspect_err(|e| {
                warn!(phase = writer.namespace(), step, error = %e, "Generation request failed");
            })?;

            let mut text = String::new();
            let mut tool_calls: Vec<MessageToolCall> = Vec::new();
            let mut reported_finish = None;

            while let Some(chunk) = rx.recv().await {
                let chunk = chunk.inspect_err(|e| {
                    warn!(phase = writer.namespace(), step, error = %e, "Generation stream failed");
                })?;

                if let Some(delta) = chunk.content.as_deref().filter(|d| !d.is_empty()) {
                    text.push_str(delta);
                    writer.text_delta(delta).await;
                }

                for tc in chunk.tool_calls {
                    match tool_calls.iter_mut().find(|t| t.id == tc.id) {
                        Some(existing) => existing.arguments.push_str(&tc.arguments),
                        None => tool_calls.push(tc),
                    }
                }

                if chunk.finish_reason.is_some() {
                    reported_finish = chunk.finish_reason;
                }

                if chunk.done {
                    break;
                }
            }
            writer.end_text().await;

            let Some(tools) = self.tools.filter(|_| !tool_calls.is_empty()) else {
                debug!(phase = writer.namespace(), step, text_len = text.len(), "Generation step finished");
                steps.push(StepRecord {
                    text,
                    invocations: Vec::new(),
                    finish_reason: reported_finish.unwrap_or_default(),
                });
                break;
            };

            transcript.push(Message {
                tool_calls: tool_calls.clone(),
                ..Message::assistant(text.clone())
            });

            let mut invocations = Vec::with_capacity(tool_calls.len());
            for tc in tool_calls {
                let invocation = Self::invoke(tools, &tc, writer).await;
                transcript.push(Message::tool_result(&tc.id, &invocation.output));
                invocations.push(invocation);
            }

            debug!(
                phase = writer.namespace(),
                step,
                tool_calls = invocations.len(),
                "Generation step finished with tool calls"
            );

            steps.push(StepRecord {
                text,
                invocations,
                finish_reason: reported_finish.unwrap_or(FinishReason::ToolCalls),
            });
        }

        Ok(GenerationOutcome { steps })
    }

    /// Run one tool call, relaying its events. Tool errors become the output
    /// the model sees.
    async fn invoke(
        tools: &ToolRegistry,
        tc: &MessageToolCall,
        writer: &mut PhaseWriter<'_>,
    ) -> ToolInvocation {
        let input: serde_json::Value = serde_json::from_str(&tc.arguments).unwrap_or_default();
        writer.tool_call(&tc.id, &tc.name, &input).await;

        let call = ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments: input.clone(),
        };

        let started = Instant::now();
        let output = match tools.execute(&call).await {
            Ok(result) => result.output,
            Err(e) => {
                warn!(tool = %tc.name, error = %e, "Tool call failed");
                format!("Error: {e}")
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        writer.tool_result(&tc.id, &tc.name, &output).await;

        ToolInvocation {
            tool_name: tc.name.clone(),
            call_id: tc.id.clone(),
            input,
            output,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::StreamSink;
    use crate::test_helpers::*;
    use foliobot_core::stream::StreamEvent;
    use serde_json::json;

    fn params() -> GenerationParams {
        GenerationParams {
            model: "mock-model".into(),
            temperature: Some(0.5),
            top_p: None,
            max_tokens: Some(256),
        }
    }

    #[tokio::test]
    async fn text_only_runs_one_step() {
        let provider = ScriptedProvider::new(vec![text_step("Hello there")]);
        let (mut sink, rx) = StreamSink::channel(64);

        let outcome = Generation::text_only(&provider)
            .run(&params(), vec![Message::user("hi")], &mut sink.phase("answer"))
            .await
            .unwrap();
        sink.finish(outcome.finish_reason()).await;

        assert_eq!(outcome.text(), "Hello there");
        assert!(!outcome.used_tools());
        assert_eq!(provider.call_count(), 1);

        let request = &provider.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.max_tokens, Some(256));

        let events = drain(rx).await;
        assert_eq!(collect_text(&events), "Hello there");
    }

    #[tokio::test]
    async fn tool_calls_loop_until_text() {
        let provider = ScriptedProvider::new(vec![
            tool_step(vec![tool_call("call_1", "query_portfolio", json!({"table": "projects"}))]),
            text_step("You built a compiler."),
        ]);
        let store = sample_content_store().await;
        let tools = foliobot_tools::default_registry(store, 5);
        let (mut sink, rx) = StreamSink::channel(64);

        let outcome = Generation::with_tools(&provider, &tools, 5)
            .run(&params(), vec![Message::user("projects?")], &mut sink.phase("retrieval"))
            .await
            .unwrap();
        sink.finish(outcome.finish_reason()).await;

        assert!(outcome.used_tools());
        assert_eq!(outcome.steps.len(), 2);
        let invocation = outcome.invocations().next().unwrap();
        assert_eq!(invocation.tool_name, "query_portfolio");
        assert!(invocation.output.contains("Compiler"));

        // Second request carries the assistant tool call and its result
        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].tool_calls[0].id, "call_1");
        assert_eq!(second.messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(!second.tools.is_empty());

        let events = drain(rx).await;
        assert!(matches!(events[0], StreamEvent::ToolCall { .. }));
        assert!(matches!(events[1], StreamEvent::ToolResult { .. }));
        assert_eq!(collect_text(&events), "You built a compiler.");
    }

    #[tokio::test]
    async fn step_budget_bounds_the_loop() {
        let call = || tool_step(vec![tool_call("c", "query_portfolio", json!({"table": "skills"}))]);
        let provider = ScriptedProvider::new(vec![call(), call(), call()]);
        let tools = foliobot_tools::default_registry(sample_content_store().await, 5);
        let (mut sink, _rx) = StreamSink::channel(64);

        let outcome = Generation::with_tools(&provider, &tools, 2)
            .run(&params(), vec![Message::user("skills")], &mut sink.phase("retrieval"))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.finish_reason(), FinishReason::ToolCalls);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_output() {
        let provider = ScriptedProvider::new(vec![
            tool_step(vec![tool_call("c1", "delete_everything", json!({}))]),
            text_step("ok"),
        ]);
        let tools = foliobot_tools::default_registry(sample_content_store().await, 5);
        let (mut sink, _rx) = StreamSink::channel(64);

        let outcome = Generation::with_tools(&provider, &tools, 3)
            .run(&params(), vec![Message::user("x")], &mut sink.phase("retrieval"))
            .await
            .unwrap();
        let invocation = outcome.invocations().next().unwrap();
        assert!(invocation.output.starts_with("Error: Tool not found"));
    }

    #[tokio::test]
    async fn tool_calls_are_ignored_when_tools_disabled() {
        let provider = ScriptedProvider::new(vec![tool_step(vec![tool_call(
            "c1",
            "query_portfolio",
            json!({"table": "about"}),
        )])]);
        let (mut sink, _rx) = StreamSink::channel(64);

        let outcome = Generation::text_only(&provider)
            .run(&params(), vec![Message::user("x")], &mut sink.phase("answer"))
            .await
            .unwrap();
        assert!(!outcome.used_tools());
        assert_eq!(outcome.text(), "");
    }

    #[tokio::test]
    async fn stream_error_propagates() {
        let provider = ScriptedProvider::new(vec![Script::BrokenMidway("partial".into())]);
        let (mut sink, _rx) = StreamSink::channel(64);

        let err = Generation::text_only(&provider)
            .run(&params(), vec![Message::user("x")], &mut sink.phase("answer"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::StreamInterrupted(_)));
        assert!(sink.has_open_span());
    }
}
