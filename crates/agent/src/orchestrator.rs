//! Two-phase, tool-augmented response orchestration.
//!
//! ```text
//!  load config ─▶ retrieval phase (tools on) ─┬─ no tools + text ─────────▶ finish(phase 1 reason)
//!                                             └─▶ answer phase (tools off) ─┬─ text ──▶ finish(phase 2 reason)
//!                                                                           └─ empty ─▶ fallback, finish(stop)
//!  any failure ─▶ close open span, fallback, finish(error)
//! ```
//!
//! Both phases write into one [`StreamSink`]; the orchestrator alone emits
//! the terminal `finish` event, once, on every path.

use foliobot_core::conversation::{ConversationMessage, latest_user_text, to_provider_messages};
use foliobot_core::error::ProviderError;
use foliobot_core::message::Message;
use foliobot_core::provider::Provider;
use foliobot_core::request::LogContext;
use foliobot_core::stream::{FinishReason, StreamEvent};
use foliobot_core::tool::ToolRegistry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};

use crate::config_loader::{ConfigLoader, ConfigSource};
use crate::generation::{Generation, GenerationParams};
use crate::prompts::{
    ANSWER_SUFFIX, FALLBACK_TEXT, RETRIEVAL_SUFFIX, collect_tool_text, compose_answer_prompt,
    with_suffix,
};
use crate::sink::StreamSink;

/// Span id namespace for injected fallback text.
const FALLBACK_NAMESPACE: &str = "fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Retrieval,
    Answer,
}

impl Phase {
    /// Span id namespace for this phase's text.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Answer => "answer",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.namespace())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{phase} phase generation failed: {source}")]
    Generation {
        phase: Phase,
        #[source]
        source: ProviderError,
    },

    #[error("orchestration panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Model steps allowed in the retrieval phase.
    pub max_retrieval_steps: u32,
    /// Cap on tool output characters handed to the answer phase.
    pub tool_context_char_limit: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retrieval_steps: 5,
            tool_context_char_limit: 12_000,
        }
    }
}

/// How a run went, for logs and tests.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub finish_reason: FinishReason,
    pub config_source: Option<ConfigSource>,
    pub used_tools: bool,
    pub answer_phase_ran: bool,
    pub fallback_injected: bool,
}

pub struct TwoPhaseOrchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config_loader: Arc<ConfigLoader>,
    settings: OrchestratorSettings,
}

impl TwoPhaseOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config_loader: Arc<ConfigLoader>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            config_loader,
            settings,
        }
    }

    /// Start a run in the background and return its event stream.
    ///
    /// The task inherits the caller's current tracing span.
    pub fn stream(
        self: &Arc<Self>,
        messages: Vec<ConversationMessage>,
        ctx: LogContext,
    ) -> mpsc::Receiver<StreamEvent> {
        let (sink, rx) = StreamSink::channel(128);
        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                this.run(&messages, &ctx, sink).await;
            }
            .in_current_span(),
        );
        rx
    }

    /// Run to completion, writing into `sink`. Always ends with exactly one
    /// `finish` event.
    pub async fn run(
        &self,
        messages: &[ConversationMessage],
        ctx: &LogContext,
        mut sink: StreamSink,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let outcome = AssertUnwindSafe(self.respond(messages, ctx, &mut sink, &mut summary))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                Err(OrchestratorError::Panicked(message))
            });

        summary.finish_reason = match outcome {
            Ok(reason) => reason,
            Err(e) => {
                error!(request_id = %ctx, error = %e, "Orchestration failed, sending fallback");
                sink.close_open_span().await;
                sink.inject_text(FALLBACK_NAMESPACE, FALLBACK_TEXT).await;
                summary.fallback_injected = true;
                FinishReason::Error
            }
        };

        sink.finish(summary.finish_reason).await;

        info!(
            request_id = %ctx,
            finish_reason = %summary.finish_reason,
            used_tools = summary.used_tools,
            answer_phase = summary.answer_phase_ran,
            fallback = summary.fallback_injected,
            duration_ms = started.elapsed().as_millis() as u64,
            "Chat response finished"
        );

        summary
    }

    async fn respond(
        &self,
        messages: &[ConversationMessage],
        ctx: &LogContext,
        sink: &mut StreamSink,
        summary: &mut RunSummary,
    ) -> Result<FinishReason, OrchestratorError> {
        let config = self.config_loader.load(ctx).await;
        summary.config_source = Some(config.source);
        let params = GenerationParams::from(&config);

        // Phase 1: retrieval, tools enabled, full conversation
        info!(request_id = %ctx, phase = %Phase::Retrieval, model = %params.model, "Phase started");
        let mut transcript = vec![Message::system(with_suffix(
            &config.system_prompt,
            RETRIEVAL_SUFFIX,
        ))];
        transcript.extend(to_provider_messages(messages));

        let retrieval = Generation::with_tools(
            self.provider.as_ref(),
            &self.tools,
            self.settings.max_retrieval_steps,
        )
        .run(&params, transcript, &mut sink.phase(Phase::Retrieval.namespace()))
        .await
        .map_err(|source| OrchestratorError::Generation {
            phase: Phase::Retrieval,
            source,
        })?;

        let retrieval_text = retrieval.text();
        summary.used_tools = retrieval.used_tools();
        info!(
            request_id = %ctx,
            phase = %Phase::Retrieval,
            steps = retrieval.steps.len(),
            used_tools = summary.used_tools,
            text_len = retrieval_text.trim().len(),
            finish_reason = %retrieval.finish_reason(),
            "Phase finished"
        );

        if !summary.used_tools && !retrieval_text.trim().is_empty() {
            info!(request_id = %ctx, "No retrieval needed, skipping answer phase");
            return Ok(retrieval.finish_reason());
        }

        // Phase 2: final answer, tools disabled, composed prompt only
        summary.answer_phase_ran = true;
        let user_request = latest_user_text(messages).unwrap_or_default();
        let tool_text = collect_tool_text(
            retrieval.invocations(),
            self.settings.tool_context_char_limit,
        );

        info!(
            request_id = %ctx,
            phase = %Phase::Answer,
            tool_text_len = tool_text.as_deref().map_or(0, str::len),
            "Phase started"
        );
        let transcript = vec![
            Message::system(with_suffix(&config.system_prompt, ANSWER_SUFFIX)),
            Message::user(compose_answer_prompt(&user_request, tool_text.as_deref())),
        ];

        let answer = Generation::text_only(self.provider.as_ref())
            .run(&params, transcript, &mut sink.phase(Phase::Answer.namespace()))
            .await
            .map_err(|source| OrchestratorError::Generation {
                phase: Phase::Answer,
                source,
            })?;

        let answer_text = answer.text();
        info!(
            request_id = %ctx,
            phase = %Phase::Answer,
            text_len = answer_text.trim().len(),
            finish_reason = %answer.finish_reason(),
            "Phase finished"
        );

        if answer_text.trim().is_empty() {
            warn!(request_id = %ctx, reason = "empty final answer", "Sending fallback text");
            sink.inject_text(FALLBACK_NAMESPACE, FALLBACK_TEXT).await;
            summary.fallback_injected = true;
            return Ok(FinishReason::Stop);
        }

        Ok(answer.finish_reason())
    }
}
