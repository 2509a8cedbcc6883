//! Per-request assistant configuration.
//!
//! The admin-managed configuration (model, base prompt, generation
//! parameters, context blocks and skills) is read fresh for every request.
//! Nothing here is fatal: a missing or unreachable config store yields the
//! built-in fallback, and a failing context or skill list degrades to empty.

use foliobot_core::request::LogContext;
use foliobot_core::store::{ConfigStore, ContextBlock, SkillEntry};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Model used when no configuration is stored.
pub const FALLBACK_MODEL: &str = "openai/gpt-4o-mini";

/// System prompt used when no configuration is stored.
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are the assistant on a personal portfolio \
website. Answer questions about the owner's projects, skills, work experience, education \
and background. Be friendly and concise. Only state facts you can support from the \
portfolio data; if something is not covered, say so.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Database,
    Fallback,
}

/// The configuration one request runs with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub source: ConfigSource,
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub context_block_count: usize,
    pub skill_count: usize,
}

impl RuntimeConfig {
    pub fn fallback() -> Self {
        Self {
            source: ConfigSource::Fallback,
            model: FALLBACK_MODEL.into(),
            system_prompt: FALLBACK_SYSTEM_PROMPT.into(),
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            context_block_count: 0,
            skill_count: 0,
        }
    }
}

pub struct ConfigLoader {
    store: Option<Arc<dyn ConfigStore>>,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A loader with no store; every load returns the fallback.
    pub fn fallback_only() -> Self {
        Self { store: None }
    }

    pub async fn load(&self, ctx: &LogContext) -> RuntimeConfig {
        let Some(store) = &self.store else {
            info!(request_id = %ctx, reason = "no config store", "Using fallback assistant config");
            return RuntimeConfig::fallback();
        };

        let record = match store.active_config().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(request_id = %ctx, reason = "no enabled config", "Using fallback assistant config");
                return RuntimeConfig::fallback();
            }
            Err(e) => {
                warn!(request_id = %ctx, reason = %e, "Config store failed, using fallback assistant config");
                return RuntimeConfig::fallback();
            }
        };

        let (blocks, skills) = tokio::join!(
            store.context_blocks(&record.id),
            store.skills(&record.id)
        );

        let blocks = blocks.unwrap_or_else(|e| {
            warn!(request_id = %ctx, config_id = %record.id, list = "context_blocks", reason = %e, "Context list unavailable, continuing without it");
            Vec::new()
        });
        let skills = skills.unwrap_or_else(|e| {
            warn!(request_id = %ctx, config_id = %record.id, list = "skills", reason = %e, "Context list unavailable, continuing without it");
            Vec::new()
        });

        let config = RuntimeConfig {
            source: ConfigSource::Database,
            model: record.model,
            system_prompt: build_system_prompt(&record.base_prompt, &blocks, &skills),
            temperature: record.temperature,
            top_p: record.top_p,
            max_output_tokens: record.max_output_tokens,
            context_block_count: blocks.len(),
            skill_count: skills.len(),
        };

        info!(
            request_id = %ctx,
            source = "database",
            model = %config.model,
            context_blocks = config.context_block_count,
            skills = config.skill_count,
            "Assistant config loaded"
        );

        config
    }
}

/// Base prompt, then a numbered "Portfolio Context" section, then a numbered
/// "Assistant Skills" section. Empty sections are omitted.
pub fn build_system_prompt(base: &str, blocks: &[ContextBlock], skills: &[SkillEntry]) -> String {
    let mut prompt = base.trim_end().to_string();

    if !blocks.is_empty() {
        prompt.push_str("\n\n## Portfolio Context");
        for (i, block) in blocks.iter().enumerate() {
            let _ = write!(prompt, "\n\n{}. {}\n{}", i + 1, block.title, block.content.trim());
        }
    }

    if !skills.is_empty() {
        prompt.push_str("\n\n## Assistant Skills");
        for (i, skill) in skills.iter().enumerate() {
            let _ = match skill.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                Some(description) => write!(prompt, "\n\n{}. {}: {}", i + 1, skill.name, description),
                None => write!(prompt, "\n\n{}. {}", i + 1, skill.name),
            };
            let _ = write!(prompt, "\n{}", skill.instructions.trim());
        }
    }

    prompt.trim_end().to_string()
}
