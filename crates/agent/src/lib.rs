//! The chat pipeline of foliobot.
//!
//! A request flows through three stages:
//!
//! 1. **Configure**: [`ConfigLoader`] reads the active assistant config (model,
//!    prompt, parameters, context blocks, skills) or falls back to defaults
//! 2. **Retrieve**: the model runs with the portfolio query tool enabled and
//!    decides what data it needs
//! 3. **Answer**: if tools were used, or nothing was said, a second,
//!    tool-free generation writes the final answer from the retrieved data
//!
//! Both generations write into one [`StreamSink`], which keeps the event
//! stream well formed and guarantees a single terminal `finish` event.

pub mod config_loader;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod sink;

#[cfg(test)]
mod test_helpers;

pub use config_loader::{ConfigLoader, ConfigSource, RuntimeConfig};
pub use generation::{Generation, GenerationOutcome, GenerationParams};
pub use orchestrator::{
    OrchestratorError, OrchestratorSettings, Phase, RunSummary, TwoPhaseOrchestrator,
};
pub use sink::{PhaseWriter, StreamSink};
