//! Tools available to the foliobot assistant.
//!
//! The assistant has one tool: [`PortfolioQueryTool`], a bounded read over
//! the public portfolio tables.

pub mod portfolio_query;

use foliobot_core::store::ContentStore;
use foliobot_core::tool::ToolRegistry;
use std::sync::Arc;

pub use portfolio_query::PortfolioQueryTool;

/// The registry the orchestrator hands to its retrieval phase.
pub fn default_registry(store: Arc<dyn ContentStore>, default_limit: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(
        PortfolioQueryTool::new(store).with_default_limit(default_limit),
    ));
    registry
}
