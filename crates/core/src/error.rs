//! Error types for the foliobot domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own enum; crates further out (config, agent, terminal) define
//! theirs next to the code that raises them.

use thiserror::Error;

/// Failures talking to an LLM backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the content and config stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query on {table} failed: {reason}")]
    QueryFailed { table: String, reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn store_error_names_the_table() {
        let err = StoreError::QueryFailed {
            table: "projects".into(),
            reason: "no such column: title".into(),
        };
        assert!(err.to_string().contains("projects"));
        assert!(err.to_string().contains("no such column"));
    }

    #[test]
    fn tool_error_names_the_tool() {
        let err = ToolError::ExecutionFailed {
            tool_name: "query_portfolio".into(),
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "Tool execution failed: query_portfolio: timeout");
    }
}
