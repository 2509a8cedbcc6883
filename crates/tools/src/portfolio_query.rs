//! Portfolio query tool: lets the model read the public portfolio tables.
//!
//! Failures never surface as errors: bad arguments and store failures come
//! back as ordinary tool output starting with `Error querying …`, so the
//! model can read them and answer anyway.

use async_trait::async_trait;
use foliobot_core::error::ToolError;
use foliobot_core::store::{Collection, ContentQuery, ContentStore};
use foliobot_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Upper bound on rows per call, whatever the model asks for.
const MAX_ROWS: usize = 50;

pub struct PortfolioQueryTool {
    store: Arc<dyn ContentStore>,
    default_limit: usize,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    table: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl PortfolioQueryTool {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            default_limit: 5,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_ROWS);
        self
    }

    fn failure(table: &str, reason: impl std::fmt::Display) -> ToolResult {
        ToolResult {
            call_id: String::new(),
            success: false,
            output: format!("Error querying {table}: {reason}"),
            data: None,
        }
    }
}

#[async_trait]
impl Tool for PortfolioQueryTool {
    fn name(&self) -> &str {
        "query_portfolio"
    }

    fn description(&self) -> &str {
        "Read rows from the portfolio database. Tables: projects, skills, experiences, \
         education, about. Use `query` for a case-insensitive keyword filter and `limit` \
         to bound the number of rows."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let tables: Vec<&str> = Collection::ALL.iter().map(|c| c.table_name()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "enum": tables,
                    "description": "Which portfolio table to read"
                },
                "query": {
                    "type": "string",
                    "description": "Optional keyword to match against the table's text columns"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_ROWS,
                    "description": format!("Maximum rows to return (default {})", self.default_limit)
                }
            },
            "required": ["table"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let started = Instant::now();

        let args: QueryArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => {
                let table = arguments["table"].as_str().unwrap_or("unknown table");
                warn!(tool = "query_portfolio", table, reason = %e, "Portfolio query rejected");
                return Ok(Self::failure(table, format!("invalid arguments: {e}")));
            }
        };

        let collection: Collection = match args.table.parse() {
            Ok(c) => c,
            Err(reason) => {
                warn!(tool = "query_portfolio", table = %args.table, %reason, "Portfolio query rejected");
                return Ok(Self::failure(&args.table, reason));
            }
        };

        let limit = args
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_ROWS);
        let query = ContentQuery::new(collection, args.query.as_deref(), limit);

        info!(
            tool = "query_portfolio",
            table = %collection,
            query = query.search.as_deref().unwrap_or(""),
            limit,
            store = self.store.name(),
            "Portfolio query started"
        );

        match self.store.select(&query).await {
            Ok(rows) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    tool = "query_portfolio",
                    table = %collection,
                    rows = rows.len(),
                    duration_ms,
                    "Portfolio query succeeded"
                );

                let data = serde_json::Value::Array(
                    rows.into_iter().map(serde_json::Value::Object).collect(),
                );
                Ok(ToolResult {
                    call_id: String::new(),
                    success: true,
                    output: data.to_string(),
                    data: Some(data),
                })
            }
            Err(e) => {
                warn!(
                    tool = "query_portfolio",
                    table = %collection,
                    reason = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Portfolio query failed"
                );
                Ok(Self::failure(collection.table_name(), e))
            }
        }
    }
}
