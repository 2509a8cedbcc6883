//! Read contracts of the portfolio database.
//!
//! Two stores back the assistant:
//! - [`ContentStore`]: the portfolio tables the retrieval tool reads
//! - [`ConfigStore`]: the admin-managed assistant configuration
//!
//! Both are passed in explicitly as `Arc<dyn …>` so tests can substitute
//! in-memory or failing stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A row as read from a content table, column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The portfolio tables the assistant may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Projects,
    Skills,
    Experiences,
    Education,
    About,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Self::Projects,
        Self::Skills,
        Self::Experiences,
        Self::Education,
        Self::About,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Skills => "skills",
            Self::Experiences => "experiences",
            Self::Education => "education",
            Self::About => "about",
        }
    }

    /// Columns a free-text query is matched against.
    pub fn search_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Projects => &["title", "description"],
            Self::Skills => &["name"],
            Self::Experiences => &["company", "position", "description"],
            Self::Education => &["institution", "degree", "field"],
            Self::About => &["name", "bio", "tagline"],
        }
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.table_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown table '{s}'"))
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A bounded read against one content table.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub collection: Collection,

    /// Case-insensitive substring, OR-matched across
    /// [`Collection::search_columns`]. `None` reads unfiltered.
    pub search: Option<String>,

    pub limit: usize,
}

impl ContentQuery {
    pub fn new(collection: Collection, search: Option<&str>, limit: usize) -> Self {
        Self {
            collection,
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            limit,
        }
    }

    /// Whether `row` satisfies the search filter. Used by stores that filter
    /// in process.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(needle) = &self.search else {
            return true;
        };
        let needle = needle.to_lowercase();
        self.collection.search_columns().iter().any(|col| {
            row.get(*col)
                .and_then(|v| v.as_str())
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        })
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    fn name(&self) -> &str;

    async fn select(&self, query: &ContentQuery) -> Result<Vec<Row>, StoreError>;
}

/// An assistant configuration as the admin saved it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfigRecord {
    pub id: String,
    pub model: String,
    pub base_prompt: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    pub title: String,
    pub content: String,
    pub sort_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub sort_index: i64,
}

/// Read contract for assistant configuration.
///
/// Implementations return only enabled rows; lists come back ordered by
/// `sort_index` ascending.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The most recently updated enabled configuration, if any.
    async fn active_config(&self) -> Result<Option<AssistantConfigRecord>, StoreError>;

    async fn context_blocks(&self, config_id: &str) -> Result<Vec<ContextBlock>, StoreError>;

    async fn skills(&self, config_id: &str) -> Result<Vec<SkillEntry>, StoreError>;
}
