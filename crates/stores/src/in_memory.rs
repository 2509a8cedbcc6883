//! In-memory stores: useful for testing and for running without a database.

use async_trait::async_trait;
use foliobot_core::error::StoreError;
use foliobot_core::store::{
    AssistantConfigRecord, Collection, ConfigStore, ContentQuery, ContentStore, ContextBlock, Row,
    SkillEntry,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Content tables held as vectors of JSON rows, in insertion order.
#[derive(Default)]
pub struct InMemoryContentStore {
    tables: RwLock<HashMap<Collection, Vec<Row>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, collection: Collection, row: Row) {
        self.tables
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(row);
    }

    /// Insert a row given as a JSON object. Non-object values are ignored.
    pub async fn insert_json(&self, collection: Collection, value: serde_json::Value) {
        if let serde_json::Value::Object(row) = value {
            self.insert(collection, row).await;
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn select(&self, query: &ContentQuery) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&query.collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.matches(row))
                    .take(query.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

struct Owned<T> {
    config_id: String,
    enabled: bool,
    item: T,
}

/// Assistant configuration held in memory.
#[derive(Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<Vec<AssistantConfigRecord>>,
    blocks: RwLock<Vec<Owned<ContextBlock>>>,
    skills: RwLock<Vec<Owned<SkillEntry>>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_config(&self, record: AssistantConfigRecord) {
        self.configs.write().await.push(record);
    }

    pub async fn add_context_block(&self, config_id: &str, block: ContextBlock, enabled: bool) {
        self.blocks.write().await.push(Owned {
            config_id: config_id.to_string(),
            enabled,
            item: block,
        });
    }

    pub async fn add_skill(&self, config_id: &str, skill: SkillEntry, enabled: bool) {
        self.skills.write().await.push(Owned {
            config_id: config_id.to_string(),
            enabled,
            item: skill,
        });
    }
}

fn enabled_for<T: Clone>(
    items: &[Owned<T>],
    config_id: &str,
    sort_key: impl Fn(&T) -> i64,
) -> Vec<T> {
    let mut out: Vec<T> = items
        .iter()
        .filter(|o| o.enabled && o.config_id == config_id)
        .map(|o| o.item.clone())
        .collect();
    // Stable, so equal indexes keep insertion order
    out.sort_by_key(|item| sort_key(item));
    out
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn active_config(&self) -> Result<Option<AssistantConfigRecord>, StoreError> {
        Ok(self
            .configs
            .read()
            .await
            .iter()
            .filter(|c| c.enabled)
            .max_by_key(|c| c.updated_at)
            .cloned())
    }

    async fn context_blocks(&self, config_id: &str) -> Result<Vec<ContextBlock>, StoreError> {
        Ok(enabled_for(&self.blocks.read().await, config_id, |b| {
            b.sort_index
        }))
    }

    async fn skills(&self, config_id: &str) -> Result<Vec<SkillEntry>, StoreError> {
        Ok(enabled_for(&self.skills.read().await, config_id, |s| {
            s.sort_index
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(id: &str, enabled: bool, year: i32) -> AssistantConfigRecord {
        AssistantConfigRecord {
            id: id.into(),
            model: format!("model-{id}"),
            base_prompt: "prompt".into(),
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            enabled,
            updated_at: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn select_filters_and_limits() {
        let store = InMemoryContentStore::new();
        for name in ["Rust", "TypeScript", "Rust async"] {
            store.insert_json(Collection::Skills, json!({ "name": name })).await;
        }

        let all = store
            .select(&ContentQuery::new(Collection::Skills, None, 10))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let rust = store
            .select(&ContentQuery::new(Collection::Skills, Some("rust"), 1))
            .await
            .unwrap();
        assert_eq!(rust.len(), 1);
        assert_eq!(rust[0]["name"], "Rust");

        let empty = store
            .select(&ContentQuery::new(Collection::Projects, None, 5))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn active_config_picks_latest_enabled() {
        let store = InMemoryConfigStore::new();
        store.add_config(record("a", true, 2023)).await;
        store.add_config(record("b", true, 2025)).await;
        store.add_config(record("c", false, 2026)).await;

        let active = store.active_config().await.unwrap().unwrap();
        assert_eq!(active.id, "b");
    }

    #[tokio::test]
    async fn lists_are_enabled_scoped_and_sorted() {
        let store = InMemoryConfigStore::new();
        let block = |title: &str, idx| ContextBlock {
            title: title.into(),
            content: "c".into(),
            sort_index: idx,
        };
        store.add_context_block("a", block("two", 2), true).await;
        store.add_context_block("a", block("one", 1), true).await;
        store.add_context_block("a", block("off", 0), false).await;
        store.add_context_block("b", block("other", 0), true).await;

        let titles: Vec<String> = store
            .context_blocks("a")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["one", "two"]);
        assert!(store.skills("a").await.unwrap().is_empty());
    }
}
