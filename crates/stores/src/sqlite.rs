//! SQLite-backed portfolio database.
//!
//! One database file holds the public content tables (read by the retrieval
//! tool) and the admin-managed assistant configuration (read by the config
//! loader). [`SqliteStore`] implements both read contracts over one pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foliobot_core::error::StoreError;
use foliobot_core::store::{
    AssistantConfigRecord, ConfigStore, ContentQuery, ContentStore, ContextBlock, Row as JsonRow,
    SkillEntry,
};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{debug, info};

use crate::migrations;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `url` (e.g. `sqlite:///home/me/.foliobot/portfolio.db`),
    /// creating the file and its parent directory if needed, and run migrations.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!(url = %url, "Portfolio database ready");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts for every table, for diagnostics.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, StoreError> {
        let mut counts = Vec::with_capacity(migrations::TABLES.len());
        for table in migrations::TABLES {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
                .fetch_one(&self.pool)
                .await
                .map_err(query_failed(table))?;
            let count: i64 = row.try_get("cnt").map_err(query_failed(table))?;
            counts.push((*table, count));
        }
        Ok(counts)
    }

    /// SQL and bind values for a content read.
    ///
    /// The table and column names come from the closed [`Collection`] enum,
    /// never from input; the search text is always bound.
    ///
    /// [`Collection`]: foliobot_core::Collection
    fn select_sql(query: &ContentQuery) -> (String, Option<String>) {
        let mut sql = format!("SELECT * FROM {}", query.collection.table_name());

        let pattern = query.search.as_ref().map(|s| {
            let escaped = s
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });

        if pattern.is_some() {
            let clauses: Vec<String> = query
                .collection
                .search_columns()
                .iter()
                .map(|col| format!("lower(coalesce({col}, '')) LIKE ?1 ESCAPE '\\'"))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" OR "));
        }

        sql.push_str(" ORDER BY id LIMIT ?2");
        (sql, pattern)
    }
}

fn query_failed(table: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::QueryFailed {
        table: table.to_string(),
        reason: e.to_string(),
    }
}

/// Convert a row of any content table into JSON, by storage class.
fn row_to_json(row: &SqliteRow) -> Result<JsonRow, sqlx::Error> {
    let mut out = JsonRow::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                // Binary columns carry nothing a text answer can use
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl ContentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn select(&self, query: &ContentQuery) -> Result<Vec<JsonRow>, StoreError> {
        let table = query.collection.table_name();
        let (sql, pattern) = Self::select_sql(query);

        // ?1 must always be bound for ?2 to be positional
        let rows = sqlx::query(&sql)
            .bind(pattern.unwrap_or_default())
            .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed(table))?;

        let rows = rows
            .iter()
            .map(row_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed(table))?;

        debug!(table, rows = rows.len(), "Content select");
        Ok(rows)
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn active_config(&self) -> Result<Option<AssistantConfigRecord>, StoreError> {
        const TABLE: &str = "assistant_configs";

        let row = sqlx::query(
            r#"
            SELECT id, model, base_prompt, temperature, top_p, max_output_tokens, enabled, updated_at
            FROM assistant_configs
            WHERE enabled = 1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed(TABLE))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let temperature: Option<f64> = row.try_get("temperature").map_err(query_failed(TABLE))?;
        let top_p: Option<f64> = row.try_get("top_p").map_err(query_failed(TABLE))?;
        let max_output_tokens: Option<i64> =
            row.try_get("max_output_tokens").map_err(query_failed(TABLE))?;
        let updated_at: String = row.try_get("updated_at").map_err(query_failed(TABLE))?;

        Ok(Some(AssistantConfigRecord {
            id: row.try_get("id").map_err(query_failed(TABLE))?,
            model: row.try_get("model").map_err(query_failed(TABLE))?,
            base_prompt: row.try_get("base_prompt").map_err(query_failed(TABLE))?,
            temperature: temperature.map(|t| t as f32),
            top_p: top_p.map(|p| p as f32),
            max_output_tokens: max_output_tokens.and_then(|m| u32::try_from(m).ok()),
            enabled: row.try_get("enabled").map_err(query_failed(TABLE))?,
            updated_at: parse_timestamp(&updated_at),
        }))
    }

    async fn context_blocks(&self, config_id: &str) -> Result<Vec<ContextBlock>, StoreError> {
        const TABLE: &str = "assistant_context_blocks";

        let rows = sqlx::query(
            r#"
            SELECT title, content, sort_index
            FROM assistant_context_blocks
            WHERE config_id = ?1 AND enabled = 1
            ORDER BY sort_index ASC, id ASC
            "#,
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed(TABLE))?;

        rows.iter()
            .map(|row| {
                Ok(ContextBlock {
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    sort_index: row.try_get("sort_index")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(query_failed(TABLE))
    }

    async fn skills(&self, config_id: &str) -> Result<Vec<SkillEntry>, StoreError> {
        const TABLE: &str = "assistant_skills";

        let rows = sqlx::query(
            r#"
            SELECT name, description, instructions, sort_index
            FROM assistant_skills
            WHERE config_id = ?1 AND enabled = 1
            ORDER BY sort_index ASC, id ASC
            "#,
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed(TABLE))?;

        rows.iter()
            .map(|row| {
                Ok(SkillEntry {
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    instructions: row.try_get("instructions")?,
                    sort_index: row.try_get("sort_index")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(query_failed(TABLE))
    }
}
