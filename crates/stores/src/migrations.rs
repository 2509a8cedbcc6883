//! Schema for the portfolio database.
//!
//! Every statement is idempotent; migrations run on each open.

use foliobot_core::error::StoreError;
use sqlx::SqlitePool;
use tracing::debug;

/// `(label, statement)` pairs, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "projects table",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            description  TEXT,
            technologies TEXT,
            url          TEXT,
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        "#,
    ),
    (
        "skills table",
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            category    TEXT,
            proficiency INTEGER
        )
        "#,
    ),
    (
        "experiences table",
        r#"
        CREATE TABLE IF NOT EXISTS experiences (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            company     TEXT NOT NULL,
            position    TEXT NOT NULL,
            description TEXT,
            start_date  TEXT,
            end_date    TEXT
        )
        "#,
    ),
    (
        "education table",
        r#"
        CREATE TABLE IF NOT EXISTS education (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            institution TEXT NOT NULL,
            degree      TEXT,
            field       TEXT,
            start_date  TEXT,
            end_date    TEXT
        )
        "#,
    ),
    (
        "about table",
        r#"
        CREATE TABLE IF NOT EXISTS about (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            name     TEXT NOT NULL,
            tagline  TEXT,
            bio      TEXT,
            email    TEXT,
            location TEXT
        )
        "#,
    ),
    (
        "assistant_configs table",
        r#"
        CREATE TABLE IF NOT EXISTS assistant_configs (
            id                TEXT PRIMARY KEY NOT NULL,
            model             TEXT NOT NULL,
            base_prompt       TEXT NOT NULL,
            temperature       REAL,
            top_p             REAL,
            max_output_tokens INTEGER,
            enabled           INTEGER NOT NULL DEFAULT 1,
            updated_at        TEXT NOT NULL
        )
        "#,
    ),
    (
        "assistant_context_blocks table",
        r#"
        CREATE TABLE IF NOT EXISTS assistant_context_blocks (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            config_id  TEXT NOT NULL REFERENCES assistant_configs(id) ON DELETE CASCADE,
            title      TEXT NOT NULL,
            content    TEXT NOT NULL,
            sort_index INTEGER NOT NULL DEFAULT 0,
            enabled    INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "assistant_skills table",
        r#"
        CREATE TABLE IF NOT EXISTS assistant_skills (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            config_id    TEXT NOT NULL REFERENCES assistant_configs(id) ON DELETE CASCADE,
            name         TEXT NOT NULL,
            description  TEXT,
            instructions TEXT NOT NULL,
            sort_index   INTEGER NOT NULL DEFAULT 0,
            enabled      INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "assistant_configs index",
        "CREATE INDEX IF NOT EXISTS idx_assistant_configs_updated ON assistant_configs(enabled, updated_at DESC)",
    ),
];

/// Names of the tables the migrations create.
pub const TABLES: &[&str] = &[
    "projects",
    "skills",
    "experiences",
    "education",
    "about",
    "assistant_configs",
    "assistant_context_blocks",
    "assistant_skills",
];

pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    for (label, sql) in MIGRATIONS {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{label}: {e}")))?;
    }
    debug!(steps = MIGRATIONS.len(), "SQLite migrations complete");
    Ok(())
}
