//! `foliobot migrate`: create or update the portfolio database schema.

use foliobot_config::AppConfig;
use foliobot_stores::SqliteStore;

pub async fn run(database_url: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let url = database_url.unwrap_or(config.database.url);

    println!("Migrating {url}");
    let store = SqliteStore::open(&url).await?;

    for (table, rows) in store.table_counts().await? {
        println!("   {table:<26} {rows:>6} rows");
    }
    println!("Schema is up to date.");

    Ok(())
}
