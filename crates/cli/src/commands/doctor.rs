//! `foliobot doctor`: diagnose configuration, provider and database.

use foliobot_agent::{ConfigLoader, ConfigSource};
use foliobot_config::AppConfig;
use foliobot_core::request::LogContext;
use foliobot_stores::SqliteStore;
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("foliobot doctor: system diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = match AppConfig::load() {
        Ok(config) => {
            if config_path.exists() {
                println!("  [ok]   Config file valid ({})", config_path.display());
            } else {
                println!("  [ok]   No config file, using defaults ({} not found)", config_path.display());
            }
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found. Fix the config and run doctor again.");
            return Ok(());
        }
    };

    let providers = foliobot_providers::build_from_config(&config);
    println!(
        "  [ok]   Default provider: {} (registered: {})",
        providers.default_name(),
        providers.list().join(", ")
    );
    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key: set FOLIOBOT_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    match SqliteStore::open(&config.database.url).await {
        Ok(store) => {
            println!("  [ok]   Database reachable ({})", config.database.url);
            match store.table_counts().await {
                Ok(counts) => {
                    let summary: Vec<String> = counts
                        .iter()
                        .map(|(table, rows)| format!("{table}={rows}"))
                        .collect();
                    println!("         {}", summary.join(" "));
                }
                Err(e) => {
                    println!("  [warn] Could not count rows: {e}");
                    issues += 1;
                }
            }

            let runtime = ConfigLoader::new(Arc::new(store))
                .load(&LogContext::generate())
                .await;
            match runtime.source {
                ConfigSource::Database => println!(
                    "  [ok]   Assistant config from database: model {}, {} context block(s), {} skill(s)",
                    runtime.model, runtime.context_block_count, runtime.skill_count
                ),
                ConfigSource::Fallback => {
                    println!("  [warn] No enabled assistant config, using fallback model {}", runtime.model);
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  [fail] Database unreachable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
