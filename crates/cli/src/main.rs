//! foliobot CLI: the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP gateway with the streaming chat endpoint
//! - `chat`     Terminal chat session against a running gateway
//! - `migrate`  Create or update the portfolio database schema
//! - `doctor`   Diagnose configuration, provider and database

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "foliobot",
    about = "foliobot: a streaming, tool-augmented portfolio assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant from the terminal
    Chat {
        /// Chat endpoint to use instead of the configured one
        #[arg(short, long, env = "FOLIOBOT_ENDPOINT")]
        endpoint: Option<String>,
    },

    /// Create or update the database schema
    Migrate {
        /// Database URL to use instead of the configured one
        #[arg(long)]
        database_url: Option<String>,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so the chat REPL keeps stdout to itself
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { endpoint } => commands::chat::run(endpoint).await?,
        Commands::Migrate { database_url } => commands::migrate::run(database_url).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
