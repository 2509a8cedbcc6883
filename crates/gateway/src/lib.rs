//! HTTP gateway for foliobot.
//!
//! Exposes the streaming chat endpoint and a health check:
//!
//! - `POST /api/chat` streams the response as server-sent events
//! - `GET  /health` reports liveness and version
//!
//! Built on Axum; every collaborator of the chat pipeline is assembled once at
//! startup and shared through [`GatewayState`].

pub mod chat;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use foliobot_agent::{ConfigLoader, OrchestratorSettings, TwoPhaseOrchestrator};
use foliobot_config::{AppConfig, AssistantConfig, Environment, GatewayConfig};
use foliobot_core::provider::Provider;
use foliobot_core::store::{ConfigStore, ContentStore};
use foliobot_stores::{SqliteStore, UnavailableStore};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<TwoPhaseOrchestrator>,
    pub environment: Environment,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static(chat::REQUEST_ID_HEADER)])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Open the configured database as both content and config store.
///
/// An unreachable database is not fatal: reads fail per request, which the
/// pipeline already degrades around (fallback config, tool error text).
pub async fn open_stores(url: &str) -> (Arc<dyn ContentStore>, Arc<dyn ConfigStore>) {
    match SqliteStore::open(url).await {
        Ok(store) => {
            let store = Arc::new(store);
            let content: Arc<dyn ContentStore> = store.clone();
            let config: Arc<dyn ConfigStore> = store;
            (content, config)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Database unavailable, serving with fallback config");
            let store = Arc::new(UnavailableStore::new(e.to_string()));
            let content: Arc<dyn ContentStore> = store.clone();
            let config: Arc<dyn ConfigStore> = store;
            (content, config)
        }
    }
}

/// Wire the orchestrator from its collaborators.
pub fn build_orchestrator(
    provider: Arc<dyn Provider>,
    content: Arc<dyn ContentStore>,
    config_store: Arc<dyn ConfigStore>,
    assistant: &AssistantConfig,
) -> Arc<TwoPhaseOrchestrator> {
    let tools = foliobot_tools::default_registry(content, assistant.default_row_limit);
    Arc::new(TwoPhaseOrchestrator::new(
        provider,
        Arc::new(tools),
        Arc::new(ConfigLoader::new(config_store)),
        OrchestratorSettings {
            max_retrieval_steps: assistant.max_retrieval_steps,
            tool_context_char_limit: assistant.tool_context_char_limit,
        },
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let providers = foliobot_providers::build_from_config(&config);
    let provider = providers
        .default_provider()
        .ok_or("No default provider configured, set an API key")?;
    if !config.has_api_key() {
        warn!(provider = %providers.default_name(), "No API key configured, generation requests will fail");
    }

    let (content, config_store) = open_stores(&config.database.url).await;
    let orchestrator = build_orchestrator(provider, content, config_store, &config.assistant);

    let state = Arc::new(GatewayState {
        orchestrator,
        environment: config.environment,
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, provider = %providers.default_name(), environment = ?config.environment, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use foliobot_core::error::ProviderError;
    use foliobot_core::message::Message;
    use foliobot_core::provider::{ProviderRequest, ProviderResponse};
    use foliobot_core::stream::FinishReason;
    use foliobot_stores::{InMemoryConfigStore, InMemoryContentStore};

    /// Answers every request with the same text.
    pub struct CannedProvider(pub &'static str);

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.0),
                usage: None,
                model: "canned-model".into(),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    pub fn test_state(environment: Environment) -> SharedState {
        let orchestrator = build_orchestrator(
            Arc::new(CannedProvider("Hello from the portfolio assistant.")),
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryConfigStore::new()),
            &AssistantConfig::default(),
        );
        Arc::new(GatewayState {
            orchestrator,
            environment,
        })
    }
}
