//! Relay server: shared state, router and listener

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, options, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{auth, handler, legacy, passthrough};
use crate::config::AppConfig;
use crate::error::ServerError;
use crate::registry::ModelRegistry;

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Shared, read-only state for every request
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
    pub http_client: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: AppConfig, registry: ModelRegistry) -> Result<Self, ServerError> {
        let http_client = build_http_client(&config)?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            http_client,
        })
    }
}

/// Build the backend HTTP client with timeouts and TLS configuration
pub fn build_http_client(config: &AppConfig) -> Result<reqwest::Client, ServerError> {
    let timeouts = &config.backend.timeouts;
    let mut client_builder = reqwest::Client::builder()
        .connect_timeout(timeouts.connect())
        .read_timeout(timeouts.read())
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.backend.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }

        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let cert_pem = std::fs::read(cert_path)?;
            let key_pem = std::fs::read(key_path)?;

            let identity = reqwest::Identity::from_pem(&[cert_pem, key_pem].concat())?;
            client_builder = client_builder.identity(identity);
            tracing::info!("TLS: Loaded client certificate from {} for mTLS", cert_path);
        }
    }

    Ok(client_builder.build()?)
}

pub fn build_router(state: ProxyState) -> Router {
    let api: Router<ProxyState> = Router::new()
        .route("/v1/chat/completions", post(handler::chat_completions))
        .route("/v1/completions", post(legacy::completions))
        .route("/v1/models", get(passthrough::list_models))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    // CorsLayer answers every OPTIONS itself, so the backend OPTIONS relays
    // are added after it.
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/favicon.ico", get(passthrough::favicon))
        .merge(api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .route("/v1/chat/completions", options(passthrough::relay_options))
        .route("/v1/models", options(passthrough::relay_options))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay until the listener fails
pub async fn run_server(config: AppConfig, registry: ModelRegistry) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let backend = config.backend.base_url();
    let state = ProxyState::new(config, registry)?;

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("bananaphone listening on {}", addr);
    tracing::info!("Relaying to {}", backend);
    tracing::info!(
        profiles = state.registry.len(),
        autostyle = state.config.prompt.autostyle,
        auth = state.config.auth.is_enabled(),
        "Relay configured"
    );

    Ok(axum::serve(listener, app).await?)
}

/// Root greeting, also answers HEAD
async fn root_handler() -> Json<Value> {
    Json(json!({"message": "bananaphone relay is running"}))
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
