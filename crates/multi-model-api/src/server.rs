//! Server startup
//!
//! Loads the configured model on a blocking worker, then serves the HTTP
//! routes over the resulting registry until a shutdown signal arrives.
//! A failed load still starts the server; only the model routes go dark.

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    api,
    config::Config,
    metrics,
    model_runtime::{load_registry, EMBEDDING_ENDPOINT, GENERATE_ENDPOINT, RERANKER_ENDPOINT},
    shared_state::AppState,
};

/// Tracing must already be initialised, see [`crate::telemetry::init_tracing`].
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::metrics::init_metrics();
    cfg.print_config();

    let load_config = cfg.clone();
    let registry = tokio::task::spawn_blocking(move || load_registry(&load_config))
        .await
        .map_err(|e| anyhow::anyhow!("model loading task failed: {}", e))?;
    metrics::set_model_loaded(registry.is_loaded());

    let state = AppState::new(registry, cfg.clone());
    let app = build_router(state);

    let bind_address = cfg.bind_address();
    info!("Starting HTTP server on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        .route(EMBEDDING_ENDPOINT, post(api::embedding))
        .route(RERANKER_ENDPOINT, post(api::rerank))
        .route(GENERATE_ENDPOINT, post(api::generate))
        .route("/health", get(api::health))
        .route("/", get(api::home))
        .route("/metrics", get(metrics::get_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        // outermost, so timed-out requests are counted too
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Counts every response by matched route and status code.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    metrics::inc_request(&route, response.status().as_u16());
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
