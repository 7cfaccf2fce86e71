//! Informational routes. These respond whether or not a model loaded.
use axum::{extract::State, Json};
use serde::Serialize;

use crate::shared_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_type: String,
    pub model_loaded: bool,
    pub supported_endpoints: Vec<String>,
    pub load_strategy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: String,
    pub supported_endpoints: Vec<String>,
    pub health: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = &state.registry;
    Json(HealthResponse {
        status: "ok".to_string(),
        model_type: registry.kind().to_string(),
        model_loaded: registry.is_loaded(),
        supported_endpoints: registry.supported_endpoints(),
        load_strategy: registry.active_strategy().map(|s| s.to_string()),
    })
}

pub async fn home(State(state): State<AppState>) -> Json<HomeResponse> {
    let registry = &state.registry;
    Json(HomeResponse {
        message: format!("Multi-Model API ({})", registry.kind()),
        supported_endpoints: registry.supported_endpoints(),
        health: "/health".to_string(),
    })
}
