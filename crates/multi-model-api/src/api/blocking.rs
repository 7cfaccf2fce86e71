//! Runs dispatcher calls on the blocking pool.
use axum::body::Bytes;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// Runs synchronous inference work off the async runtime.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::inference(format!("inference task failed: {}", e)))?
}

/// Decodes a JSON request body. Parse failures use the uniform inference error.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}
