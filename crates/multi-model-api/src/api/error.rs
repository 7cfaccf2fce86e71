//! API error handling
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::model_runtime::types::ModelKind;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The active model does not serve the requested endpoint.
    #[error("{kind} model does not support the {endpoint} endpoint")]
    UnsupportedEndpoint {
        kind: ModelKind,
        endpoint: String,
        supported_endpoints: Vec<String>,
    },

    /// Malformed input or a failure inside the model.
    #[error("{0}")]
    Inference(String),
}

impl ApiError {
    pub fn inference(msg: impl Into<String>) -> Self {
        ApiError::Inference(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedEndpoint { .. } => StatusCode::NOT_FOUND,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::UnsupportedEndpoint {
                supported_endpoints, ..
            } => json!({
                "error": self.to_string(),
                "supported_endpoints": supported_endpoints,
            }),
            ApiError::Inference(message) => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Inference(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Inference(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unsupported_endpoint_is_404_with_list() {
        let (status, body) = body_json(ApiError::UnsupportedEndpoint {
            kind: ModelKind::Embedding,
            endpoint: "/v1".to_string(),
            supported_endpoints: vec!["/embedding".to_string()],
        })
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["supported_endpoints"], json!(["/embedding"]));
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("embedding") && message.contains("/v1"));
    }

    #[tokio::test]
    async fn test_inference_error_is_500_with_message_only() {
        let (status, body) = body_json(anyhow::anyhow!("shape mismatch").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "shape mismatch"}));
    }
}
