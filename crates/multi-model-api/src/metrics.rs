use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;
use tracing::error;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static INFERENCE_DURATION: OnceLock<HistogramVec> = OnceLock::new();
static MODEL_LOADED: OnceLock<IntGauge> = OnceLock::new();

pub fn init_metrics() {
    let req_counter = REQ_COUNTER.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("requests_total", "Total requests per route"),
            &["route", "status"],
        )
        .expect("valid requests_total definition")
    });

    let inference_duration = INFERENCE_DURATION.get_or_init(|| {
        HistogramVec::new(
            prometheus::HistogramOpts::new(
                "inference_duration_seconds",
                "Time spent running the model per route",
            ),
            &["route"],
        )
        .expect("valid inference_duration_seconds definition")
    });

    let model_loaded = MODEL_LOADED.get_or_init(|| {
        IntGauge::new("model_loaded", "Whether a model is loaded (0 or 1)")
            .expect("valid model_loaded definition")
    });

    REGISTRY.register(Box::new(req_counter.clone())).ok();
    REGISTRY.register(Box::new(inference_duration.clone())).ok();
    REGISTRY.register(Box::new(model_loaded.clone())).ok();
}

pub fn inc_request(route: &str, status: u16) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, &status.to_string()]).inc();
    }
}

pub fn observe_inference(route: &str, seconds: f64) {
    if let Some(histogram) = INFERENCE_DURATION.get() {
        histogram.with_label_values(&[route]).observe(seconds);
    }
}

pub fn set_model_loaded(loaded: bool) {
    if let Some(gauge) = MODEL_LOADED.get() {
        gauge.set(i64::from(loaded));
    }
}

#[cfg(test)]
pub(crate) fn request_count(route: &str, status: u16) -> u64 {
    REQ_COUNTER
        .get()
        .map(|counter| counter.with_label_values(&[route, &status.to_string()]).get())
        .unwrap_or(0)
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_metrics_exposition_lists_registered_series() {
        init_metrics();
        set_model_loaded(true);
        inc_request("/embedding", 200);
        observe_inference("/embedding", 0.01);

        let response = get_metrics().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("requests_total"));
        assert!(text.contains("inference_duration_seconds"));
        assert!(text.contains("model_loaded 1"));
    }
}
