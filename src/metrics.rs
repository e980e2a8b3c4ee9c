//! Prometheus metrics for yeet.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "yeet_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "yeet_http_request_duration_seconds";

/// Stored uploads (counter). Labels: strategy.
pub const UPLOADS_TOTAL: &str = "yeet_uploads_total";

/// Download attempts (counter). Labels: result (`hit` or `miss`).
pub const DOWNLOADS_TOTAL: &str = "yeet_downloads_total";

/// Slug candidates rejected because the key was taken (counter).
pub const KEY_COLLISIONS_TOTAL: &str = "yeet_key_collisions_total";

/// Uploads that reused a taken slug after running out of attempts (counter).
pub const KEY_COLLISIONS_EXHAUSTED_TOTAL: &str = "yeet_key_collisions_exhausted_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(UPLOADS_TOTAL, "Total stored uploads");
    describe_counter!(DOWNLOADS_TOTAL, "Total download attempts by result");
    describe_counter!(KEY_COLLISIONS_TOTAL, "Slug candidates that were already taken");
    describe_counter!(
        KEY_COLLISIONS_EXHAUSTED_TOTAL,
        "Uploads that overwrote a taken slug after exhausting attempts"
    );
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// The state flag says whether the `/metrics` endpoint is mounted; scrapes
/// of it are not self-instrumented.  Must be the outermost layer so it
/// captures the full request lifecycle.
pub async fn metrics_middleware(
    State(endpoint_mounted): State<bool>,
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if is_scrape(req.method(), req.uri().path(), endpoint_mounted) {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path, "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// A `GET /metrics` served by [`metrics_handler`].  Otherwise `/metrics`
/// is an ordinary relay path.
fn is_scrape(method: &Method, path: &str, endpoint_mounted: bool) -> bool {
    endpoint_mounted && *method == Method::GET && path == "/metrics"
}

// -- Path normalization -------------------------------------------------------

/// Normalize a request path to a route template for metric labels, so
/// every key does not become its own label value.
///
/// - `/` -> `/`
/// - `/health` -> `/health`
/// - `/quick-fox` -> `/{key}`
fn normalize_path(path: &str) -> &'static str {
    match path {
        "" | "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/{key}",
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_normalize_path_fixed_routes() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_scrape_skipped_only_when_mounted() {
        assert!(is_scrape(&Method::GET, "/metrics", true));
        assert!(!is_scrape(&Method::GET, "/metrics", false));
        assert!(!is_scrape(&Method::POST, "/metrics", true));
        assert!(!is_scrape(&Method::GET, "/quick-fox", true));
    }

    #[test]
    fn test_normalize_path_keys() {
        assert_eq!(normalize_path("/quick-fox"), "/{key}");
        assert_eq!(
            normalize_path("/0b6e1f3c-2d6a-4d6e-9d59-3f1c2a7b8e90.pdf"),
            "/{key}"
        );
        assert_eq!(normalize_path("/some/nested/name.txt"), "/{key}");
    }
}
