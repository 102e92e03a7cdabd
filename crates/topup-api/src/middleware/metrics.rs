//! # Request Metrics
//!
//! In-process atomic counters, mirrored into the `metrics` facade so they
//! appear in the Prometheus exposition when a recorder is installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub const HTTP_REQUESTS: &str = "topup_http_requests_total";

/// Shared request counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }
}

fn status_class(status: axum::http::StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Count every request and every 4xx/5xx response.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();

    let response = next.run(request).await;
    let status = response.status();

    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() || status.is_server_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
    ::metrics::counter!(HTTP_REQUESTS, "method" => method, "status" => status_class(status))
        .increment(1);

    response
}
