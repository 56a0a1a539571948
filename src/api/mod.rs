//! HTTP API module - image endpoints, CORS and access logging

mod cors;
mod images;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    services::ServeFile,
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{info_span, Level};

use crate::images::ImageStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub images: Arc<ImageStore>,
    pub request_timeout: Duration,
}

/// Build the API router
pub fn router(state: AppState, favicon: &Path) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            // Client address is absent when the router is driven without a socket
            let client_ip = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_default();
            let user_agent = request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri(),
                client_ip = %client_ip,
                user_agent = %user_agent,
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/health", get(health_check))
        .merge(images::router())
        .route_service("/favicon.ico", ServeFile::new(favicon))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(cors::cors))
        .layer(trace_layer)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON error body with the given status
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Catch-all for unmatched routes
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "page not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Method;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(dir: &TempDir) -> Router {
        let state = AppState {
            images: Arc::new(ImageStore::new(dir.path())),
            request_timeout: Duration::from_secs(5),
        };
        router(state, &dir.path().join("favicon.ico"))
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_options_on_unmapped_path_is_no_content() {
        let dir = TempDir::new().unwrap();
        let resp = test_router(&dir)
            .oneshot(request(Method::OPTIONS, "/nowhere"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_path_is_catch_all() {
        let dir = TempDir::new().unwrap();
        let resp = test_router(&dir)
            .oneshot(request(Method::GET, "/nowhere"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"page not found");
    }

    #[tokio::test]
    async fn test_missing_image_error_body() {
        let dir = TempDir::new().unwrap();
        let resp = test_router(&dir)
            .oneshot(request(Method::GET, "/images/9"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"image not found"}"#);
    }
}
