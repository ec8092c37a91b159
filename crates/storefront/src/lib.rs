//! Kilau storefront functions.
//!
//! The browser checkout talks to these endpoints instead of the upstream
//! services directly, so Supabase, Midtrans and Komerce credentials never
//! leave the server. The router is built here so it can be exercised by
//! tests without binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod komerce;
pub mod middleware;
pub mod midtrans;
pub mod routes;
pub mod state;
pub mod supabase;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, header},
    routing::get,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    RateLimitError, request_id_middleware, security_headers_middleware,
};
use crate::middleware::auth::{ADMIN_ID_HEADER, VENDOR_ID_HEADER};
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::state::AppState;

/// Build the full application router.
///
/// # Errors
///
/// Returns `RateLimitError` if a rate limiter cannot be built.
pub fn app(state: AppState) -> Result<Router, RateLimitError> {
    let cors = cors_layer(state.config());

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::api_routes()?)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state))
}

/// CORS for the browser checkout: the public base URL plus an optional
/// extra origin (a preview deployment, for instance).
fn cors_layer(config: &config::StorefrontConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = std::iter::once(config.base_url.as_str())
        .chain(config.cors_origin.as_deref())
        .map(|origin| origin.trim_end_matches('/'))
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ADMIN_ID_HEADER),
            HeaderName::from_static(VENDOR_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 if Supabase cannot be reached.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.supabase().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
