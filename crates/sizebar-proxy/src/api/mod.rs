mod combinations;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id;
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<Upstream>,
}

/// Error body shape shared by every failure response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn response(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                error: message.into(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
}

/// Storefront pages call the proxy cross-origin, so any origin may read it.
fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/combinations",
            get(combinations::get_combinations)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn method_not_allowed() -> Response {
    ApiError::response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn health() -> impl IntoResponse {
    Json(HealthData { status: "ok" })
}
