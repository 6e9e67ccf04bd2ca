use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use sizebar_core::ProductId;

use super::{ApiError, AppState};
use crate::middleware::RequestId;

/// Edge caches may serve a response for an hour and keep serving it stale
/// for a day while revalidating.
pub(super) const CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=86400";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CombinationsQuery {
    product_id: Option<String>,
}

pub(super) async fn get_combinations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CombinationsQuery>,
) -> Response {
    let Some(product_id) = query.product_id.as_deref().and_then(ProductId::parse) else {
        return ApiError::response(StatusCode::BAD_REQUEST, "Missing productId parameter");
    };

    let reply = match state.upstream.combinations(&product_id).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(
                request_id = %req_id.0,
                product_id = %product_id,
                error = %format!("{e:#}"),
                "combinations proxy failed"
            );
            return ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = reply
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let mut response = (status, Body::from(reply.body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if status.is_success() {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL),
        );
        tracing::debug!(request_id = %req_id.0, product_id = %product_id, "combinations served");
    }
    response
}
