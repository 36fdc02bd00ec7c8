//! One-time-use check-image access tokens. Minting requires
//! authentication; consuming a token does not — the bearer token in the
//! URL path is the only credential, matching §6's signed-image-URL model.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use checkops_types::error::AppError;
use checkops_types::image_token::ImageAccessToken;
use checkops_types::principal::CallerContext;
use checkops_types::tenant::TenantContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MintTokensQuery {
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MintTokensRequest {
    pub image_ids: Vec<Uuid>,
}

/// Batch mint, 1-10 images per request — matches the image carousel's
/// page size and keeps one signed-URL request from backing the whole
/// item's image set in a single oversized call.
pub async fn mint_tokens(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<MintTokensQuery>,
    Json(body): Json<MintTokensRequest>,
) -> Result<Json<Vec<ImageAccessToken>>, ApiError> {
    caller.require_permission("check_image", "view")?;
    if body.image_ids.is_empty() || body.image_ids.len() > 10 {
        return Err(AppError::LimitExceeded("image_ids must contain between 1 and 10 entries".into()).into());
    }
    let ctx = TenantContext::new(caller.tenant_id);
    let ttl = query.ttl_seconds.unwrap_or(state.config.image_signed_url_ttl_seconds);
    let tokens = state.service.mint_image_tokens(&caller, &ctx, body.image_ids, ttl).await?;
    Ok(Json(tokens))
}

pub async fn consume_token(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<Uuid>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let user_agent = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let bytes = state.service.consume_image_token(token_id, Some(addr.ip().to_string()), user_agent).await?;
    let mut response = ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    Ok(response)
}
