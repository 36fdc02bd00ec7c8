//! JWT bearer-auth middleware. Unlike the teacher's `JwtConfig::from_secret`
//! (which set `validate_exp = false` for local development), expiry
//! checking here is unconditional — enforced inside
//! `checkops_types::auth::decode_access_token`, not configurable at this
//! layer.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use checkops_types::auth::decode_access_token;
use checkops_types::error::AppError as DomainError;
use checkops_types::principal::CallerContext;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

pub async fn jwt_auth(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or(DomainError::TokenInvalid)?;
    let claims = decode_access_token(&state.jwt.access_decoding, token)?;

    let caller = CallerContext {
        user_id: claims.sub,
        tenant_id: claims.tenant_id,
        username: claims.username,
        roles: claims.roles,
        role_ids: claims.role_ids,
        permissions: claims.permissions.into_iter().collect::<HashSet<_>>(),
        is_superuser: claims.is_superuser,
    };
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
