//! User self-service lookup and role listing for the current tenant.
//! `UserStore` exposes no `list_users`/`create_user` (the port was built
//! around the login path, not admin CRUD) — provisioning new users is out
//! of scope for this pass; see DESIGN.md.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use checkops_types::error::AppError as DomainError;
use checkops_types::principal::CallerContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub roles: Vec<String>,
}

pub async fn get_user(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(user_id): Path<Uuid>) -> Result<Json<UserView>, ApiError> {
    caller.require_permission("user", "view")?;
    let user = state.users.get_by_id(caller.tenant_id, user_id).await?.ok_or(DomainError::NotFound("user".into()))?;
    let roles = state.users.roles_for_user(user.id).await?.into_iter().map(|r| r.name).collect();
    Ok(Json(UserView { id: user.id, username: user.username, email: user.email, is_active: user.is_active, mfa_enabled: user.mfa_enabled, roles }))
}
