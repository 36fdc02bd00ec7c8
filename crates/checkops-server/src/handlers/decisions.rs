//! Decision-making, dual-control approval, and supervisory override.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use checkops_types::check_item::CheckStatus;
use checkops_types::decision::{Decision, DecisionAction};
use checkops_types::principal::CallerContext;
use checkops_types::service::MakeDecisionInput;
use checkops_types::tenant::TenantContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MakeDecisionRequest {
    pub check_item_id: Uuid,
    pub action: DecisionAction,
    pub notes: Option<String>,
    #[serde(default)]
    pub reason_codes: Vec<String>,
    #[serde(default)]
    pub ai_assisted: bool,
    #[serde(default)]
    pub ai_flags_reviewed: Vec<String>,
}

pub async fn make_decision(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Json(body): Json<MakeDecisionRequest>) -> Result<Json<Decision>, ApiError> {
    let ctx = TenantContext::new(caller.tenant_id);
    let input = MakeDecisionInput {
        check_item_id: body.check_item_id,
        action: body.action,
        notes: body.notes,
        reason_codes: body.reason_codes,
        ai_assisted: body.ai_assisted,
        ai_flags_reviewed: body.ai_flags_reviewed,
    };
    let decision = state.service.make_decision(&caller, &ctx, input).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct ApproveDualControlRequest {
    pub notes: Option<String>,
    #[serde(default)]
    pub reason_codes: Vec<String>,
}

pub async fn approve_dual_control(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Path(pending_decision_id): Path<Uuid>,
    Json(body): Json<ApproveDualControlRequest>,
) -> Result<Json<Decision>, ApiError> {
    let ctx = TenantContext::new(caller.tenant_id);
    let decision = state.service.approve_dual_control(&caller, &ctx, pending_decision_id, body.notes, body.reason_codes).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct OverrideDecisionRequest {
    pub new_status: CheckStatus,
    pub justification: String,
}

pub async fn override_decision(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Path(check_item_id): Path<Uuid>,
    Json(body): Json<OverrideDecisionRequest>,
) -> Result<Json<Decision>, ApiError> {
    caller.require_permission("check_item", "override")?;
    let ctx = TenantContext::new(caller.tenant_id);
    let decision = state.service.override_decision(&caller, &ctx, check_item_id, body.new_status, body.justification).await?;
    Ok(Json(decision))
}
