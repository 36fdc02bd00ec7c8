//! Check-item listing, detail, adjacent-navigation, assignment, status
//! override, and AI analysis. Listing/detail/analysis route through
//! `CheckOpsService`; assignment and direct status update call
//! `CheckItemStore` directly since the service trait doesn't cover
//! reviewer/approver/queue reassignment or admin status correction.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkops_types::audit::{build_audit_entry, AuditAction, AuditEntryInput, GENESIS_HASH};
use checkops_types::check_item::{CheckItem, CheckItemFilter, CheckStatus, Page, RiskLevel};
use checkops_types::principal::CallerContext;
use checkops_types::risk::AiAnalysisResult;
use checkops_types::tenant::TenantContext;

use crate::error::ApiError;
use crate::state::AppState;

async fn append_audit(state: &AppState, tenant_id: Uuid, action: AuditAction, user_id: Uuid, resource_id: String) {
    let previous_hash = state.audit.latest_hash(Some(tenant_id)).await.ok().flatten().unwrap_or_else(|| GENESIS_HASH.to_string());
    let record = build_audit_entry(action, "check_item", previous_hash, Utc::now(), AuditEntryInput { tenant_id: Some(tenant_id), user_id: Some(user_id), resource_id: Some(resource_id), ..Default::default() });
    let _ = state.audit.append(record).await;
}

#[derive(Debug, Deserialize, Default)]
pub struct ListItemsQuery {
    pub status: Option<String>,
    pub risk_level: Option<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub queue_id: Option<Uuid>,
    pub assigned_reviewer_id: Option<Uuid>,
    pub assigned_approver_id: Option<Uuid>,
    pub has_ai_flags: Option<bool>,
    pub sla_breached: Option<bool>,
    pub presented_date_from: Option<NaiveDate>,
    pub presented_date_to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn parse_list<T: std::str::FromStr>(raw: &Option<String>) -> Option<Vec<T>> {
    raw.as_ref().map(|s| s.split(',').filter_map(|v| v.trim().parse().ok()).collect())
}

impl ListItemsQuery {
    fn into_filter(self) -> CheckItemFilter {
        CheckItemFilter {
            status: parse_list(&self.status),
            risk_level: parse_list::<RiskLevel>(&self.risk_level),
            amount_min: self.amount_min,
            amount_max: self.amount_max,
            queue_id: self.queue_id,
            assigned_reviewer_id: self.assigned_reviewer_id,
            assigned_approver_id: self.assigned_approver_id,
            has_ai_flags: self.has_ai_flags,
            sla_breached: self.sla_breached,
            presented_date_from: self.presented_date_from,
            presented_date_to: self.presented_date_to,
        }
    }

    fn page(&self) -> Page {
        Page { page: self.page.unwrap_or(1), page_size: self.page_size.unwrap_or(50) }
    }
}

#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<CheckItem>,
    pub total: i64,
}

pub async fn list_items(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Query(query): Query<ListItemsQuery>) -> Result<Json<ListItemsResponse>, ApiError> {
    let ctx = TenantContext::new(caller.tenant_id);
    let page = query.page();
    let filter = query.into_filter();
    let (items, total) = state.service.list_items(&ctx, &filter, &page).await?;
    Ok(Json(ListItemsResponse { items, total }))
}

pub async fn get_item(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>) -> Result<Json<CheckItem>, ApiError> {
    let ctx = TenantContext::new(caller.tenant_id);
    let item = state.service.get_item(&caller, &ctx, item_id).await?;
    Ok(Json(item))
}

#[derive(Debug, Serialize)]
pub struct AdjacentResponse {
    pub prev_id: Option<Uuid>,
    pub next_id: Option<Uuid>,
}

pub async fn adjacent_items(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>, Query(query): Query<ListItemsQuery>) -> Result<Json<AdjacentResponse>, ApiError> {
    let ctx = TenantContext::new(caller.tenant_id);
    let filter = query.into_filter();
    let (prev_id, next_id) = state.service.adjacent_items(&ctx, item_id, &filter).await?;
    Ok(Json(AdjacentResponse { prev_id, next_id }))
}

pub async fn analyze_item(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>) -> Result<Json<AiAnalysisResult>, ApiError> {
    caller.require_permission("check_item", "review")?;
    let ctx = TenantContext::new(caller.tenant_id);
    let result = state.service.analyze_item(&caller, &ctx, item_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub reviewer_id: Option<Uuid>,
    pub approver_id: Option<Uuid>,
    pub queue_id: Option<Uuid>,
}

pub async fn assign_item(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>, Json(body): Json<AssignRequest>) -> Result<Json<CheckItem>, ApiError> {
    caller.require_permission("check_item", "assign")?;
    let ctx = TenantContext::new(caller.tenant_id);
    let existing = state.service.get_item(&caller, &ctx, item_id).await?;
    ctx.check(existing.tenant_id)?;
    let updated = state.check_items.assign(caller.tenant_id, item_id, body.reviewer_id, body.approver_id, body.queue_id).await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: CheckStatus,
}

/// Direct administrative status correction — bypasses the decision
/// workflow entirely, so it carries its own dedicated permission rather
/// than reusing `check_item:review`/`check_item:assign`.
pub async fn set_status(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>, Json(body): Json<SetStatusRequest>) -> Result<Json<CheckItem>, ApiError> {
    caller.require_permission("check_item", "status_update")?;
    let ctx = TenantContext::new(caller.tenant_id);
    let existing = state.service.get_item(&caller, &ctx, item_id).await?;
    ctx.check(existing.tenant_id)?;
    existing.status.validate_transition(body.status)?;
    let updated = state.check_items.set_status(caller.tenant_id, item_id, body.status).await?;
    append_audit(&state, caller.tenant_id, AuditAction::ItemStatusChanged, caller.user_id, item_id.to_string()).await;
    Ok(Json(updated))
}
