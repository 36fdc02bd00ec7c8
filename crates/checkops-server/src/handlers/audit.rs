//! Audit-log listing, per-resource trail, and hash-chain verification
//! status. Routed through `AuditStore` directly — `CheckOpsService` only
//! exposes `audit_chain_status`, not the listing/trail queries.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkops_types::audit::{build_audit_entry, AuditAction, AuditEntryInput, AuditLog, GENESIS_HASH};
use checkops_types::check_item::Page;
use checkops_types::principal::CallerContext;

use crate::error::ApiError;
use crate::state::AppState;

async fn append_audit(state: &AppState, tenant_id: Uuid, action: AuditAction, user_id: Uuid, resource_id: String) {
    let previous_hash = state.audit.latest_hash(Some(tenant_id)).await.ok().flatten().unwrap_or_else(|| GENESIS_HASH.to_string());
    let record = build_audit_entry(action, "audit_packet", previous_hash, Utc::now(), AuditEntryInput { tenant_id: Some(tenant_id), user_id: Some(user_id), resource_id: Some(resource_id), ..Default::default() });
    let _ = state.audit.append(record).await;
}

#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListAuditResponse {
    pub records: Vec<AuditLog>,
    pub total: i64,
}

pub async fn list_audit(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Query(query): Query<ListAuditQuery>) -> Result<Json<ListAuditResponse>, ApiError> {
    caller.require_permission("audit_log", "view")?;
    let page = Page { page: query.page.unwrap_or(1), page_size: query.page_size.unwrap_or(50) };
    let (records, total) = state.audit.list(caller.tenant_id, query.action, query.from, query.to, &page).await?;
    Ok(Json(ListAuditResponse { records, total }))
}

pub async fn item_trail(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(item_id): Path<Uuid>) -> Result<Json<Vec<AuditLog>>, ApiError> {
    caller.require_permission("audit_log", "view")?;
    let records = state.audit.for_resource(caller.tenant_id, "check_item", &item_id.to_string()).await?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
pub struct ChainStatusResponse {
    pub intact: bool,
    pub broken_at_index: Option<usize>,
}

pub async fn chain_status(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>) -> Result<Json<ChainStatusResponse>, ApiError> {
    caller.require_permission("audit_log", "view")?;
    let result = state.service.audit_chain_status(caller.tenant_id).await?;
    Ok(Json(match result {
        Ok(()) => ChainStatusResponse { intact: true, broken_at_index: None },
        Err(idx) => ChainStatusResponse { intact: false, broken_at_index: Some(idx) },
    }))
}

#[derive(Debug, Deserialize)]
pub struct GeneratePacketRequest {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct GeneratePacketResponse {
    pub packet_reference: Uuid,
    pub status: &'static str,
}

/// Stub: records the request and hands back a reference a future export
/// job would key on. Actual PDF/archive generation is not implemented.
pub async fn generate_packet(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Json(_body): Json<GeneratePacketRequest>) -> Result<Json<GeneratePacketResponse>, ApiError> {
    caller.require_permission("audit_log", "export")?;
    let packet_reference = Uuid::new_v4();
    append_audit(&state, caller.tenant_id, AuditAction::AuditPacketGenerated, caller.user_id, packet_reference.to_string()).await;
    Ok(Json(GeneratePacketResponse { packet_reference, status: "queued" }))
}
