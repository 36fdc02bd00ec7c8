//! Fraud-event reporting and cross-tenant network-match alert listing.
//! `FraudEvent`/`NetworkMatchAlert` don't derive `Serialize`, so responses
//! are hand-rolled DTOs; alert responses only ever surface aggregate
//! counts and reasons, never the matched tenant or raw indicators.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkops_types::fraud::{meets_privacy_threshold, FraudEvent};
use checkops_types::principal::CallerContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportFraudRequest {
    pub check_item_id: Option<Uuid>,
    pub fraud_type: String,
    pub channel: String,
    pub details: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct FraudEventView {
    pub id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub fraud_type: String,
    pub channel: String,
    pub reported_at: DateTime<Utc>,
}

impl From<&FraudEvent> for FraudEventView {
    fn from(e: &FraudEvent) -> Self {
        Self { id: e.id, check_item_id: e.check_item_id, fraud_type: e.fraud_type.clone(), channel: e.channel.clone(), reported_at: e.reported_at }
    }
}

pub async fn report_event(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Json(body): Json<ReportFraudRequest>) -> Result<Json<FraudEventView>, ApiError> {
    caller.require_permission("fraud_event", "create")?;
    let event = FraudEvent {
        id: Uuid::new_v4(),
        tenant_id: caller.tenant_id,
        check_item_id: body.check_item_id,
        fraud_type: body.fraud_type,
        channel: body.channel,
        reported_by_user_id: caller.user_id,
        reported_at: Utc::now(),
        details: body.details,
    };
    let stored = state.fraud.create_event(event).await?;
    Ok(Json(FraudEventView::from(&stored)))
}

#[derive(Debug, Serialize)]
pub struct NetworkAlertView {
    pub id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub match_reasons: Vec<String>,
    pub disclosed: bool,
    pub dismissed: bool,
}

pub async fn list_alerts(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>) -> Result<Json<Vec<NetworkAlertView>>, ApiError> {
    caller.require_permission("fraud_event", "view")?;
    let alerts = state.fraud.list_alerts(caller.tenant_id).await?;
    let views = alerts
        .into_iter()
        .map(|a| {
            let disclosed = meets_privacy_threshold(a.distinct_institution_count, state.config.fraud_privacy_threshold);
            NetworkAlertView {
                id: a.id,
                check_item_id: a.check_item_id,
                match_reasons: if disclosed { a.match_reasons } else { vec![] },
                disclosed,
                dismissed: a.dismissed,
            }
        })
        .collect();
    Ok(Json(views))
}

pub async fn dismiss_alert(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(alert_id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    caller.require_permission("fraud_event", "manage")?;
    state.fraud.dismiss_alert(caller.tenant_id, alert_id).await?;
    Ok(Json(serde_json::json!({"status": "dismissed"})))
}
