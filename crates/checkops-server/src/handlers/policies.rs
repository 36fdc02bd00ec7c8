//! Policy CRUD and activation. Not covered by `CheckOpsService` (which
//! only reads the active version at ingest time), so these handlers call
//! `PolicyStore` directly and hand-roll response DTOs since `Policy`/
//! `PolicyVersion` don't derive `Serialize`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkops_types::check_item::AccountType;
use checkops_types::policy::{Operator, Policy, PolicyRule, PolicyStatus, PolicyVersion, RuleAction, RuleCondition, RuleType};
use checkops_types::principal::CallerContext;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PolicyView {
    pub id: Uuid,
    pub name: String,
    pub status: PolicyStatus,
    pub is_default: bool,
    pub applies_to_account_types: Option<Vec<AccountType>>,
}

impl From<&Policy> for PolicyView {
    fn from(p: &Policy) -> Self {
        Self { id: p.id, name: p.name.clone(), status: p.status, is_default: p.is_default, applies_to_account_types: p.applies_to_account_types.clone() }
    }
}

pub async fn list_policies(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>) -> Result<Json<Vec<PolicyView>>, ApiError> {
    caller.require_permission("policy", "view")?;
    let policies = state.policies.list_policies(caller.tenant_id).await?;
    Ok(Json(policies.iter().map(PolicyView::from).collect()))
}

pub async fn get_policy(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(policy_id): Path<Uuid>) -> Result<Json<PolicyView>, ApiError> {
    caller.require_permission("policy", "view")?;
    let policy = state.policies.get_policy(caller.tenant_id, policy_id).await?.ok_or(checkops_types::error::AppError::NotFound("policy".into()))?;
    Ok(Json(PolicyView::from(&policy)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRuleRequest {
    pub name: String,
    pub rule_type: RuleType,
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    pub amount_threshold: Option<rust_decimal::Decimal>,
}

fn default_true() -> bool {
    true
}

impl CreatePolicyRuleRequest {
    fn into_rule(self) -> PolicyRule {
        PolicyRule {
            id: Uuid::new_v4(),
            name: self.name,
            rule_type: self.rule_type,
            priority: self.priority,
            is_enabled: self.is_enabled,
            conditions: self.conditions,
            actions: self.actions,
            amount_threshold: self.amount_threshold,
            created_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub applies_to_account_types: Option<Vec<AccountType>>,
    pub rules: Vec<CreatePolicyRuleRequest>,
}

#[derive(Debug, Serialize)]
pub struct CreatePolicyResponse {
    pub policy: PolicyView,
    pub version_id: Uuid,
}

pub async fn create_policy(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Json(body): Json<CreatePolicyRequest>) -> Result<Json<CreatePolicyResponse>, ApiError> {
    caller.require_permission("policy", "manage")?;
    let policy_id = Uuid::new_v4();
    let version_id = Uuid::new_v4();
    let policy = Policy { id: policy_id, tenant_id: caller.tenant_id, name: body.name, status: PolicyStatus::Draft, is_default: false, applies_to_account_types: body.applies_to_account_types };
    let rules = body.rules.into_iter().map(CreatePolicyRuleRequest::into_rule).collect();
    let version = PolicyVersion { id: version_id, policy_id, effective_date: chrono::Utc::now(), is_current: false, rules };
    let (created, created_version) = state.policies.create_policy(policy, version).await?;
    Ok(Json(CreatePolicyResponse { policy: PolicyView::from(&created), version_id: created_version.id }))
}

pub async fn activate_policy(State(state): State<Arc<AppState>>, Extension(caller): Extension<CallerContext>, Path(policy_id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    caller.require_permission("policy", "manage")?;
    state.policies.activate_policy(caller.tenant_id, policy_id).await?;
    Ok(Json(serde_json::json!({"status": "activated"})))
}
