//! SQLx row types for the checkops Postgres adapter.
//!
//! Each row struct derives `sqlx::FromRow` over primitive column types and
//! provides `TryFrom<Row> for DomainType`. This isolates sqlx from
//! checkops-types, which stays pure. Domain enums are stored as `TEXT`
//! (not custom Postgres enum types) and round-tripped through their
//! existing `strum::Display`/`FromStr` impls rather than a second
//! hand-written encode/decode table.

use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use checkops_types::audit::{AuditAction, AuditLog};
use checkops_types::check_item::{
    AccountContext, AccountType, AdvisoryFields, CheckHistory, CheckImage, CheckItem, CheckStatus, ImageType, ItemType, RiskLevel,
};
use checkops_types::decision::{Decision, DecisionAction, DecisionType, EvidenceSnapshot};
use checkops_types::entitlement::{ApprovalEntitlement, EntitlementType};
use checkops_types::error::AppError;
use checkops_types::fraud::{FraudEvent, FraudSharedArtifact, NetworkMatchAlert, SharingLevel, TenantFraudConfig};
use checkops_types::image_token::ImageAccessToken;
use checkops_types::policy::{Policy, PolicyRule, PolicyStatus, PolicyVersion};
use checkops_types::queue::{Queue, QueueAssignment};
use checkops_types::user::{User, UserSession};

pub(crate) fn parse_enum<T: FromStr>(s: &str, field: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(|e| AppError::Internal(anyhow!("invalid {field} value {s:?}: {e}")))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value, field: &str) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::Internal(anyhow!("malformed {field}: {e}")))
}

#[derive(sqlx::FromRow)]
pub(crate) struct CheckItemRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub external_item_id: String,
    pub source_system: String,
    pub amount: Decimal,
    pub currency: String,
    pub account_id: String,
    pub account_number_masked: String,
    pub account_type: String,
    pub routing_number: Option<String>,
    pub check_number: Option<String>,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub presented_date: NaiveDate,
    pub check_date: Option<NaiveDate>,
    pub process_date: Option<NaiveDate>,
    pub micr_line: Option<String>,
    pub micr_account: Option<String>,
    pub micr_routing: Option<String>,
    pub micr_check_number: Option<String>,
    pub item_type: String,
    pub status: String,
    pub risk_level: String,
    pub priority: i32,
    pub context: serde_json::Value,
    pub advisory: serde_json::Value,
    pub assigned_reviewer_id: Option<Uuid>,
    pub assigned_approver_id: Option<Uuid>,
    pub queue_id: Option<Uuid>,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub requires_dual_control: bool,
    pub pending_dual_control_decision_id: Option<Uuid>,
    pub dual_control_reason: Option<String>,
    pub policy_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CheckItemRow> for CheckItem {
    type Error = AppError;

    fn try_from(r: CheckItemRow) -> Result<Self, Self::Error> {
        Ok(CheckItem {
            id: r.id,
            tenant_id: r.tenant_id,
            external_item_id: r.external_item_id,
            source_system: r.source_system,
            amount: r.amount,
            currency: r.currency,
            account_id: r.account_id,
            account_number_masked: r.account_number_masked,
            account_type: parse_enum::<AccountType>(&r.account_type, "account_type")?,
            routing_number: r.routing_number,
            check_number: r.check_number,
            payee_name: r.payee_name,
            memo: r.memo,
            presented_date: r.presented_date,
            check_date: r.check_date,
            process_date: r.process_date,
            micr_line: r.micr_line,
            micr_account: r.micr_account,
            micr_routing: r.micr_routing,
            micr_check_number: r.micr_check_number,
            item_type: parse_enum::<ItemType>(&r.item_type, "item_type")?,
            status: parse_enum::<CheckStatus>(&r.status, "status")?,
            risk_level: parse_enum::<RiskLevel>(&r.risk_level, "risk_level")?,
            priority: r.priority,
            context: from_json::<AccountContext>(r.context, "context")?,
            advisory: from_json::<AdvisoryFields>(r.advisory, "advisory")?,
            assigned_reviewer_id: r.assigned_reviewer_id,
            assigned_approver_id: r.assigned_approver_id,
            queue_id: r.queue_id,
            sla_due_at: r.sla_due_at,
            sla_breached: r.sla_breached,
            requires_dual_control: r.requires_dual_control,
            pending_dual_control_decision_id: r.pending_dual_control_decision_id,
            dual_control_reason: r.dual_control_reason,
            policy_version_id: r.policy_version_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CheckImageRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Uuid,
    pub image_type: String,
    pub external_image_id: String,
    pub storage_path: String,
    pub content_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub dpi: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CheckImageRow> for CheckImage {
    type Error = AppError;

    fn try_from(r: CheckImageRow) -> Result<Self, Self::Error> {
        Ok(CheckImage {
            id: r.id,
            tenant_id: r.tenant_id,
            check_item_id: r.check_item_id,
            image_type: parse_enum::<ImageType>(&r.image_type, "image_type")?,
            external_image_id: r.external_image_id,
            storage_path: r.storage_path,
            content_type: r.content_type,
            width: r.width,
            height: r.height,
            dpi: r.dpi,
            thumbnail_path: r.thumbnail_path,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CheckHistoryRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: String,
    pub check_number: Option<String>,
    pub amount: Decimal,
    pub cleared_date: Option<NaiveDate>,
    pub signature_hash: Option<String>,
    pub check_stock_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CheckHistoryRow> for CheckHistory {
    fn from(r: CheckHistoryRow) -> Self {
        CheckHistory {
            id: r.id,
            tenant_id: r.tenant_id,
            account_id: r.account_id,
            check_number: r.check_number,
            amount: r.amount,
            cleared_date: r.cleared_date,
            signature_hash: r.signature_hash,
            check_stock_hash: r.check_stock_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DecisionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Uuid,
    pub decision_type: String,
    pub action: String,
    pub user_id: Uuid,
    pub previous_status: String,
    pub new_status: String,
    pub is_dual_control_required: bool,
    pub dual_control_approver_id: Option<Uuid>,
    pub notes: Option<String>,
    pub reason_codes: Vec<String>,
    pub ai_assisted: bool,
    pub ai_flags_reviewed: Vec<String>,
    pub evidence_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = AppError;

    fn try_from(r: DecisionRow) -> Result<Self, Self::Error> {
        Ok(Decision {
            id: r.id,
            tenant_id: r.tenant_id,
            check_item_id: r.check_item_id,
            decision_type: parse_enum::<DecisionType>(&r.decision_type, "decision_type")?,
            action: parse_enum::<DecisionAction>(&r.action, "action")?,
            user_id: r.user_id,
            previous_status: parse_enum::<CheckStatus>(&r.previous_status, "previous_status")?,
            new_status: parse_enum::<CheckStatus>(&r.new_status, "new_status")?,
            is_dual_control_required: r.is_dual_control_required,
            dual_control_approver_id: r.dual_control_approver_id,
            notes: r.notes,
            reason_codes: r.reason_codes,
            ai_assisted: r.ai_assisted,
            ai_flags_reviewed: r.ai_flags_reviewed,
            evidence_snapshot: from_json::<EvidenceSnapshot>(r.evidence_snapshot, "evidence_snapshot")?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AuditLogRow {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub before_value: Option<serde_json::Value>,
    pub after_value: Option<serde_json::Value>,
    pub extra_data: Option<serde_json::Value>,
    pub session_id: Option<Uuid>,
    pub previous_hash: String,
    pub integrity_hash: String,
}

impl TryFrom<AuditLogRow> for AuditLog {
    type Error = AppError;

    fn try_from(r: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            id: r.id,
            tenant_id: r.tenant_id,
            timestamp: r.timestamp,
            user_id: r.user_id,
            username: r.username,
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            action: parse_enum::<AuditAction>(&r.action, "action")?,
            resource_type: r.resource_type,
            resource_id: r.resource_id,
            description: r.description,
            before_value: r.before_value,
            after_value: r.after_value,
            extra_data: r.extra_data,
            session_id: r.session_id,
            previous_hash: r.previous_hash,
            integrity_hash: r.integrity_hash,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub mfa_enabled: bool,
    pub mfa_secret: Option<String>,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub allowed_ips: Option<Vec<String>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `role_ids` is loaded by a second query (`user_roles`), not part of this
/// row; the caller attaches it after construction.
pub(crate) fn user_from_row(r: UserRow, role_ids: Vec<Uuid>) -> User {
    User {
        id: r.id,
        tenant_id: r.tenant_id,
        username: r.username,
        email: r.email,
        password_hash: r.password_hash,
        is_active: r.is_active,
        is_superuser: r.is_superuser,
        mfa_enabled: r.mfa_enabled,
        mfa_secret: r.mfa_secret,
        failed_login_attempts: r.failed_login_attempts,
        locked_until: r.locked_until,
        allowed_ips: r.allowed_ips,
        last_login: r.last_login,
        role_ids,
        created_at: r.created_at,
        updated_at: r.updated_at,
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserSessionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub device_fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<UserSessionRow> for UserSession {
    fn from(r: UserSessionRow) -> Self {
        UserSession {
            id: r.id,
            tenant_id: r.tenant_id,
            user_id: r.user_id,
            refresh_token_hash: r.refresh_token_hash,
            device_fingerprint: r.device_fingerprint,
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            created_at: r.created_at,
            expires_at: r.expires_at,
            is_active: r.is_active,
            revoked_at: r.revoked_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PolicyRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub status: String,
    pub is_default: bool,
    pub applies_to_account_types: Option<Vec<String>>,
}

impl TryFrom<PolicyRow> for Policy {
    type Error = AppError;

    fn try_from(r: PolicyRow) -> Result<Self, Self::Error> {
        let applies_to_account_types = r
            .applies_to_account_types
            .map(|types| types.iter().map(|t| parse_enum::<AccountType>(t, "applies_to_account_types")).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        Ok(Policy {
            id: r.id,
            tenant_id: r.tenant_id,
            name: r.name,
            status: parse_enum::<PolicyStatus>(&r.status, "status")?,
            is_default: r.is_default,
            applies_to_account_types,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PolicyVersionRow {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub effective_date: DateTime<Utc>,
    pub is_current: bool,
}

/// Rules are loaded separately and attached by the caller.
pub(crate) fn policy_version_from_row(r: PolicyVersionRow, rules: Vec<PolicyRule>) -> PolicyVersion {
    PolicyVersion {
        id: r.id,
        policy_id: r.policy_id,
        effective_date: r.effective_date,
        is_current: r.is_current,
        rules,
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PolicyRuleRow {
    pub id: Uuid,
    pub name: String,
    pub rule_type: String,
    pub priority: i32,
    pub is_enabled: bool,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
    pub amount_threshold: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PolicyRuleRow> for PolicyRule {
    type Error = AppError;

    fn try_from(r: PolicyRuleRow) -> Result<Self, Self::Error> {
        Ok(PolicyRule {
            id: r.id,
            name: r.name,
            rule_type: parse_enum(&r.rule_type, "rule_type")?,
            priority: r.priority,
            is_enabled: r.is_enabled,
            conditions: from_json(r.conditions, "conditions")?,
            actions: from_json(r.actions, "actions")?,
            amount_threshold: r.amount_threshold,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EntitlementRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub entitlement_type: String,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub allowed_account_types: Option<Vec<String>>,
    pub allowed_queue_ids: Option<Vec<Uuid>>,
    pub allowed_risk_levels: Option<Vec<String>>,
    pub allowed_business_lines: Option<Vec<String>>,
    pub is_active: bool,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
}

impl TryFrom<EntitlementRow> for ApprovalEntitlement {
    type Error = AppError;

    fn try_from(r: EntitlementRow) -> Result<Self, Self::Error> {
        let allowed_account_types = r
            .allowed_account_types
            .map(|v| v.iter().map(|t| parse_enum::<AccountType>(t, "allowed_account_types")).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        let allowed_risk_levels = r
            .allowed_risk_levels
            .map(|v| v.iter().map(|t| parse_enum::<RiskLevel>(t, "allowed_risk_levels")).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        Ok(ApprovalEntitlement {
            id: r.id,
            tenant_id: r.tenant_id,
            user_id: r.user_id,
            role_id: r.role_id,
            entitlement_type: parse_enum::<EntitlementType>(&r.entitlement_type, "entitlement_type")?,
            min_amount: r.min_amount,
            max_amount: r.max_amount,
            allowed_account_types,
            allowed_queue_ids: r.allowed_queue_ids,
            allowed_risk_levels,
            allowed_business_lines: r.allowed_business_lines,
            is_active: r.is_active,
            effective_from: r.effective_from,
            effective_until: r.effective_until,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ImageTokenRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub image_id: Uuid,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_ip: Option<String>,
    pub used_by_user_agent: Option<String>,
}

impl From<ImageTokenRow> for ImageAccessToken {
    fn from(r: ImageTokenRow) -> Self {
        ImageAccessToken {
            id: r.id,
            tenant_id: r.tenant_id,
            image_id: r.image_id,
            created_by_user_id: r.created_by_user_id,
            created_at: r.created_at,
            expires_at: r.expires_at,
            used_at: r.used_at,
            used_by_ip: r.used_by_ip,
            used_by_user_agent: r.used_by_user_agent,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct QueueRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<QueueRow> for Queue {
    fn from(r: QueueRow) -> Self {
        Queue { id: r.id, tenant_id: r.tenant_id, name: r.name, description: r.description, is_active: r.is_active, created_at: r.created_at }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct QueueAssignmentRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub queue_id: Uuid,
    pub user_id: Uuid,
    pub can_review: bool,
    pub can_approve: bool,
    pub max_concurrent_items: Option<i32>,
}

impl From<QueueAssignmentRow> for QueueAssignment {
    fn from(r: QueueAssignmentRow) -> Self {
        QueueAssignment {
            id: r.id,
            tenant_id: r.tenant_id,
            queue_id: r.queue_id,
            user_id: r.user_id,
            can_review: r.can_review,
            can_approve: r.can_approve,
            max_concurrent_items: r.max_concurrent_items,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FraudEventRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub fraud_type: String,
    pub channel: String,
    pub reported_by_user_id: Uuid,
    pub reported_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl From<FraudEventRow> for FraudEvent {
    fn from(r: FraudEventRow) -> Self {
        FraudEvent {
            id: r.id,
            tenant_id: r.tenant_id,
            check_item_id: r.check_item_id,
            fraud_type: r.fraud_type,
            channel: r.channel,
            reported_by_user_id: r.reported_by_user_id,
            reported_at: r.reported_at,
            details: r.details,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FraudArtifactRow {
    pub id: Uuid,
    pub source_fraud_event_id: Uuid,
    pub routing_hash: Option<String>,
    pub payee_hash: Option<String>,
    pub micr_routing_hash: Option<String>,
    pub check_fingerprint: Option<String>,
    pub pepper_version: i32,
    pub month_bucket: String,
    pub amount_bucket: String,
    pub fraud_type: String,
    pub channel: String,
    pub sharing_level: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<FraudArtifactRow> for FraudSharedArtifact {
    type Error = AppError;

    fn try_from(r: FraudArtifactRow) -> Result<Self, Self::Error> {
        Ok(FraudSharedArtifact {
            id: r.id,
            source_fraud_event_id: r.source_fraud_event_id,
            indicators: checkops_types::fraud::FraudIndicators {
                routing_hash: r.routing_hash,
                payee_hash: r.payee_hash,
                micr_routing_hash: r.micr_routing_hash,
                check_fingerprint: r.check_fingerprint,
            },
            pepper_version: r.pepper_version,
            month_bucket: r.month_bucket,
            amount_bucket: r.amount_bucket,
            fraud_type: r.fraud_type,
            channel: r.channel,
            sharing_level: parse_enum::<SharingLevel>(&r.sharing_level, "sharing_level")?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NetworkMatchAlertRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_item_id: Option<Uuid>,
    pub match_reasons: Vec<String>,
    pub distinct_institution_count: i32,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NetworkMatchAlertRow> for NetworkMatchAlert {
    fn from(r: NetworkMatchAlertRow) -> Self {
        NetworkMatchAlert {
            id: r.id,
            tenant_id: r.tenant_id,
            check_item_id: r.check_item_id,
            match_reasons: r.match_reasons,
            distinct_institution_count: r.distinct_institution_count,
            dismissed: r.dismissed,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TenantFraudConfigRow {
    pub tenant_id: Uuid,
    pub sharing_enabled: bool,
    pub eligible_pepper_versions: Vec<i32>,
}

impl From<TenantFraudConfigRow> for TenantFraudConfig {
    fn from(r: TenantFraudConfigRow) -> Self {
        TenantFraudConfig { tenant_id: r.tenant_id, sharing_enabled: r.sharing_enabled, eligible_pepper_versions: r.eligible_pepper_versions }
    }
}
