use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Closed taxonomy of audit-worthy actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Authentication
    Login,
    Logout,
    LoginFailed,
    PasswordChange,
    MfaSetupStarted,
    MfaEnabled,
    MfaDisabled,
    SessionExpired,
    TokenRefreshed,

    // Authorization failures
    AuthPermissionDenied,
    AuthRoleDenied,
    AuthEntitlementDenied,
    AuthIpDenied,

    // Check items
    ItemViewed,
    ItemAssigned,
    ItemReassigned,
    ItemEscalated,
    ItemStatusChanged,
    ItemLocked,
    ItemUnlocked,

    // Decisions — success
    DecisionMade,
    DecisionApproved,
    DecisionRejected,

    // Decisions — failure
    DecisionFailed,
    DecisionValidationFailed,
    DecisionEntitlementFailed,

    // Decisions — overrides/reversals
    DecisionOverridden,
    DecisionReversed,
    DecisionAmended,

    // Dual control
    DualControlRequired,
    DualControlApproved,
    DualControlRejected,
    DualControlExpired,

    // Images
    ImageViewed,
    ImageZoomed,
    ImageDownloaded,
    ImageAccessDenied,
    ImageTokenCreated,
    ImageTokenUsed,
    ImageTokenInvalid,
    ImageTokenExpired,

    // Admin
    UserCreated,
    UserUpdated,
    UserDeactivated,
    RoleAssigned,
    RoleRemoved,
    PolicyCreated,
    PolicyUpdated,
    PolicyActivated,
    QueueCreated,
    QueueUpdated,
    EntitlementCreated,
    EntitlementUpdated,
    EntitlementRevoked,

    // Export
    AuditPacketGenerated,
    ReportExported,
    ReportViewed,
    DataExported,

    // AI inference
    AiInferenceRequested,
    AiInferenceCompleted,
    AiInferenceFailed,
    AiAssistViewed,
    AiAssistFeedback,
    AiRecommendationAccepted,
    AiRecommendationRejected,
    AiRecommendationOverridden,

    // Security
    UnauthorizedAccess,
    SuspiciousActivity,
    RateLimitExceeded,
    AccessCrossTenant,

    // Fraud
    FraudEventCreated,
    FraudEventSubmitted,
    FraudEventWithdrawn,
    FraudConfigUpdated,
    NetworkAlertDismissed,
    FraudMatchFound,
    FraudMatchReviewed,

    // System
    SystemConfigChanged,
    BatchOperationStarted,
    BatchOperationCompleted,
    IntegrationSyncStarted,
    IntegrationSyncCompleted,
    IntegrationSyncFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: AuditAction,
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

pub const GENESIS_HASH: &str = "genesis";

fn json_or_null(value: &Option<serde_json::Value>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

fn opt_or_null(value: &Option<impl ToString>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}

/// Pipe-delimited canonical serialization used for the integrity hash:
/// `id|tenant_id|timestamp|user_id|action|resource_type|resource_id|
/// before_value|after_value|extra_data|previous_hash`.
fn canonical_line(
    id: Uuid,
    tenant_id: &Option<Uuid>,
    timestamp: DateTime<Utc>,
    user_id: &Option<Uuid>,
    action: AuditAction,
    resource_type: &str,
    resource_id: &Option<String>,
    before_value: &Option<serde_json::Value>,
    after_value: &Option<serde_json::Value>,
    extra_data: &Option<serde_json::Value>,
    previous_hash: &str,
) -> String {
    [
        id.to_string(),
        opt_or_null(tenant_id),
        timestamp.to_rfc3339(),
        opt_or_null(user_id),
        action.to_string(),
        resource_type.to_string(),
        opt_or_null(resource_id),
        json_or_null(before_value),
        json_or_null(after_value),
        json_or_null(extra_data),
        previous_hash.to_string(),
    ]
    .join("|")
}

fn compute_integrity_hash(
    id: Uuid,
    tenant_id: &Option<Uuid>,
    timestamp: DateTime<Utc>,
    user_id: &Option<Uuid>,
    action: AuditAction,
    resource_type: &str,
    resource_id: &Option<String>,
    before_value: &Option<serde_json::Value>,
    after_value: &Option<serde_json::Value>,
    extra_data: &Option<serde_json::Value>,
    previous_hash: &str,
) -> String {
    let line = canonical_line(
        id, tenant_id, timestamp, user_id, action, resource_type, resource_id, before_value, after_value, extra_data, previous_hash,
    );
    let mut hasher = Sha256::new();
    hasher.update(line.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct AuditEntryInput {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub before_value: Option<serde_json::Value>,
    pub after_value: Option<serde_json::Value>,
    pub extra_data: Option<serde_json::Value>,
    pub session_id: Option<Uuid>,
}

/// Builds the next chained audit record. `previous_hash` must be the
/// `integrity_hash` of the most recent record for this tenant (or
/// `GENESIS_HASH` if this is the first); the caller is responsible for
/// reading that value under a per-tenant advisory lock so the chain
/// stays linear under concurrent writers.
pub fn build_audit_entry(
    action: AuditAction,
    resource_type: impl Into<String>,
    previous_hash: impl Into<String>,
    timestamp: DateTime<Utc>,
    input: AuditEntryInput,
) -> AuditLog {
    let id = Uuid::new_v4();
    let resource_type = resource_type.into();
    let previous_hash = previous_hash.into();
    let integrity_hash = compute_integrity_hash(
        id,
        &input.tenant_id,
        timestamp,
        &input.user_id,
        action,
        &resource_type,
        &input.resource_id,
        &input.before_value,
        &input.after_value,
        &input.extra_data,
        &previous_hash,
    );
    AuditLog {
        id,
        tenant_id: input.tenant_id,
        timestamp,
        user_id: input.user_id,
        username: input.username,
        ip_address: input.ip_address,
        user_agent: input.user_agent,
        action,
        resource_type,
        resource_id: input.resource_id,
        description: input.description,
        before_value: input.before_value,
        after_value: input.after_value,
        extra_data: input.extra_data,
        session_id: input.session_id,
        previous_hash,
        integrity_hash,
    }
}

pub fn verify_record(record: &AuditLog) -> bool {
    let expected = compute_integrity_hash(
        record.id,
        &record.tenant_id,
        record.timestamp,
        &record.user_id,
        record.action,
        &record.resource_type,
        &record.resource_id,
        &record.before_value,
        &record.after_value,
        &record.extra_data,
        &record.previous_hash,
    );
    expected == record.integrity_hash
}

/// Verifies a chronologically ordered chain for one tenant: every
/// record's `integrity_hash` recomputes correctly and every record's
/// `previous_hash` matches its predecessor's `integrity_hash` (the
/// first record's `previous_hash` must equal `GENESIS_HASH`). Returns
/// the index of the first break, if any.
pub fn verify_chain(records: &[AuditLog]) -> Result<(), usize> {
    for (i, record) in records.iter().enumerate() {
        if !verify_record(record) {
            return Err(i);
        }
        let expected_prev = if i == 0 { GENESIS_HASH.to_string() } else { records[i - 1].integrity_hash.clone() };
        if record.previous_hash != expected_prev {
            return Err(i);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_record_links_to_sentinel() {
        let rec = build_audit_entry(AuditAction::Login, "user", GENESIS_HASH, Utc::now(), AuditEntryInput::default());
        assert_eq!(rec.previous_hash, GENESIS_HASH);
        assert!(verify_record(&rec));
    }

    #[test]
    fn chain_of_three_verifies() {
        let r1 = build_audit_entry(AuditAction::Login, "user", GENESIS_HASH, Utc::now(), AuditEntryInput::default());
        let r2 = build_audit_entry(AuditAction::ItemViewed, "check_item", r1.integrity_hash.clone(), Utc::now(), AuditEntryInput::default());
        let r3 = build_audit_entry(AuditAction::DecisionMade, "decision", r2.integrity_hash.clone(), Utc::now(), AuditEntryInput::default());
        assert!(verify_chain(&[r1, r2, r3]).is_ok());
    }

    #[test]
    fn tamper_is_detected() {
        let r1 = build_audit_entry(AuditAction::Login, "user", GENESIS_HASH, Utc::now(), AuditEntryInput::default());
        let r2 = build_audit_entry(AuditAction::ItemViewed, "check_item", r1.integrity_hash.clone(), Utc::now(), AuditEntryInput::default());
        let mut tampered = r1.clone();
        tampered.before_value = Some(serde_json::json!({"tampered": true}));
        let result = verify_chain(&[tampered, r2]);
        assert_eq!(result, Err(0));
    }
}
