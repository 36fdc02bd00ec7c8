//! Storage port traits — implemented by checkops-postgres. Domain logic
//! depends only on these traits, never on sqlx directly, so the service
//! layer can be exercised against an in-memory fake in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog};
use crate::check_item::{CheckHistory, CheckImage, CheckItem, CheckItemFilter, Page};
use crate::decision::Decision;
use crate::entitlement::{ApprovalEntitlement, EntitlementType};
use crate::error::AppError;
use crate::fraud::{FraudEvent, FraudSharedArtifact, NetworkMatchAlert, TenantFraudConfig};
use crate::image_token::ImageAccessToken;
use crate::policy::{Policy, PolicyVersion};
use crate::queue::{Queue, QueueAssignment};
use crate::user::{Role, User, UserSession};

pub type Result<T> = std::result::Result<T, AppError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username_or_email(&self, tenant_id: Uuid, identifier: &str) -> Result<Option<User>>;
    async fn get_by_id(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>>;
    async fn record_login_success(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn record_login_failure(&self, user_id: Uuid, locked_until: Option<DateTime<Utc>>) -> Result<()>;
    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>>;
    async fn permissions_for_roles(&self, role_ids: &[Uuid]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: UserSession) -> Result<UserSession>;
    async fn find_by_refresh_hash(&self, refresh_token_hash: &str) -> Result<Option<UserSession>>;
    async fn revoke(&self, session_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn revoke_all_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait ImageTokenStore: Send + Sync {
    async fn mint(&self, token: ImageAccessToken) -> Result<ImageAccessToken>;
    async fn mint_batch(&self, tokens: Vec<ImageAccessToken>) -> Result<Vec<ImageAccessToken>>;

    /// Atomically transitions `used_at IS NULL -> used_at = now` in a
    /// single round-trip (`UPDATE ... WHERE used_at IS NULL RETURNING *`)
    /// and returns the post-update row, or `None` if the token did not
    /// exist or was already consumed by a concurrent caller.
    async fn try_consume(&self, token_id: Uuid, used_by_ip: Option<String>, used_by_user_agent: Option<String>, now: DateTime<Utc>) -> Result<Option<ImageAccessToken>>;

    async fn get(&self, token_id: Uuid) -> Result<Option<ImageAccessToken>>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_active_policy_version(&self, tenant_id: Uuid, account_type: crate::check_item::AccountType, now: DateTime<Utc>) -> Result<Option<(Policy, PolicyVersion)>>;
    async fn get_policy(&self, tenant_id: Uuid, policy_id: Uuid) -> Result<Option<Policy>>;
    async fn list_policies(&self, tenant_id: Uuid) -> Result<Vec<Policy>>;
    async fn create_policy(&self, policy: Policy, initial_version: PolicyVersion) -> Result<(Policy, PolicyVersion)>;
    async fn activate_policy(&self, tenant_id: Uuid, policy_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn active_entitlements_for_user(&self, tenant_id: Uuid, user_id: Uuid, role_ids: &[Uuid], entitlement_type: EntitlementType, now: DateTime<Utc>) -> Result<Vec<ApprovalEntitlement>>;
    async fn create(&self, entitlement: ApprovalEntitlement) -> Result<ApprovalEntitlement>;
    async fn revoke(&self, tenant_id: Uuid, entitlement_id: Uuid) -> Result<()>;
}

/// The core decision-writing transaction (§4.7 steps a-i) is implemented
/// on this trait as a single method so the adapter can own the
/// transaction boundary; the service layer supplies pre-validated inputs
/// and receives back the persisted row plus the chained audit entry.
#[async_trait]
pub trait CheckItemStore: Send + Sync {
    async fn upsert_from_provider(&self, item: CheckItem) -> Result<CheckItem>;
    async fn get(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Option<CheckItem>>;
    async fn get_for_update(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Option<CheckItem>>;
    async fn list(&self, tenant_id: Uuid, filter: &CheckItemFilter, page: &Page) -> Result<(Vec<CheckItem>, i64)>;
    async fn adjacent(&self, tenant_id: Uuid, item_id: Uuid, filter: &CheckItemFilter) -> Result<(Option<Uuid>, Option<Uuid>)>;
    async fn assign(&self, tenant_id: Uuid, item_id: Uuid, reviewer_id: Option<Uuid>, approver_id: Option<Uuid>, queue_id: Option<Uuid>) -> Result<CheckItem>;
    async fn set_status(&self, tenant_id: Uuid, item_id: Uuid, new_status: crate::check_item::CheckStatus) -> Result<CheckItem>;
    async fn images_for_item(&self, tenant_id: Uuid, item_id: Uuid) -> Result<Vec<CheckImage>>;
    async fn history_for_account(&self, tenant_id: Uuid, account_id: &str, limit: i64) -> Result<Vec<CheckHistory>>;
}

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn latest_for_item(&self, tenant_id: Uuid, check_item_id: Uuid) -> Result<Option<Decision>>;
    async fn history_for_item(&self, tenant_id: Uuid, check_item_id: Uuid) -> Result<Vec<Decision>>;

    /// Persists a decision and updates the owning item's status within
    /// one transaction. Returns the decision and the item's new state.
    async fn record_decision(&self, decision: Decision, new_status: crate::check_item::CheckStatus, pending_dual_control_decision_id: Option<Uuid>) -> Result<(Decision, CheckItem)>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Returns the most recent `integrity_hash` for this tenant, or
    /// `None` if the tenant has no audit history yet (genesis). Callers
    /// must hold the per-tenant advisory lock before calling this and
    /// until the corresponding `append` commits.
    async fn latest_hash(&self, tenant_id: Option<Uuid>) -> Result<Option<String>>;
    async fn append(&self, record: AuditLog) -> Result<AuditLog>;
    async fn list(&self, tenant_id: Uuid, action: Option<AuditAction>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, page: &Page) -> Result<(Vec<AuditLog>, i64)>;
    async fn for_resource(&self, tenant_id: Uuid, resource_type: &str, resource_id: &str) -> Result<Vec<AuditLog>>;

    /// Acquires the per-tenant advisory lock for the duration of the
    /// returned guard's transaction, so concurrent audit writers for the
    /// same tenant serialize and the chain stays linear.
    async fn lock_tenant_chain(&self, tenant_id: Option<Uuid>) -> Result<()>;
}

#[async_trait]
pub trait FraudStore: Send + Sync {
    async fn create_event(&self, event: FraudEvent) -> Result<FraudEvent>;
    async fn share_artifact(&self, artifact: FraudSharedArtifact) -> Result<FraudSharedArtifact>;
    async fn find_matches(&self, indicators: &crate::fraud::FraudIndicators, exclude_tenant: Uuid) -> Result<Vec<FraudSharedArtifact>>;
    async fn list_alerts(&self, tenant_id: Uuid) -> Result<Vec<NetworkMatchAlert>>;
    async fn dismiss_alert(&self, tenant_id: Uuid, alert_id: Uuid) -> Result<()>;
    async fn get_tenant_config(&self, tenant_id: Uuid) -> Result<Option<TenantFraudConfig>>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Queue>>;
    async fn assignments_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<QueueAssignment>>;
}

/// Capability interface for the upstream core-banking feed. A real
/// deployment wires a network-calling implementation; tests and local
/// development wire an in-memory fake — selected at startup from
/// configuration, never by compile-time feature flag.
#[async_trait]
pub trait CheckItemProvider: Send + Sync {
    async fn fetch_presented_items(&self, tenant_id: Uuid, since: Option<DateTime<Utc>>, amount_min: Option<rust_decimal::Decimal>) -> Result<Vec<ProviderCheckItem>>;
}

/// Raw item shape returned by the external provider, prior to derived-field
/// computation and policy evaluation.
#[derive(Debug, Clone)]
pub struct ProviderCheckItem {
    pub external_item_id: String,
    pub source_system: String,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub account_id: String,
    pub account_number_masked: String,
    pub account_type: crate::check_item::AccountType,
    pub routing_number: Option<String>,
    pub check_number: Option<String>,
    pub payee_name: Option<String>,
    pub memo: Option<String>,
    pub presented_date: chrono::NaiveDate,
    pub check_date: Option<chrono::NaiveDate>,
    pub item_type: crate::check_item::ItemType,
    pub context: crate::check_item::AccountContext,
    pub upstream_flags: Vec<String>,
}

/// Capability interface for fetching check image bytes from external
/// storage, behind the one-time-use token flow.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn fetch_bytes(&self, tenant_id: Uuid, image: &CheckImage) -> Result<Vec<u8>>;
}
