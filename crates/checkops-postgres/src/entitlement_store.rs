use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::entitlement::{ApprovalEntitlement, EntitlementType};
use checkops_types::ports::{EntitlementStore, Result};

use crate::rowmap::EntitlementRow;

pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, tenant_id, user_id, role_id, entitlement_type, min_amount, max_amount, \
    allowed_account_types, allowed_queue_ids, allowed_risk_levels, allowed_business_lines, is_active, \
    effective_from, effective_until";

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn active_entitlements_for_user(&self, tenant_id: Uuid, user_id: Uuid, role_ids: &[Uuid], entitlement_type: EntitlementType, now: DateTime<Utc>) -> Result<Vec<ApprovalEntitlement>> {
        let rows = sqlx::query_as::<_, EntitlementRow>(&format!(
            "SELECT {COLUMNS} FROM approval_entitlements \
             WHERE tenant_id = $1 AND is_active AND entitlement_type = $2 \
               AND effective_from <= $5 AND (effective_until IS NULL OR effective_until > $5) \
               AND (user_id = $3 OR role_id = ANY($4))"
        ))
        .bind(tenant_id)
        .bind(entitlement_type.to_string())
        .bind(user_id)
        .bind(role_ids)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(&self, entitlement: ApprovalEntitlement) -> Result<ApprovalEntitlement> {
        let allowed_account_types: Option<Vec<String>> = entitlement.allowed_account_types.as_ref().map(|v| v.iter().map(|t| t.to_string()).collect());
        let allowed_risk_levels: Option<Vec<String>> = entitlement.allowed_risk_levels.as_ref().map(|v| v.iter().map(|t| t.to_string()).collect());
        let row = sqlx::query_as::<_, EntitlementRow>(&format!(
            "INSERT INTO approval_entitlements \
             (id, tenant_id, user_id, role_id, entitlement_type, min_amount, max_amount, allowed_account_types, \
              allowed_queue_ids, allowed_risk_levels, allowed_business_lines, is_active, effective_from, effective_until) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {COLUMNS}"
        ))
        .bind(entitlement.id)
        .bind(entitlement.tenant_id)
        .bind(entitlement.user_id)
        .bind(entitlement.role_id)
        .bind(entitlement.entitlement_type.to_string())
        .bind(entitlement.min_amount)
        .bind(entitlement.max_amount)
        .bind(&allowed_account_types)
        .bind(&entitlement.allowed_queue_ids)
        .bind(&allowed_risk_levels)
        .bind(&entitlement.allowed_business_lines)
        .bind(entitlement.is_active)
        .bind(entitlement.effective_from)
        .bind(entitlement.effective_until)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn revoke(&self, tenant_id: Uuid, entitlement_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE approval_entitlements SET is_active = false, effective_until = now() WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(entitlement_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
