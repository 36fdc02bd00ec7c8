use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::check_item::{CheckItem, CheckStatus};
use checkops_types::decision::Decision;
use checkops_types::ports::{DecisionStore, Result};

use crate::rowmap::DecisionRow;

pub struct PgDecisionStore {
    pool: PgPool,
}

impl PgDecisionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DECISION_COLUMNS: &str = "id, tenant_id, check_item_id, decision_type, action, user_id, previous_status, \
    new_status, is_dual_control_required, dual_control_approver_id, notes, reason_codes, ai_assisted, \
    ai_flags_reviewed, evidence_snapshot, created_at";

#[async_trait]
impl DecisionStore for PgDecisionStore {
    async fn latest_for_item(&self, tenant_id: Uuid, check_item_id: Uuid) -> Result<Option<Decision>> {
        let row = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE tenant_id = $1 AND check_item_id = $2 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(tenant_id)
        .bind(check_item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn history_for_item(&self, tenant_id: Uuid, check_item_id: Uuid) -> Result<Vec<Decision>> {
        let rows = sqlx::query_as::<_, DecisionRow>(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions WHERE tenant_id = $1 AND check_item_id = $2 ORDER BY created_at ASC"
        ))
        .bind(tenant_id)
        .bind(check_item_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn record_decision(&self, decision: Decision, new_status: CheckStatus, pending_dual_control_decision_id: Option<Uuid>) -> Result<(Decision, CheckItem)> {
        let mut tx = self.pool.begin().await?;

        let decision_row = sqlx::query_as::<_, DecisionRow>(&format!(
            "INSERT INTO decisions \
             (id, tenant_id, check_item_id, decision_type, action, user_id, previous_status, new_status, \
              is_dual_control_required, dual_control_approver_id, notes, reason_codes, ai_assisted, \
              ai_flags_reviewed, evidence_snapshot, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16) \
             RETURNING {DECISION_COLUMNS}"
        ))
        .bind(decision.id)
        .bind(decision.tenant_id)
        .bind(decision.check_item_id)
        .bind(decision.decision_type.to_string())
        .bind(decision.action.to_string())
        .bind(decision.user_id)
        .bind(decision.previous_status.to_string())
        .bind(new_status.to_string())
        .bind(decision.is_dual_control_required)
        .bind(decision.dual_control_approver_id)
        .bind(&decision.notes)
        .bind(&decision.reason_codes)
        .bind(decision.ai_assisted)
        .bind(&decision.ai_flags_reviewed)
        .bind(serde_json::to_value(&decision.evidence_snapshot).unwrap_or_default())
        .bind(decision.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let item_row = sqlx::query_as::<_, crate::rowmap::CheckItemRow>(&format!(
            "UPDATE check_items SET status = $3, pending_dual_control_decision_id = $4, updated_at = $5 \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            crate::check_item_store::ITEM_COLUMNS
        ))
        .bind(decision.tenant_id)
        .bind(decision.check_item_id)
        .bind(new_status.to_string())
        .bind(pending_dual_control_decision_id)
        .bind(decision.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((decision_row.try_into()?, item_row.try_into()?))
    }
}
