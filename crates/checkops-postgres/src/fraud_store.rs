use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use checkops_types::fraud::{FraudEvent, FraudIndicators, FraudSharedArtifact, NetworkMatchAlert, TenantFraudConfig};
use checkops_types::ports::{FraudStore, Result};

use crate::rowmap::{FraudArtifactRow, FraudEventRow, NetworkMatchAlertRow, TenantFraudConfigRow};

pub struct PgFraudStore {
    pool: PgPool,
}

impl PgFraudStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ARTIFACT_COLUMNS: &str = "id, source_fraud_event_id, routing_hash, payee_hash, micr_routing_hash, \
    check_fingerprint, pepper_version, month_bucket, amount_bucket, fraud_type, channel, sharing_level, created_at";

#[async_trait]
impl FraudStore for PgFraudStore {
    async fn create_event(&self, event: FraudEvent) -> Result<FraudEvent> {
        let row = sqlx::query_as::<_, FraudEventRow>(
            "INSERT INTO fraud_events (id, tenant_id, check_item_id, fraud_type, channel, reported_by_user_id, reported_at, details) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, tenant_id, check_item_id, fraud_type, channel, reported_by_user_id, reported_at, details",
        )
        .bind(event.id)
        .bind(event.tenant_id)
        .bind(event.check_item_id)
        .bind(&event.fraud_type)
        .bind(&event.channel)
        .bind(event.reported_by_user_id)
        .bind(event.reported_at)
        .bind(&event.details)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn share_artifact(&self, artifact: FraudSharedArtifact) -> Result<FraudSharedArtifact> {
        let row = sqlx::query_as::<_, FraudArtifactRow>(&format!(
            "INSERT INTO fraud_shared_artifacts \
             (id, source_fraud_event_id, routing_hash, payee_hash, micr_routing_hash, check_fingerprint, \
              pepper_version, month_bucket, amount_bucket, fraud_type, channel, sharing_level, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {ARTIFACT_COLUMNS}"
        ))
        .bind(artifact.id)
        .bind(artifact.source_fraud_event_id)
        .bind(&artifact.indicators.routing_hash)
        .bind(&artifact.indicators.payee_hash)
        .bind(&artifact.indicators.micr_routing_hash)
        .bind(&artifact.indicators.check_fingerprint)
        .bind(artifact.pepper_version)
        .bind(&artifact.month_bucket)
        .bind(&artifact.amount_bucket)
        .bind(&artifact.fraud_type)
        .bind(&artifact.channel)
        .bind(artifact.sharing_level.to_string())
        .bind(artifact.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_matches(&self, indicators: &FraudIndicators, exclude_tenant: Uuid) -> Result<Vec<FraudSharedArtifact>> {
        let rows = sqlx::query_as::<_, FraudArtifactRow>(
            "SELECT a.id, a.source_fraud_event_id, a.routing_hash, a.payee_hash, a.micr_routing_hash, \
               a.check_fingerprint, a.pepper_version, a.month_bucket, a.amount_bucket, a.fraud_type, \
               a.channel, a.sharing_level, a.created_at \
             FROM fraud_shared_artifacts a \
             JOIN fraud_events e ON e.id = a.source_fraud_event_id \
             WHERE e.tenant_id != $4 AND ( \
               (a.routing_hash IS NOT NULL AND a.routing_hash = $1) \
               OR (a.payee_hash IS NOT NULL AND a.payee_hash = $2) \
               OR (a.check_fingerprint IS NOT NULL AND a.check_fingerprint = $3) \
             )",
        )
        .bind(&indicators.routing_hash)
        .bind(&indicators.payee_hash)
        .bind(&indicators.check_fingerprint)
        .bind(exclude_tenant)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_alerts(&self, tenant_id: Uuid) -> Result<Vec<NetworkMatchAlert>> {
        let rows = sqlx::query_as::<_, NetworkMatchAlertRow>(
            "SELECT id, tenant_id, check_item_id, match_reasons, distinct_institution_count, dismissed, created_at \
             FROM network_match_alerts WHERE tenant_id = $1 AND NOT dismissed ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn dismiss_alert(&self, tenant_id: Uuid, alert_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE network_match_alerts SET dismissed = true WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(alert_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_tenant_config(&self, tenant_id: Uuid) -> Result<Option<TenantFraudConfig>> {
        let row = sqlx::query_as::<_, TenantFraudConfigRow>(
            "SELECT tenant_id, sharing_enabled, eligible_pepper_versions FROM tenant_fraud_configs WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
